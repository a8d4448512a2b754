use thiserror::Error;

/// Everything that can go wrong between issuing a request and getting a
/// usable polygon back. All of these end in the fallback square.
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// Connection or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP status
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Backend answered with `success: false`
    #[error("Segmentation rejected: {0}")]
    Rejected(String),

    /// Backend answered successfully but without points
    #[error("Segmentation returned no points")]
    EmptyResult,

    /// The worker thread is gone
    #[error("Segmentation worker disconnected")]
    Disconnected,

    /// The worker thread could not be started
    #[error("Failed to spawn segmentation worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SegmentationError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}
