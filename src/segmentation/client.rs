//! Wire types and the HTTP client for the segmentation endpoint.

use serde::{Deserialize, Serialize};

use super::SegmentationError;
use crate::model::Point;

/// Body of a segmentation `POST`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRequest {
    pub image_id: String,
    /// Click position, rounded to an image pixel
    pub x: i32,
    pub y: i32,
    pub image_width: u32,
    pub image_height: u32,
}

impl SegmentationRequest {
    pub fn new(image_id: impl Into<String>, click: Point, image_width: u32, image_height: u32) -> Self {
        Self {
            image_id: image_id.into(),
            x: click.x.round() as i32,
            y: click.y.round() as i32,
            image_width,
            image_height,
        }
    }
}

/// A point as the backend may send it: `{"x":..,"y":..}` or `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WirePoint {
    Object { x: f32, y: f32 },
    Pair([f32; 2]),
}

impl From<WirePoint> for Point {
    fn from(p: WirePoint) -> Self {
        match p {
            WirePoint::Object { x, y } => Point::new(x, y),
            WirePoint::Pair([x, y]) => Point::new(x, y),
        }
    }
}

/// Response body of the segmentation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResponse {
    pub success: bool,
    #[serde(default)]
    pub points: Vec<WirePoint>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SegmentationResponse {
    /// Turn a decoded response into a proposal, treating `success: false`
    /// and an empty point list as failures.
    pub fn into_proposal(self) -> Result<SegmentationProposal, SegmentationError> {
        if !self.success {
            return Err(SegmentationError::rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        if self.points.is_empty() {
            return Err(SegmentationError::EmptyResult);
        }
        Ok(SegmentationProposal {
            points: self.points.into_iter().map(Point::from).collect(),
            confidence: self.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
            algorithm: self.algorithm.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

/// A polygon proposed by the backend, in image space.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationProposal {
    pub points: Vec<Point>,
    /// In `[0, 1]`
    pub confidence: f32,
    pub algorithm: String,
}

/// Something that turns a click into a polygon proposal.
///
/// Calls block; run them through a [`super::SegmentationWorker`] to keep the
/// UI thread free.
pub trait SegmentationBackend: Send {
    fn segment(
        &self,
        request: &SegmentationRequest,
    ) -> Result<SegmentationProposal, SegmentationError>;
}

/// JSON-over-HTTP segmentation client.
///
/// No overall request timeout is set: a hung backend keeps the session in
/// its processing state until the call returns.
pub struct HttpSegmentationClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpSegmentationClient {
    pub fn new(endpoint: impl Into<String>, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new().user_agent(user_agent).build();
        Self {
            endpoint: endpoint.into(),
            agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SegmentationBackend for HttpSegmentationClient {
    fn segment(
        &self,
        request: &SegmentationRequest,
    ) -> Result<SegmentationProposal, SegmentationError> {
        log::debug!(
            "POST {} for image {} at ({}, {})",
            self.endpoint,
            request.image_id,
            request.x,
            request.y
        );

        let response = match self.agent.post(&self.endpoint).send_json(request) {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, resp)) => {
                let message = resp.into_string().unwrap_or_default();
                return Err(SegmentationError::Status { code, message });
            }
            Err(e) => return Err(SegmentationError::Transport(e.to_string())),
        };

        let body: SegmentationResponse = response
            .into_json()
            .map_err(|e| SegmentationError::decode(e.to_string()))?;
        body.into_proposal()
    }
}
