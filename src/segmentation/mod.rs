//! Boundary to the backend that proposes a polygon from a click.
//!
//! [`SegmentationBackend`] is the blocking call. [`SegmentationWorker`] runs
//! a backend on a background thread so the UI thread only ever polls.

mod client;
mod error;
mod worker;

pub use client::{
    HttpSegmentationClient, SegmentationBackend, SegmentationProposal, SegmentationRequest,
    SegmentationResponse, WirePoint,
};
pub use error::SegmentationError;
pub use worker::SegmentationWorker;

/// Identifies one issued request so a late answer can be matched or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket(pub u64);

/// A finished segmentation call.
#[derive(Debug)]
pub struct SegmentationResult {
    pub ticket: RequestTicket,
    pub outcome: Result<SegmentationProposal, SegmentationError>,
}
