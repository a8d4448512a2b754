//! Notifications the canvas hands back to its host.

use thiserror::Error;

use crate::model::{AnnotationId, CompletedShape};
use crate::segmentation::{RequestTicket, SegmentationRequest};
use crate::viewport::ScreenPoint;

/// Something the host should react to. Drained after every input call.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// A box or polygon was finished, in image space. The host persists it.
    ShapeCompleted(CompletedShape),
    /// Selection changed; `None` when the click hit nothing.
    AnnotationSelected(Option<AnnotationId>),
    /// The user asked to delete an annotation.
    AnnotationDeleted(AnnotationId),
    /// The image's top-left corner moved on screen.
    ImagePositionChanged(ScreenPoint),
    /// A segmentation call should be made. Only surfaces when no worker is
    /// attached; answer it with `AnnotationCanvas::apply_segmentation`.
    SegmentationRequested {
        ticket: RequestTicket,
        request: SegmentationRequest,
    },
    /// Shown to the user; the workflow continues.
    Warning(CanvasWarning),
}

/// User-visible warnings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanvasWarning {
    #[error("Automatic segmentation failed ({reason}); using a placeholder square")]
    SegmentationFallback { reason: String },

    #[error("Cannot remove vertex: a polygon needs at least 3, {remaining} would remain")]
    VertexRemovalRejected { remaining: usize },

    #[error("Cannot complete a polygon with {vertices} vertices")]
    PolygonTooSmall { vertices: usize },

    #[error("No image is loaded")]
    NoImage,
}
