//! Drawing tools and the state machine that drives them.

mod machine;


use serde::{Deserialize, Serialize};

use crate::model::{Annotation, AnnotationId, ImageInfo, Point};
use crate::viewport::ViewportState;

pub use machine::ToolStateMachine;

/// The active drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Click to select annotations.
    #[default]
    Select,
    /// Drag to draw a bounding box.
    Box,
    /// Click to add vertices, double-click to finish.
    Polygon,
    /// Click to request an automatic polygon, then edit it.
    SmartPolygon,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Box => "box",
            Tool::Polygon => "polygon",
            Tool::SmartPolygon => "smart_polygon",
        }
    }
}

/// Observable state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    Select,
    /// Box tool active. A drag may be in progress.
    DrawingBox,
    /// Polygon tool active, collecting vertices.
    AccumulatingPolygon,
    /// Smart tool without a candidate. A request may be in flight.
    SmartIdle,
    /// Smart tool editing a candidate.
    SmartEditing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// The shape currently being drawn, in image space.
#[derive(Debug, Clone, PartialEq)]
pub enum TransientShape {
    Box { start: Point, current: Point },
    Polygon { points: Vec<Point> },
}

/// What the host hands in with every input call.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub viewport: &'a ViewportState,
    /// Persisted annotations in z-order, bottom first.
    pub annotations: &'a [Annotation],
    pub selected: Option<AnnotationId>,
    pub image: Option<&'a ImageInfo>,
}

impl<'a> FrameContext<'a> {
    pub fn new(viewport: &'a ViewportState) -> Self {
        Self {
            viewport,
            annotations: &[],
            selected: None,
            image: None,
        }
    }

    pub fn with_annotations(mut self, annotations: &'a [Annotation]) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_selected(mut self, selected: Option<AnnotationId>) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_image(mut self, image: &'a ImageInfo) -> Self {
        self.image = Some(image);
        self
    }
}
