//! Annotation geometry and the shapes handed back to the host.
//!
//! Everything here is in image space. Screen coordinates only exist inside
//! the tool state machine and the renderer.

use labelkit_render::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry;

/// Unique identifier for a persisted annotation, assigned by the host.
pub type AnnotationId = u64;

/// Minimum number of vertices required for a valid polygon.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point.
    pub fn distance_to(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An axis-aligned bounding box, `(x, y)` being the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a normalized box from two corner points, whatever the drag direction.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        Self {
            x: p1.x.min(p2.x),
            y: p1.y.min(p2.y),
            width: (p1.x - p2.x).abs(),
            height: (p1.y - p2.y).abs(),
        }
    }

    /// Check if a point is inside the box. Edges count as inside.
    pub fn contains(&self, point: &Point) -> bool {
        geometry::point_in_box(point, self)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// A closed polygon defined by its vertices in order.
///
/// Polygons need not be convex or simple.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Ray-casting containment test. See [`geometry::point_in_polygon`] for
    /// the boundary rule.
    pub fn contains(&self, point: &Point) -> bool {
        geometry::point_in_polygon(point, &self.points)
    }

    /// The vertex a label is anchored to: topmost, then leftmost.
    pub fn label_anchor(&self) -> Option<Point> {
        self.points.iter().copied().min_by(|a, b| {
            a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
        })
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }
}

/// Shape data of a persisted annotation.
///
/// Serialized with a `type` tag: `{"type":"box","x":..}` or
/// `{"type":"polygon","points":[..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationShape {
    Box(BoundingBox),
    Polygon(Polygon),
}

impl AnnotationShape {
    pub fn kind(&self) -> &'static str {
        match self {
            AnnotationShape::Box(_) => "box",
            AnnotationShape::Polygon(_) => "polygon",
        }
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        match self {
            AnnotationShape::Box(b) => b.contains(point),
            AnnotationShape::Polygon(poly) => poly.contains(point),
        }
    }
}

/// Why an annotation's geometry cannot be drawn or hit-tested.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("non-finite coordinate in {shape} geometry")]
    NonFinite { shape: &'static str },

    #[error("box has non-positive size {width}x{height}")]
    EmptyBox { width: f32, height: f32 },

    #[error("polygon has {count} points, at least 3 required")]
    TooFewPoints { count: usize },
}

/// A persisted, labeled region supplied by the host on every render pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub label: String,
    /// Display color; the label registry decides when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(flatten)]
    pub shape: AnnotationShape,
}

impl Annotation {
    pub fn new(id: AnnotationId, label: impl Into<String>, shape: AnnotationShape) -> Self {
        Self {
            id,
            label: label.into(),
            color: None,
            confidence: None,
            shape,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Check that the geometry can be drawn and hit-tested.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match &self.shape {
            AnnotationShape::Box(b) => {
                if ![b.x, b.y, b.width, b.height].iter().all(|v| v.is_finite()) {
                    return Err(GeometryError::NonFinite { shape: "box" });
                }
                if b.width <= 0.0 || b.height <= 0.0 {
                    return Err(GeometryError::EmptyBox {
                        width: b.width,
                        height: b.height,
                    });
                }
            }
            AnnotationShape::Polygon(poly) => {
                if poly.points.len() < MIN_POLYGON_VERTICES {
                    return Err(GeometryError::TooFewPoints {
                        count: poly.points.len(),
                    });
                }
                if !poly.points.iter().all(Point::is_finite) {
                    return Err(GeometryError::NonFinite { shape: "polygon" });
                }
            }
        }
        Ok(())
    }
}

/// A finished shape emitted to the host, always in image space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompletedShape {
    Box(BoundingBox),
    Polygon {
        points: Vec<Point>,
        /// Set when the polygon came out of a smart-polygon session.
        #[serde(default)]
        smart_generated: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        algorithm: Option<String>,
    },
}

impl CompletedShape {
    /// A manually drawn polygon.
    pub fn polygon(points: Vec<Point>) -> Self {
        CompletedShape::Polygon {
            points,
            smart_generated: false,
            confidence: None,
            algorithm: None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CompletedShape::Box(_) => "box",
            CompletedShape::Polygon { .. } => "polygon",
        }
    }

    pub fn is_smart_generated(&self) -> bool {
        matches!(
            self,
            CompletedShape::Polygon {
                smart_generated: true,
                ..
            }
        )
    }

    /// Convert into a persisted shape once the host has stored it.
    pub fn into_shape(self) -> AnnotationShape {
        match self {
            CompletedShape::Box(b) => AnnotationShape::Box(b),
            CompletedShape::Polygon { points, .. } => AnnotationShape::Polygon(Polygon::new(points)),
        }
    }
}

/// The image being annotated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
        }
    }
}
