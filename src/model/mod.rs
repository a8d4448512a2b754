//! Data models for the annotation canvas.

mod annotation;
mod category;

pub use annotation::{
    Annotation, AnnotationId, AnnotationShape, BoundingBox, CompletedShape, GeometryError,
    ImageInfo, MIN_POLYGON_VERTICES, Point, Polygon,
};
pub use category::{Category, LabelRegistry};
