//! Default values for the canvas thresholds and the smart-polygon fallback.

/// Vertex grab radius, in screen pixels.
pub const VERTEX_HIT_RADIUS_PX: f32 = 10.0;

/// Edge distance under which a click inserts a vertex, in image units.
pub const EDGE_INSERT_DISTANCE: f32 = 20.0;

/// A drawn box must exceed this on both axes, in screen pixels.
pub const MIN_BOX_SIZE_PX: f32 = 5.0;

/// Share of the container the fitted image may take.
pub const FIT_FRACTION: f32 = 0.95;

/// Longest rendered side for images that would otherwise be tiny.
pub const MIN_DISPLAY_SIZE: f32 = 100.0;

/// Half the side of the fallback square, in image units.
pub const FALLBACK_HALF_SIZE: f32 = 50.0;

/// Confidence assigned to the fallback square.
pub const FALLBACK_CONFIDENCE: f32 = 0.1;

/// Algorithm name reported for the fallback square.
pub const FALLBACK_ALGORITHM: &str = "fallback";

/// Zoom step for zoom in/out.
pub const ZOOM_FACTOR: f32 = 1.2;
