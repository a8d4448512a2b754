//! Hit-testing geometry.
//!
//! All functions are pure and work in whatever space their inputs share.
//! Callers convert to a common space first.

use crate::model::{BoundingBox, MIN_POLYGON_VERTICES, Point};

/// Point within `[x, x+width] × [y, y+height]`. Edges count as inside.
pub fn point_in_box(point: &Point, bbox: &BoundingBox) -> bool {
    point.x >= bbox.x
        && point.x <= bbox.x + bbox.width
        && point.y >= bbox.y
        && point.y <= bbox.y + bbox.height
}

/// Ray-casting point-in-polygon test.
///
/// A horizontal ray is cast towards +x. Edges are counted half-open: an edge
/// contributes when exactly one endpoint lies strictly below `point.y`, and
/// its crossing must lie strictly right of `point.x`. For an axis-aligned
/// square this makes the left and top edges inside and the right and bottom
/// edges outside. Fewer than three vertices is never inside.
pub fn point_in_polygon(point: &Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < MIN_POLYGON_VERTICES {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let vi = &vertices[i];
        let vj = &vertices[j];

        if (vi.y > point.y) != (vj.y > point.y) {
            let x_cross = (vj.x - vi.x) * (point.y - vi.y) / (vj.y - vi.y) + vi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

/// Distance from `point` to segment `a`-`b`, projecting with the scalar
/// parameter clamped to the segment. A zero-length segment degrades to the
/// distance to `a`.
pub fn point_segment_distance(point: &Point, a: &Point, b: &Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f32::EPSILON {
        return point.distance_to(a);
    }

    let apx = point.x - a.x;
    let apy = point.y - a.y;
    let t = ((apx * abx + apy * aby) / len_sq).clamp(0.0, 1.0);
    point.distance_to(&Point::new(a.x + t * abx, a.y + t * aby))
}

/// Index of the nearest vertex within `threshold`, if any.
pub fn nearest_vertex(point: &Point, vertices: &[Point], threshold: f32) -> Option<usize> {
    vertices
        .iter()
        .enumerate()
        .map(|(i, v)| (i, point.distance_to(v)))
        .filter(|(_, d)| *d <= threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// The globally nearest edge of a closed polygon, as `(start_index, distance)`.
///
/// Edge `i` runs from vertex `i` to vertex `(i + 1) % n`. Returns `None` for
/// fewer than two vertices.
pub fn nearest_edge(point: &Point, vertices: &[Point]) -> Option<(usize, f32)> {
    let n = vertices.len();
    if n < 2 {
        return None;
    }
    (0..n)
        .map(|i| {
            let d = point_segment_distance(point, &vertices[i], &vertices[(i + 1) % n]);
            (i, d)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
