//! labelkit_render - drawing surfaces for the annotation canvas
//!
//! Widgets describe a frame through the [`Surface`] trait. Two backends are
//! provided: [`CommandRecorder`], which keeps the [`DrawCommand`] list for
//! inspection, and [`PixmapSurface`], which rasterises with tiny-skia and
//! draws text through cosmic-text.

mod color;
mod command;
mod error;
mod pixmap;
mod text;

pub use color::Color;
pub use command::{CommandRecorder, DrawCommand};
pub use error::{RenderError, Result};
pub use pixmap::PixmapSurface;
pub use text::GlyphRasterizer;

pub use image::RgbaImage;

use serde::{Deserialize, Serialize};

/// A point on the drawing surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle on the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A 2D target that the canvas renderer draws a frame onto.
///
/// Coordinates are surface pixels. Implementations must tolerate degenerate
/// input (empty point lists, zero-sized rectangles) by drawing nothing.
pub trait Surface {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    /// Fill the whole surface.
    fn clear(&mut self, color: Color);

    /// Draw an image scaled into `dest`.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rectangle);

    fn fill_rect(&mut self, rect: Rectangle, color: Color);

    fn stroke_rect(&mut self, rect: Rectangle, color: Color, width: f32);

    /// Fill a closed polygon (non-zero winding).
    fn fill_polygon(&mut self, points: &[Point], color: Color);

    /// Stroke a line through `points`, joining the last point to the first
    /// when `closed` is set.
    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f32, closed: bool);

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color);

    /// Draw text with its top-left corner at `position`.
    fn draw_text(&mut self, text: &str, position: Point, color: Color, size: f32);
}
