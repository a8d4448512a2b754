//! Raster backend using tiny-skia.

use std::path::Path;

use tiny_skia::{
    ColorU8, FillRule, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint,
    Rect, Stroke, Transform,
};

use crate::text::GlyphRasterizer;
use crate::{Color, Point, Rectangle, RenderError, Result, RgbaImage, Surface};

/// A CPU pixmap surface.
///
/// Fonts are loaded on the first `draw_text` call.
pub struct PixmapSurface {
    pixmap: Pixmap,
    text: Option<GlyphRasterizer>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or(RenderError::InvalidSize { width, height })?;
        Ok(Self { pixmap, text: None })
    }

    /// Write the surface to a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Encode the surface as PNG bytes.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| RenderError::Encode(e.to_string()))
    }

    /// Copy the surface out as straight-alpha RGBA.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut data = Vec::with_capacity(self.pixmap.data().len());
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(self.pixmap.width(), self.pixmap.height(), data)
            .unwrap_or_else(|| RgbaImage::new(self.pixmap.width(), self.pixmap.height()))
    }

    fn paint(color: Color) -> Paint<'static> {
        let [r, g, b, a] = color.to_rgba8();
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;
        paint
    }

    fn stroke(width: f32) -> Stroke {
        Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        }
    }

    fn polygon_path(points: &[Point], closed: bool) -> Option<tiny_skia::Path> {
        let (first, rest) = points.split_first()?;
        let mut pb = PathBuilder::new();
        pb.move_to(first.x, first.y);
        for p in rest {
            pb.line_to(p.x, p.y);
        }
        if closed {
            pb.close();
        }
        pb.finish()
    }
}

/// Premultiply a straight-alpha image into a pixmap.
fn pixmap_from_image(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

impl Surface for PixmapSurface {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn clear(&mut self, color: Color) {
        let [r, g, b, a] = color.to_rgba8();
        self.pixmap.fill(tiny_skia::Color::from_rgba8(r, g, b, a));
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rectangle) {
        if image.width() == 0 || image.height() == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let Some(src) = pixmap_from_image(image) else {
            log::warn!(
                "Could not allocate pixmap for {}x{} image",
                image.width(),
                image.height()
            );
            return;
        };
        let sx = dest.width / image.width() as f32;
        let sy = dest.height / image.height() as f32;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };
        self.pixmap.draw_pixmap(
            0,
            0,
            src.as_ref(),
            &paint,
            Transform::from_row(sx, 0.0, 0.0, sy, dest.x, dest.y),
            None,
        );
    }

    fn fill_rect(&mut self, rect: Rectangle, color: Color) {
        if let Some(r) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
            self.pixmap
                .fill_rect(r, &Self::paint(color), Transform::identity(), None);
        }
    }

    fn stroke_rect(&mut self, rect: Rectangle, color: Color, width: f32) {
        if let Some(r) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
            let path = PathBuilder::from_rect(r);
            self.pixmap.stroke_path(
                &path,
                &Self::paint(color),
                &Self::stroke(width),
                Transform::identity(),
                None,
            );
        }
    }

    fn fill_polygon(&mut self, points: &[Point], color: Color) {
        if points.len() < 3 {
            return;
        }
        if let Some(path) = Self::polygon_path(points, true) {
            self.pixmap.fill_path(
                &path,
                &Self::paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f32, closed: bool) {
        if points.len() < 2 {
            return;
        }
        if let Some(path) = Self::polygon_path(points, closed) {
            self.pixmap.stroke_path(
                &path,
                &Self::paint(color),
                &Self::stroke(width),
                Transform::identity(),
                None,
            );
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Color) {
        if let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) {
            self.pixmap.fill_path(
                &path,
                &Self::paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    fn draw_text(&mut self, text: &str, position: Point, color: Color, size: f32) {
        let rasterizer = self.text.get_or_insert_with(GlyphRasterizer::new);
        rasterizer.draw(&mut self.pixmap, text, position, color, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(matches!(
            PixmapSurface::new(0, 10),
            Err(RenderError::InvalidSize { width: 0, height: 10 })
        ));
    }

    #[test]
    fn test_fill_rect_writes_pixels() {
        let mut surface = PixmapSurface::new(20, 20).unwrap();
        surface.clear(Color::BLACK);
        surface.fill_rect(Rectangle::new(5.0, 5.0, 10.0, 10.0), Color::WHITE);

        let img = surface.to_rgba_image();
        assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_draw_image_scales_into_dest() {
        let mut src = RgbaImage::new(2, 2);
        for px in src.pixels_mut() {
            px.0 = [255, 0, 0, 255];
        }
        let mut surface = PixmapSurface::new(10, 10).unwrap();
        surface.clear(Color::BLACK);
        surface.draw_image(&src, Rectangle::new(2.0, 2.0, 6.0, 6.0));

        let img = surface.to_rgba_image();
        assert_eq!(img.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_degenerate_shapes_draw_nothing() {
        let mut surface = PixmapSurface::new(8, 8).unwrap();
        surface.fill_polygon(&[Point::new(1.0, 1.0), Point::new(2.0, 2.0)], Color::WHITE);
        surface.stroke_polyline(&[Point::new(1.0, 1.0)], Color::WHITE, 1.0, false);
        assert!(surface.to_rgba_image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_text_is_drawn_inside_chip() {
        let chip_color = Color::rgb(0.0, 0.0, 1.0);
        let mut surface = PixmapSurface::new(80, 30).unwrap();
        surface.clear(Color::BLACK);
        surface.fill_rect(Rectangle::new(0.0, 0.0, 80.0, 30.0), chip_color);
        surface.draw_text("Car", Point::new(4.0, 4.0), Color::WHITE, 18.0);

        let has_fonts = surface.text.as_ref().is_some_and(|t| t.face_count() > 0);
        if !has_fonts {
            // Nothing to rasterise with on this machine
            return;
        }
        let chip = chip_color.to_rgba8();
        let img = surface.to_rgba_image();
        assert!(img.pixels().any(|p| p.0 != chip));
    }

    #[test]
    fn test_empty_text_draws_nothing() {
        let mut surface = PixmapSurface::new(8, 8).unwrap();
        surface.draw_text("", Point::new(0.0, 0.0), Color::WHITE, 12.0);
        assert!(surface.to_rgba_image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_encode_png_produces_signature() {
        let surface = PixmapSurface::new(4, 4).unwrap();
        let bytes = surface.encode_png().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
