//! Glyph rasterisation for the pixmap backend.

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache};
use tiny_skia::{Paint, Pixmap, Rect, Transform};

use crate::{Color, Point};

/// Line height relative to the font size.
const LINE_HEIGHT_RATIO: f32 = 1.2;

/// Shapes and rasterises text with the system fonts.
pub struct GlyphRasterizer {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl GlyphRasterizer {
    /// Load the system font database.
    pub fn new() -> Self {
        let font_system = FontSystem::new();
        let faces = font_system.db().faces().count();
        if faces == 0 {
            log::warn!("No system fonts found, text will not be drawn");
        } else {
            log::debug!("Loaded {} font faces", faces);
        }
        Self {
            font_system,
            swash_cache: SwashCache::new(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.font_system.db().faces().count()
    }

    /// Draw one line of text with its top-left corner at `position`.
    pub fn draw(&mut self, pixmap: &mut Pixmap, text: &str, position: Point, color: Color, size: f32) {
        if text.is_empty() || size <= 0.0 {
            return;
        }
        let metrics = Metrics::new(size, size * LINE_HEIGHT_RATIO);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(
            &mut self.font_system,
            text,
            &Attrs::new().family(Family::SansSerif),
            Shaping::Advanced,
        );
        buffer.shape_until_scroll(&mut self.font_system, false);

        let [r, g, b, a] = color.to_rgba8();
        let text_color = cosmic_text::Color::rgba(r, g, b, a);
        let (ox, oy) = (position.x.round() as i32, position.y.round() as i32);
        buffer.draw(
            &mut self.font_system,
            &mut self.swash_cache,
            text_color,
            |x, y, w, h, c| {
                if c.a() == 0 {
                    return;
                }
                let Some(rect) = Rect::from_xywh((ox + x) as f32, (oy + y) as f32, w as f32, h as f32)
                else {
                    return;
                };
                let mut paint = Paint::default();
                paint.set_color_rgba8(c.r(), c.g(), c.b(), c.a());
                paint.anti_alias = false;
                pixmap.fill_rect(rect, &paint, Transform::identity(), None);
            },
        );
    }
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        Self::new()
    }
}
