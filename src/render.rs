//! Per-frame drawing of the image, persisted annotations, the shape being
//! drawn and the smart polygon overlay.
//!
//! Everything is stored in image space and mapped through the current
//! [`ViewportState`] here, so nothing drawn is ever fed back into geometry.

use labelkit_render::{Color, Rectangle, RgbaImage, Surface};
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::model::{Annotation, AnnotationId, AnnotationShape, LabelRegistry, Point};
use crate::smart_polygon::SmartPolygonSession;
use crate::tools::TransientShape;
use crate::viewport::{ScreenPoint, ViewportState};

/// Lowest overlay opacity factor, reached at zero confidence.
const MIN_CONFIDENCE_ALPHA: f32 = 0.3;

/// Rough glyph advance as a fraction of the text size.
const GLYPH_WIDTH_RATIO: f32 = 0.6;

/// Colors and sizes used when drawing a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    pub background: Color,
    pub stroke_width: f32,
    pub selected_color: Color,
    pub selected_stroke_width: f32,
    /// Alpha of shape fills
    pub fill_alpha: f32,
    pub vertex_radius: f32,
    pub label_text_size: f32,
    pub label_padding: f32,
    pub label_text_color: Color,
    /// Shape being drawn
    pub preview_color: Color,
    /// Smart polygon candidate
    pub smart_color: Color,
    pub vertex_color: Color,
    /// Vertex being dragged
    pub drag_vertex_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            background: Color::rgb(0.12, 0.12, 0.14),
            stroke_width: 2.0,
            selected_color: Color::new(1.0, 1.0, 0.5, 0.95),
            selected_stroke_width: 3.0,
            fill_alpha: 0.2,
            vertex_radius: 4.0,
            label_text_size: 12.0,
            label_padding: 3.0,
            label_text_color: Color::WHITE,
            preview_color: Color::new(0.3, 0.8, 1.0, 0.7),
            smart_color: Color::rgb(0.2, 0.9, 0.4),
            vertex_color: Color::WHITE,
            drag_vertex_color: Color::rgb(1.0, 0.4, 0.2),
        }
    }
}

/// Everything one frame shows.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub viewport: &'a ViewportState,
    pub image: Option<&'a RgbaImage>,
    /// Persisted annotations, bottom first.
    pub annotations: &'a [Annotation],
    pub selected: Option<AnnotationId>,
    pub transient: Option<&'a TransientShape>,
    pub smart: Option<&'a SmartPolygonSession>,
    pub labels: &'a LabelRegistry,
}

/// Counts from one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub drawn: usize,
    /// Annotations with malformed geometry
    pub skipped: usize,
}

/// Draws frames onto any [`Surface`].
#[derive(Debug, Clone)]
pub struct ShapeRenderer {
    style: RenderStyle,
    min_box_size_px: f32,
}

impl ShapeRenderer {
    pub fn new(style: RenderStyle, thresholds: &Thresholds) -> Self {
        Self {
            style,
            min_box_size_px: thresholds.min_box_size_px,
        }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
    }

    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S, frame: &Frame<'_>) -> RenderStats {
        surface.clear(self.style.background);

        let vp = frame.viewport;
        if let Some(image) = frame.image {
            let size = vp.display_size();
            surface.draw_image(image, Rectangle::new(vp.origin.x, vp.origin.y, size.width, size.height));
        }

        let mut stats = RenderStats::default();
        for annotation in frame.annotations {
            if let Err(e) = annotation.validate() {
                log::warn!("Skipping annotation {} in render: {}", annotation.id, e);
                stats.skipped += 1;
                continue;
            }
            let selected = frame.selected == Some(annotation.id);
            self.draw_annotation(surface, vp, annotation, selected, frame.labels);
            stats.drawn += 1;
        }

        if let Some(transient) = frame.transient {
            self.draw_transient(surface, vp, transient);
        }
        if let Some(smart) = frame.smart {
            self.draw_smart(surface, vp, smart);
        }

        log::trace!("Frame drawn: {} annotations, {} skipped", stats.drawn, stats.skipped);
        stats
    }

    fn draw_annotation<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        vp: &ViewportState,
        annotation: &Annotation,
        selected: bool,
        labels: &LabelRegistry,
    ) {
        let color = annotation
            .color
            .unwrap_or_else(|| labels.color_for(&annotation.label));
        let (stroke, width) = if selected {
            (self.style.selected_color, self.style.selected_stroke_width)
        } else {
            (color, self.style.stroke_width)
        };
        let fill = color.with_alpha(self.style.fill_alpha);

        let anchor = match &annotation.shape {
            AnnotationShape::Box(b) => {
                let rect = screen_rect(vp, b.top_left(), b.bottom_right());
                surface.fill_rect(rect, fill);
                surface.stroke_rect(rect, stroke, width);
                rect.origin()
            }
            AnnotationShape::Polygon(poly) => {
                let points = to_screen(vp, &poly.points);
                surface.fill_polygon(&points, fill);
                surface.stroke_polyline(&points, stroke, width, true);
                for p in &points {
                    surface.fill_circle(*p, self.style.vertex_radius, stroke);
                }
                match poly.label_anchor() {
                    Some(p) => vp.image_to_screen(p),
                    None => return,
                }
            }
        };

        self.draw_label_chip(surface, labels.display_name(&annotation.label), anchor, color);
    }

    /// Label text on a filled chip sitting just above `anchor`.
    fn draw_label_chip<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        text: &str,
        anchor: ScreenPoint,
        color: Color,
    ) {
        if text.is_empty() {
            return;
        }
        let pad = self.style.label_padding;
        let size = self.style.label_text_size;
        let width = text.chars().count() as f32 * size * GLYPH_WIDTH_RATIO + pad * 2.0;
        let height = size + pad * 2.0;

        let chip = Rectangle::new(anchor.x, anchor.y - height, width, height);
        surface.fill_rect(chip, color.with_alpha(0.85));
        surface.draw_text(
            text,
            ScreenPoint::new(chip.x + pad, chip.y + pad),
            self.style.label_text_color,
            size,
        );
    }

    fn draw_transient<S: Surface + ?Sized>(&self, surface: &mut S, vp: &ViewportState, shape: &TransientShape) {
        let color = self.style.preview_color;
        match shape {
            TransientShape::Box { start, current } => {
                let rect = screen_rect(vp, *start, *current);
                // Fill only once the box would be kept
                if rect.width.abs() > self.min_box_size_px && rect.height.abs() > self.min_box_size_px {
                    surface.fill_rect(rect, color.with_alpha(self.style.fill_alpha));
                }
                surface.stroke_rect(rect, color, self.style.stroke_width);
            }
            TransientShape::Polygon { points } => {
                let points = to_screen(vp, points);
                if points.len() > 1 {
                    surface.stroke_polyline(&points, color, self.style.stroke_width, false);
                }
                for p in &points {
                    surface.fill_circle(*p, self.style.vertex_radius, color);
                }
            }
        }
    }

    fn draw_smart<S: Surface + ?Sized>(&self, surface: &mut S, vp: &ViewportState, smart: &SmartPolygonSession) {
        let Some(candidate) = smart.candidate() else {
            return;
        };
        let points = to_screen(vp, &candidate.points);
        let weight = confidence_alpha(candidate.confidence);
        let color = self.style.smart_color;

        if points.len() >= 3 {
            surface.fill_polygon(&points, color.with_alpha(self.style.fill_alpha * weight));
        }
        surface.stroke_polyline(&points, color.scale_alpha(weight), self.style.stroke_width, true);

        for (i, p) in points.iter().enumerate() {
            let vertex_color = if smart.dragging() == Some(i) {
                self.style.drag_vertex_color
            } else {
                self.style.vertex_color
            };
            surface.fill_circle(*p, self.style.vertex_radius, vertex_color);
        }
    }
}

/// Opacity factor for an overlay of the given confidence.
fn confidence_alpha(confidence: f32) -> f32 {
    MIN_CONFIDENCE_ALPHA + (1.0 - MIN_CONFIDENCE_ALPHA) * confidence.clamp(0.0, 1.0)
}

fn to_screen(vp: &ViewportState, points: &[Point]) -> Vec<ScreenPoint> {
    points.iter().map(|p| vp.image_to_screen(*p)).collect()
}

/// Normalized screen rectangle spanning two image-space corners.
fn screen_rect(vp: &ViewportState, a: Point, b: Point) -> Rectangle {
    let a = vp.image_to_screen(a);
    let b = vp.image_to_screen(b);
    Rectangle::new(a.x.min(b.x), a.y.min(b.y), (b.x - a.x).abs(), (b.y - a.y).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Category, ImageInfo, Polygon};
    use crate::segmentation::SegmentationProposal;
    use crate::viewport::Size;
    use labelkit_render::{CommandRecorder, DrawCommand};

    fn viewport() -> ViewportState {
        ViewportState::new(200.0, ScreenPoint::new(10.0, 20.0), Size::new(100.0, 100.0))
    }

    fn renderer() -> ShapeRenderer {
        ShapeRenderer::new(RenderStyle::default(), &Thresholds::default())
    }

    fn frame<'a>(
        vp: &'a ViewportState,
        annotations: &'a [Annotation],
        labels: &'a LabelRegistry,
    ) -> Frame<'a> {
        Frame {
            viewport: vp,
            image: None,
            annotations,
            selected: None,
            transient: None,
            smart: None,
            labels,
        }
    }

    fn count(commands: &[DrawCommand], pred: impl Fn(&DrawCommand) -> bool) -> usize {
        commands.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_box_is_drawn_in_screen_space_with_label() {
        let vp = viewport();
        let labels = LabelRegistry::from_categories(vec![
            Category::new(1, "car").with_display_name("Car"),
        ]);
        let anns = vec![Annotation::new(
            1,
            "car",
            AnnotationShape::Box(BoundingBox::new(5.0, 5.0, 10.0, 20.0)),
        )];
        let mut surface = CommandRecorder::new(200, 200);
        let stats = renderer().render(&mut surface, &frame(&vp, &anns, &labels));

        assert_eq!(stats, RenderStats { drawn: 1, skipped: 0 });
        let expected = Rectangle::new(20.0, 30.0, 20.0, 40.0);
        assert!(surface.commands().iter().any(|c| matches!(
            c,
            DrawCommand::StrokeRect { rect, width, .. } if *rect == expected && *width == 2.0
        )));
        assert_eq!(surface.texts(), vec!["Car"]);
    }

    #[test]
    fn test_selected_annotation_uses_highlight() {
        let vp = viewport();
        let labels = LabelRegistry::new();
        let anns = vec![
            Annotation::new(1, "a", AnnotationShape::Box(BoundingBox::new(0.0, 0.0, 10.0, 10.0))),
            Annotation::new(2, "b", AnnotationShape::Box(BoundingBox::new(20.0, 0.0, 10.0, 10.0))),
        ];
        let style = RenderStyle::default();
        let mut f = frame(&vp, &anns, &labels);
        f.selected = Some(2);

        let mut surface = CommandRecorder::new(200, 200);
        renderer().render(&mut surface, &f);

        let highlighted = count(surface.commands(), |c| {
            matches!(c, DrawCommand::StrokeRect { color, width, .. }
                if *color == style.selected_color && *width == style.selected_stroke_width)
        });
        assert_eq!(highlighted, 1);
    }

    #[test]
    fn test_polygon_has_markers_and_anchored_label() {
        let vp = viewport();
        let labels = LabelRegistry::new();
        let anns = vec![Annotation::new(
            4,
            "tree",
            AnnotationShape::Polygon(Polygon::new(vec![
                Point::new(30.0, 10.0),
                Point::new(40.0, 30.0),
                Point::new(10.0, 10.0),
            ])),
        )];
        let mut surface = CommandRecorder::new(200, 200);
        renderer().render(&mut surface, &frame(&vp, &anns, &labels));

        let cmds = surface.commands();
        assert_eq!(count(cmds, |c| matches!(c, DrawCommand::FillCircle { .. })), 3);
        assert_eq!(
            count(cmds, |c| matches!(c, DrawCommand::StrokePolyline { closed: true, .. })),
            1
        );
        // Anchor (10, 10) maps to screen (30, 40); the chip sits above it
        let chip_text = cmds.iter().find_map(|c| match c {
            DrawCommand::DrawText { text, position, .. } => Some((text.clone(), *position)),
            _ => None,
        });
        let (text, position) = chip_text.unwrap();
        assert_eq!(text, "tree");
        assert_eq!(position.x, 33.0);
        assert!(position.y < 40.0);
    }

    #[test]
    fn test_malformed_annotations_are_skipped() {
        let vp = viewport();
        let labels = LabelRegistry::new();
        let anns = vec![
            Annotation::new(
                1,
                "bad",
                AnnotationShape::Polygon(Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)])),
            ),
            Annotation::new(2, "nan", AnnotationShape::Box(BoundingBox::new(f32::NAN, 0.0, 5.0, 5.0))),
            Annotation::new(3, "ok", AnnotationShape::Box(BoundingBox::new(0.0, 0.0, 5.0, 5.0))),
        ];
        let mut surface = CommandRecorder::new(200, 200);
        let stats = renderer().render(&mut surface, &frame(&vp, &anns, &labels));
        assert_eq!(stats, RenderStats { drawn: 1, skipped: 2 });
        assert_eq!(surface.texts(), vec!["ok"]);
    }

    #[test]
    fn test_box_preview_fills_only_when_large_enough() {
        let vp = ViewportState::new(100.0, ScreenPoint::new(0.0, 0.0), Size::new(100.0, 100.0));
        let labels = LabelRegistry::new();

        let small = TransientShape::Box {
            start: Point::new(10.0, 10.0),
            current: Point::new(13.0, 13.0),
        };
        let large = TransientShape::Box {
            start: Point::new(10.0, 10.0),
            current: Point::new(60.0, 40.0),
        };

        for (shape, fills) in [(small, 0), (large, 1)] {
            let mut f = frame(&vp, &[], &labels);
            f.transient = Some(&shape);
            let mut surface = CommandRecorder::new(100, 100);
            renderer().render(&mut surface, &f);
            let cmds = surface.commands();
            assert_eq!(count(cmds, |c| matches!(c, DrawCommand::FillRect { .. })), fills);
            assert_eq!(count(cmds, |c| matches!(c, DrawCommand::StrokeRect { .. })), 1);
        }
    }

    #[test]
    fn test_polygon_preview_is_open() {
        let vp = viewport();
        let labels = LabelRegistry::new();
        let shape = TransientShape::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
        };
        let mut f = frame(&vp, &[], &labels);
        f.transient = Some(&shape);
        let mut surface = CommandRecorder::new(100, 100);
        renderer().render(&mut surface, &f);
        assert_eq!(
            count(surface.commands(), |c| matches!(
                c,
                DrawCommand::StrokePolyline { closed: false, .. }
            )),
            1
        );
    }

    #[test]
    fn test_smart_overlay_alpha_follows_confidence() {
        let vp = viewport();
        let labels = LabelRegistry::new();
        let image = ImageInfo::new("img", 100, 100);
        let thresholds = Thresholds::default();

        let stroke_alpha = |confidence: f32| {
            let mut session = SmartPolygonSession::new();
            let (ticket, _) = session.request_at(Point::new(20.0, 20.0), &image).unwrap();
            session.apply_result(
                ticket,
                Ok(SegmentationProposal {
                    points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(5.0, 8.0)],
                    confidence,
                    algorithm: "test".to_string(),
                }),
                &thresholds,
            );
            let mut f = frame(&vp, &[], &labels);
            f.smart = Some(&session);
            let mut surface = CommandRecorder::new(100, 100);
            renderer().render(&mut surface, &f);
            surface
                .commands()
                .iter()
                .find_map(|c| match c {
                    DrawCommand::StrokePolyline { color, .. } => Some(color.a),
                    _ => None,
                })
                .unwrap()
        };

        let low = stroke_alpha(0.1);
        let high = stroke_alpha(0.9);
        assert!(low < high);
        assert!(low > 0.0);
    }

    #[test]
    fn test_dragged_vertex_gets_its_own_color() {
        let vp = ViewportState::new(100.0, ScreenPoint::new(0.0, 0.0), Size::new(100.0, 100.0));
        let labels = LabelRegistry::new();
        let image = ImageInfo::new("img", 100, 100);
        let thresholds = Thresholds::default();
        let style = RenderStyle::default();

        let mut session = SmartPolygonSession::new();
        let (ticket, _) = session.request_at(Point::new(50.0, 50.0), &image).unwrap();
        session.apply_result(ticket, Err(crate::segmentation::SegmentationError::EmptyResult), &thresholds);
        // Fallback square corner (0, 0)
        session.press(ScreenPoint::new(1.0, 1.0), &vp, &thresholds);
        assert_eq!(session.dragging(), Some(0));

        let mut f = frame(&vp, &[], &labels);
        f.smart = Some(&session);
        let mut surface = CommandRecorder::new(100, 100);
        renderer().render(&mut surface, &f);

        let colors: Vec<Color> = surface
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillCircle { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(colors.len(), 4);
        assert_eq!(colors[0], style.drag_vertex_color);
        assert!(colors[1..].iter().all(|c| *c == style.vertex_color));
    }

    #[test]
    fn test_image_is_drawn_at_origin_and_scale() {
        let vp = viewport();
        let labels = LabelRegistry::new();
        let image = RgbaImage::new(100, 100);
        let mut f = frame(&vp, &[], &labels);
        f.image = Some(&image);
        let mut surface = CommandRecorder::new(300, 300);
        renderer().render(&mut surface, &f);
        assert_eq!(
            surface.commands()[1],
            DrawCommand::DrawImage {
                image_size: (100, 100),
                dest: Rectangle::new(10.0, 20.0, 200.0, 200.0),
            }
        );
    }
}
