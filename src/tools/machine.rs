use crate::config::Thresholds;
use crate::events::{CanvasEvent, CanvasWarning};
use crate::keybindings::{Key, KeyBindings};
use crate::model::{AnnotationId, BoundingBox, CompletedShape, MIN_POLYGON_VERTICES, Point};
use crate::segmentation::{RequestTicket, SegmentationError, SegmentationProposal};
use crate::smart_polygon::{ApplyOutcome, EditAction, EditError, SmartPolygonSession, SmartState};
use crate::viewport::{ScreenPoint, ViewportState};

use super::{FrameContext, PointerButton, Tool, ToolState, TransientShape};

/// Clicks closer than this to the previous polygon vertex, in screen pixels,
/// are treated as the same click.
const DUPLICATE_CLICK_PX: f32 = 1.0;

/// Routes pointer and keyboard input to the active tool.
///
/// All geometry it keeps is in image space. Results are queued as
/// [`CanvasEvent`]s; call [`ToolStateMachine::drain_events`] after each input.
#[derive(Debug, Clone)]
pub struct ToolStateMachine {
    tool: Tool,
    transient: Option<TransientShape>,
    smart: SmartPolygonSession,
    thresholds: Thresholds,
    keybindings: KeyBindings,
    events: Vec<CanvasEvent>,
}

impl Default for ToolStateMachine {
    fn default() -> Self {
        Self::new(Thresholds::default(), KeyBindings::default())
    }
}

impl ToolStateMachine {
    pub fn new(thresholds: Thresholds, keybindings: KeyBindings) -> Self {
        Self {
            tool: Tool::default(),
            transient: None,
            smart: SmartPolygonSession::new(),
            thresholds,
            keybindings,
            events: Vec::new(),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> ToolState {
        match self.tool {
            Tool::Select => ToolState::Select,
            Tool::Box => ToolState::DrawingBox,
            Tool::Polygon => ToolState::AccumulatingPolygon,
            Tool::SmartPolygon => match self.smart.state() {
                SmartState::Idle => ToolState::SmartIdle,
                SmartState::Editing => ToolState::SmartEditing,
            },
        }
    }

    pub fn transient(&self) -> Option<&TransientShape> {
        self.transient.as_ref()
    }

    /// Vertices of the polygon being drawn. Empty when none is.
    pub fn polygon_points(&self) -> &[Point] {
        match &self.transient {
            Some(TransientShape::Polygon { points }) => points,
            _ => &[],
        }
    }

    pub fn smart(&self) -> &SmartPolygonSession {
        &self.smart
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    /// Switch tools, discarding whatever the old tool had in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool == self.tool {
            return;
        }
        if self.transient.take().is_some() {
            log::debug!("Discarded transient shape when leaving {}", self.tool.name());
        }
        if self.tool == Tool::SmartPolygon {
            self.smart.cancel();
        }
        log::debug!("Tool: {} -> {}", self.tool.name(), tool.name());
        self.tool = tool;
    }

    /// Drop transient state and any smart session, keeping the tool.
    pub fn reset(&mut self) {
        self.transient = None;
        self.smart.cancel();
    }

    pub fn pointer_down(&mut self, pos: ScreenPoint, button: PointerButton, ctx: &FrameContext<'_>) {
        log::trace!("pointer_down {:?} at ({}, {}) with {}", button, pos.x, pos.y, self.tool.name());
        match (self.tool, button) {
            (Tool::Select, PointerButton::Primary) => self.select_at(pos, ctx),
            (Tool::Box, PointerButton::Primary) => {
                let start = ctx.viewport.screen_to_image(pos);
                self.transient = Some(TransientShape::Box {
                    start,
                    current: start,
                });
            }
            (Tool::Polygon, PointerButton::Primary) => self.add_polygon_point(pos, ctx.viewport),
            (Tool::SmartPolygon, PointerButton::Primary) => self.smart_press(pos, ctx),
            (Tool::SmartPolygon, PointerButton::Secondary) => self.smart_remove_vertex(pos, ctx),
            _ => {}
        }
    }

    pub fn pointer_move(&mut self, pos: ScreenPoint, ctx: &FrameContext<'_>) {
        match self.tool {
            Tool::Box => {
                if let Some(TransientShape::Box { current, .. }) = self.transient.as_mut() {
                    *current = ctx.viewport.screen_to_image(pos);
                }
            }
            Tool::SmartPolygon => {
                self.smart.drag_to(pos, ctx.viewport);
            }
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, pos: ScreenPoint, ctx: &FrameContext<'_>) {
        match self.tool {
            Tool::Box => self.finish_box(pos, ctx.viewport),
            Tool::SmartPolygon => self.smart.release(),
            _ => {}
        }
    }

    pub fn double_click(&mut self, _pos: ScreenPoint, _ctx: &FrameContext<'_>) {
        if self.tool == Tool::Polygon {
            self.finish_manual_polygon();
        }
    }

    /// Returns whether the key was used.
    pub fn key(&mut self, key: Key, ctx: &FrameContext<'_>) -> bool {
        match key {
            Key::Escape => self.escape(ctx),
            Key::Enter => match self.tool {
                Tool::Polygon | Tool::SmartPolygon => {
                    self.complete_polygon();
                    true
                }
                _ => false,
            },
            Key::Delete | Key::Backspace => match (self.tool, ctx.selected) {
                (Tool::Select, Some(id)) => {
                    log::info!("Delete requested for annotation {}", id);
                    self.events.push(CanvasEvent::AnnotationDeleted(id));
                    true
                }
                _ => false,
            },
            Key::Char(c) => match self.keybindings.tool_for(c) {
                Some(tool) => {
                    self.set_tool(tool);
                    true
                }
                None => false,
            },
        }
    }

    /// Finish the polygon of the active tool. Manual polygons with fewer
    /// than three points are left alone; a short smart candidate raises a
    /// warning.
    pub fn complete_polygon(&mut self) {
        match self.tool {
            Tool::Polygon => self.finish_manual_polygon(),
            Tool::SmartPolygon => match self.smart.complete() {
                Ok(shape) => self.events.push(CanvasEvent::ShapeCompleted(shape)),
                Err(EditError::TooFewVertices { vertices }) => {
                    log::warn!("Smart polygon has only {} vertices", vertices);
                    self.warn(CanvasWarning::PolygonTooSmall { vertices });
                }
                Err(e) => log::debug!("Nothing to complete: {}", e),
            },
            _ => {}
        }
    }

    /// Discard the polygon in progress.
    pub fn cancel_polygon(&mut self) {
        match self.tool {
            Tool::Polygon => self.transient = None,
            Tool::SmartPolygon => self.smart.cancel(),
            _ => {}
        }
    }

    /// Feed back the answer to a `SegmentationRequested` event.
    pub fn apply_segmentation(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<SegmentationProposal, SegmentationError>,
    ) -> ApplyOutcome {
        let applied = self.smart.apply_result(ticket, outcome, &self.thresholds);
        if let ApplyOutcome::Fallback { reason } = &applied {
            self.warn(CanvasWarning::SegmentationFallback {
                reason: reason.clone(),
            });
        }
        applied
    }

    fn warn(&mut self, warning: CanvasWarning) {
        self.events.push(CanvasEvent::Warning(warning));
    }

    fn escape(&mut self, ctx: &FrameContext<'_>) -> bool {
        match self.tool {
            Tool::Select => {
                if ctx.selected.is_some() {
                    self.events.push(CanvasEvent::AnnotationSelected(None));
                    true
                } else {
                    false
                }
            }
            Tool::Box | Tool::Polygon => self.transient.take().is_some(),
            Tool::SmartPolygon => {
                let active = self.smart.candidate().is_some() || self.smart.is_processing();
                self.smart.cancel();
                active
            }
        }
    }

    /// Topmost valid annotation under `pos`.
    fn hit_test(&self, pos: ScreenPoint, ctx: &FrameContext<'_>) -> Option<AnnotationId> {
        let point = ctx.viewport.screen_to_image(pos);
        ctx.annotations.iter().rev().find_map(|annotation| {
            if let Err(e) = annotation.validate() {
                log::warn!("Skipping annotation {} in hit-test: {}", annotation.id, e);
                return None;
            }
            annotation
                .shape
                .contains_point(&point)
                .then_some(annotation.id)
        })
    }

    fn select_at(&mut self, pos: ScreenPoint, ctx: &FrameContext<'_>) {
        let hit = self.hit_test(pos, ctx);
        match hit {
            Some(id) => log::debug!("Selected annotation {}", id),
            None => log::debug!("No annotation at click position"),
        }
        self.events.push(CanvasEvent::AnnotationSelected(hit));
    }

    fn finish_box(&mut self, pos: ScreenPoint, viewport: &ViewportState) {
        let Some(TransientShape::Box { start, .. }) = self.transient.take() else {
            return;
        };
        let end = viewport.screen_to_image(pos);
        let bbox = BoundingBox::from_corners(start, end);

        let scale = viewport.scale();
        let min = self.thresholds.min_box_size_px;
        if bbox.width * scale > min && bbox.height * scale > min {
            log::info!(
                "Box completed at ({:.1}, {:.1}) {:.1}x{:.1}",
                bbox.x,
                bbox.y,
                bbox.width,
                bbox.height
            );
            self.events.push(CanvasEvent::ShapeCompleted(CompletedShape::Box(bbox)));
        } else {
            log::debug!("Box too small, discarded");
        }
    }

    fn add_polygon_point(&mut self, pos: ScreenPoint, viewport: &ViewportState) {
        let point = viewport.screen_to_image(pos);
        if !matches!(self.transient, Some(TransientShape::Polygon { .. })) {
            self.transient = Some(TransientShape::Polygon { points: vec![point] });
            return;
        }
        let Some(TransientShape::Polygon { points }) = self.transient.as_mut() else {
            return;
        };

        if let Some(last) = points.last() {
            let last = viewport.image_to_screen(*last);
            let (dx, dy) = (last.x - pos.x, last.y - pos.y);
            if (dx * dx + dy * dy).sqrt() < DUPLICATE_CLICK_PX {
                return;
            }
        }
        points.push(point);
        log::trace!("Polygon vertex {} at ({:.1}, {:.1})", points.len(), point.x, point.y);
    }

    fn finish_manual_polygon(&mut self) {
        let count = self.polygon_points().len();
        if count < MIN_POLYGON_VERTICES {
            log::debug!("Polygon has {} points, not finishing", count);
            return;
        }
        if let Some(TransientShape::Polygon { points }) = self.transient.take() {
            log::info!("Polygon completed with {} vertices", points.len());
            self.events
                .push(CanvasEvent::ShapeCompleted(CompletedShape::polygon(points)));
        }
    }

    fn smart_press(&mut self, pos: ScreenPoint, ctx: &FrameContext<'_>) {
        match self.smart.state() {
            SmartState::Idle => {
                if self.smart.is_processing() {
                    log::debug!("Segmentation in progress, click ignored");
                    return;
                }
                let Some(image) = ctx.image else {
                    self.warn(CanvasWarning::NoImage);
                    return;
                };
                let click = ctx.viewport.screen_to_image(pos);
                if let Some((ticket, request)) = self.smart.request_at(click, image) {
                    self.events
                        .push(CanvasEvent::SegmentationRequested { ticket, request });
                }
            }
            SmartState::Editing => {
                if let EditAction::Nothing = self.smart.press(pos, ctx.viewport, &self.thresholds) {
                    log::trace!("Smart edit click hit nothing");
                }
            }
        }
    }

    fn smart_remove_vertex(&mut self, pos: ScreenPoint, ctx: &FrameContext<'_>) {
        match self.smart.remove_vertex_at(pos, ctx.viewport, &self.thresholds) {
            Ok(_) => {}
            Err(EditError::BelowMinimum { remaining }) => {
                log::warn!("Vertex removal rejected, {} would remain", remaining);
                self.warn(CanvasWarning::VertexRemovalRejected { remaining });
            }
            Err(e) => log::trace!("Vertex removal ignored: {}", e),
        }
    }
}
