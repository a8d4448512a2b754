//! The annotation canvas: viewport, tools, smart polygon transport and
//! rendering behind one input/output surface.
//!
//! The host feeds pointer and keyboard input together with its current
//! annotation list, drains [`CanvasEvent`]s after each call, calls
//! [`AnnotationCanvas::tick`] once per frame and renders with
//! [`AnnotationCanvas::render`].

use labelkit_render::{RgbaImage, Surface};

use crate::config::CanvasConfig;
use crate::constants::ZOOM_FACTOR;
use crate::events::CanvasEvent;
use crate::keybindings::Key;
use crate::label_popup::LabelPopup;
use crate::model::{Annotation, AnnotationId, CompletedShape, ImageInfo, LabelRegistry};
use crate::render::{Frame, RenderStats, ShapeRenderer};
use crate::segmentation::{
    HttpSegmentationClient, RequestTicket, SegmentationBackend, SegmentationError,
    SegmentationProposal, SegmentationWorker,
};
use crate::smart_polygon::ApplyOutcome;
use crate::tools::{FrameContext, PointerButton, Tool, ToolState, ToolStateMachine};
use crate::viewport::{FitSettings, ScreenPoint, Size, Viewport, ViewportState};

pub struct AnnotationCanvas {
    config: CanvasConfig,
    viewport: Viewport,
    tools: ToolStateMachine,
    labels: LabelRegistry,
    renderer: ShapeRenderer,
    image: Option<ImageInfo>,
    worker: Option<SegmentationWorker>,
    popup: LabelPopup,
    events: Vec<CanvasEvent>,
}

impl AnnotationCanvas {
    pub fn new(config: CanvasConfig) -> Self {
        let viewport = Viewport::new(FitSettings::from(&config.thresholds));
        let tools = ToolStateMachine::new(config.thresholds.clone(), config.keybindings.clone());
        let labels = LabelRegistry::from_categories(config.labels.clone());
        let renderer = ShapeRenderer::new(config.style.clone(), &config.thresholds);
        Self {
            config,
            viewport,
            tools,
            labels,
            renderer,
            image: None,
            worker: None,
            popup: LabelPopup::new(),
            events: Vec::new(),
        }
    }

    /// Run segmentation calls through `backend` on a background thread.
    ///
    /// A request still running on the previous backend is abandoned and
    /// takes the fallback path.
    pub fn attach_backend(&mut self, backend: Box<dyn SegmentationBackend>) -> Result<(), SegmentationError> {
        let worker = SegmentationWorker::spawn(backend)?;
        if let Some(previous) = self.worker.replace(worker) {
            for ticket in previous.abandon() {
                self.tools.apply_segmentation(ticket, Err(SegmentationError::Disconnected));
            }
            self.pump();
        }
        Ok(())
    }

    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }

    /// Attach an HTTP client for the configured endpoint. Returns whether
    /// one was configured.
    pub fn connect_configured_endpoint(&mut self) -> Result<bool, SegmentationError> {
        let Some(endpoint) = self.config.segmentation.endpoint.clone() else {
            return Ok(false);
        };
        log::info!("Using segmentation endpoint {}", endpoint);
        let client = HttpSegmentationClient::new(endpoint, &self.config.segmentation.user_agent);
        self.attach_backend(Box::new(client))?;
        Ok(true)
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn viewport(&self) -> &ViewportState {
        self.viewport.state()
    }

    pub fn image(&self) -> Option<&ImageInfo> {
        self.image.as_ref()
    }

    pub fn tool(&self) -> Tool {
        self.tools.tool()
    }

    pub fn tool_state(&self) -> ToolState {
        self.tools.state()
    }

    pub fn tools(&self) -> &ToolStateMachine {
        &self.tools
    }

    pub fn labels(&self) -> &LabelRegistry {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelRegistry {
        &mut self.labels
    }

    pub fn popup(&self) -> &LabelPopup {
        &self.popup
    }

    pub fn popup_mut(&mut self) -> &mut LabelPopup {
        &mut self.popup
    }

    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    // Viewport

    /// Load a new image. Anything in progress on the old one is dropped.
    pub fn set_image(&mut self, image: ImageInfo) {
        log::info!("Image {} ({}x{})", image.id, image.width, image.height);
        self.tools.reset();
        let state = self
            .viewport
            .set_image(Size::new(image.width as f32, image.height as f32));
        self.image = Some(image);
        self.position_changed(state);
    }

    pub fn resize(&mut self, container: Size) {
        let state = self.viewport.resize(container);
        self.position_changed(state);
    }

    pub fn zoom_in(&mut self, cursor: ScreenPoint) {
        let state = self.viewport.zoom_in(ZOOM_FACTOR, cursor);
        self.position_changed(state);
    }

    pub fn zoom_out(&mut self, cursor: ScreenPoint) {
        let state = self.viewport.zoom_out(ZOOM_FACTOR, cursor);
        self.position_changed(state);
    }

    /// Set zoom relative to the fitted size, keeping `cursor` fixed.
    pub fn zoom_to(&mut self, zoom: f32, cursor: ScreenPoint) {
        let state = self.viewport.zoom_at(zoom, cursor);
        self.position_changed(state);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        let state = self.viewport.pan_by(dx, dy);
        self.position_changed(state);
    }

    pub fn reset_view(&mut self) {
        let state = self.viewport.reset();
        self.position_changed(state);
    }

    fn position_changed(&mut self, state: ViewportState) {
        self.events.push(CanvasEvent::ImagePositionChanged(state.origin));
    }

    // Input

    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.set_tool(tool);
        self.pump();
    }

    pub fn pointer_down(
        &mut self,
        pos: ScreenPoint,
        button: PointerButton,
        annotations: &[Annotation],
        selected: Option<AnnotationId>,
    ) {
        let state = *self.viewport.state();
        let ctx = FrameContext {
            viewport: &state,
            annotations,
            selected,
            image: self.image.as_ref(),
        };
        self.tools.pointer_down(pos, button, &ctx);
        self.pump();
    }

    pub fn pointer_move(&mut self, pos: ScreenPoint) {
        let state = *self.viewport.state();
        let ctx = FrameContext::new(&state);
        self.tools.pointer_move(pos, &ctx);
        self.pump();
    }

    pub fn pointer_up(&mut self, pos: ScreenPoint) {
        let state = *self.viewport.state();
        let ctx = FrameContext::new(&state);
        self.tools.pointer_up(pos, &ctx);
        self.pump();
    }

    pub fn double_click(&mut self, pos: ScreenPoint) {
        let state = *self.viewport.state();
        let ctx = FrameContext::new(&state);
        self.tools.double_click(pos, &ctx);
        self.pump();
    }

    /// Returns whether the key was used.
    pub fn key(&mut self, key: Key, selected: Option<AnnotationId>) -> bool {
        let state = *self.viewport.state();
        let ctx = FrameContext {
            viewport: &state,
            annotations: &[],
            selected,
            image: self.image.as_ref(),
        };
        let used = self.tools.key(key, &ctx);
        self.pump();
        used
    }

    pub fn complete_polygon(&mut self) {
        self.tools.complete_polygon();
        self.pump();
    }

    pub fn cancel_polygon(&mut self) {
        self.tools.cancel_polygon();
        self.pump();
    }

    // Segmentation

    /// Answer a `SegmentationRequested` event when no worker is attached.
    pub fn apply_segmentation(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<SegmentationProposal, SegmentationError>,
    ) -> ApplyOutcome {
        let applied = self.tools.apply_segmentation(ticket, outcome);
        self.pump();
        applied
    }

    /// Collect finished segmentation calls. Never blocks.
    pub fn tick(&mut self) {
        let mut finished = Vec::new();
        if let Some(worker) = self.worker.as_mut() {
            while let Some(result) = worker.try_result() {
                finished.push(result);
            }
            if worker.is_disconnected() {
                log::warn!("Segmentation worker stopped, requests now go to the host");
                self.worker = None;
            }
        }
        for result in finished {
            self.tools.apply_segmentation(result.ticket, result.outcome);
        }
        self.pump();
    }

    /// Whether a segmentation call is still outstanding.
    pub fn is_segmenting(&self) -> bool {
        self.tools.smart().is_processing()
    }

    /// Move tool output to the host queue, dispatching segmentation
    /// requests to the worker and opening the label picker for new shapes.
    fn pump(&mut self) {
        // Failed submissions feed back a fallback, which can queue more events
        loop {
            let events = self.tools.drain_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    CanvasEvent::SegmentationRequested { ticket, request } => {
                        match self.worker.as_mut() {
                            Some(worker) => {
                                if let Err(e) = worker.submit(ticket, request) {
                                    log::warn!("Could not submit segmentation: {}", e);
                                    self.tools.apply_segmentation(ticket, Err(e));
                                }
                            }
                            None => self
                                .events
                                .push(CanvasEvent::SegmentationRequested { ticket, request }),
                        }
                    }
                    CanvasEvent::ShapeCompleted(shape) => {
                        self.popup.open(shape.clone(), &self.labels);
                        self.events.push(CanvasEvent::ShapeCompleted(shape));
                    }
                    other => self.events.push(other),
                }
            }
        }
    }

    // Labels

    /// Accept the picker's selection for the last completed shape.
    pub fn confirm_label(&mut self) -> Option<(CompletedShape, String)> {
        self.popup.confirm(&self.labels)
    }

    pub fn dismiss_label(&mut self) -> Option<CompletedShape> {
        self.popup.dismiss(&self.labels)
    }

    // Rendering

    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        image: Option<&RgbaImage>,
        annotations: &[Annotation],
        selected: Option<AnnotationId>,
    ) -> RenderStats {
        let frame = Frame {
            viewport: self.viewport.state(),
            image,
            annotations,
            selected,
            transient: self.tools.transient(),
            smart: Some(self.tools.smart()),
            labels: &self.labels,
        };
        self.renderer.render(surface, &frame)
    }
}

impl Default for AnnotationCanvas {
    fn default() -> Self {
        Self::new(CanvasConfig::default())
    }
}
