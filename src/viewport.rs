//! Image-space ⇄ screen-space mapping and the fit/zoom/pan recompute.
//!
//! Shapes are stored in image space only. [`ViewportState`] is applied at
//! render and hit-test time, never baked into stored geometry.

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::model::Point;

pub use labelkit_render::Point as ScreenPoint;

/// Lowest user zoom, relative to the fitted size.
pub const MIN_ZOOM: f32 = 0.25;
/// Highest user zoom, relative to the fitted size.
pub const MAX_ZOOM: f32 = 5.0;

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// The transform currently applied to the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// 100 means one image pixel per screen pixel.
    pub zoom_percent: f32,
    /// Screen position of the image's top-left corner.
    pub origin: ScreenPoint,
    /// Natural image size in image pixels.
    pub image_size: Size,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom_percent: 100.0,
            origin: ScreenPoint::default(),
            image_size: Size::default(),
        }
    }
}

impl ViewportState {
    pub fn new(zoom_percent: f32, origin: ScreenPoint, image_size: Size) -> Self {
        Self {
            zoom_percent,
            origin,
            image_size,
        }
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.zoom_percent / 100.0
    }

    pub fn screen_to_image(&self, p: ScreenPoint) -> Point {
        let scale = self.scale();
        Point::new((p.x - self.origin.x) / scale, (p.y - self.origin.y) / scale)
    }

    pub fn image_to_screen(&self, p: Point) -> ScreenPoint {
        let scale = self.scale();
        ScreenPoint::new(p.x * scale + self.origin.x, p.y * scale + self.origin.y)
    }

    /// Convert a screen-space length into image units.
    pub fn screen_len_to_image(&self, len: f32) -> f32 {
        len / self.scale()
    }

    /// Size of the image on screen.
    pub fn display_size(&self) -> Size {
        let scale = self.scale();
        Size::new(self.image_size.width * scale, self.image_size.height * scale)
    }
}

/// Parameters of the fit computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    /// Share of the container the image may take on its constraining axis.
    pub fit_fraction: f32,
    /// Tiny images are scaled up until their longer side reaches this.
    pub min_display_size: f32,
}

impl From<&Thresholds> for FitSettings {
    fn from(t: &Thresholds) -> Self {
        Self {
            fit_fraction: t.fit_fraction,
            min_display_size: t.min_display_size,
        }
    }
}

/// Scale that fits `image` into `container` while keeping its aspect ratio.
pub fn fit_scale(container: Size, image: Size, settings: FitSettings) -> f32 {
    if image.is_empty() || container.is_empty() {
        return 1.0;
    }

    let scale_x = container.width * settings.fit_fraction / image.width;
    let scale_y = container.height * settings.fit_fraction / image.height;
    let mut scale = scale_x.min(scale_y);

    let longest = image.width.max(image.height) * scale;
    if longest < settings.min_display_size {
        scale = settings.min_display_size / image.width.max(image.height);
    }
    scale
}

/// Owns the fit/zoom/pan inputs and derives [`ViewportState`] from them.
///
/// [`Viewport::recompute`] is a pure function of the stored inputs, so
/// calling it repeatedly without changes yields the same state.
#[derive(Debug, Clone)]
pub struct Viewport {
    container: Size,
    image_size: Size,
    settings: FitSettings,
    /// User zoom relative to the fitted size.
    zoom: f32,
    /// Offset added to the centered origin, in screen pixels.
    pan: (f32, f32),
    state: ViewportState,
}

impl Viewport {
    pub fn new(settings: FitSettings) -> Self {
        Self {
            container: Size::default(),
            image_size: Size::default(),
            settings,
            zoom: 1.0,
            pan: (0.0, 0.0),
            state: ViewportState::default(),
        }
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn container(&self) -> Size {
        self.container
    }

    /// Recompute the state from the current inputs.
    pub fn recompute(&mut self) -> ViewportState {
        let scale = fit_scale(self.container, self.image_size, self.settings) * self.zoom;
        let display = Size::new(self.image_size.width * scale, self.image_size.height * scale);
        let origin = ScreenPoint::new(
            (self.container.width - display.width) / 2.0 + self.pan.0,
            (self.container.height - display.height) / 2.0 + self.pan.1,
        );
        self.state = ViewportState::new(scale * 100.0, origin, self.image_size);
        log::trace!(
            "Viewport: zoom {:.1}%, origin ({:.1}, {:.1})",
            self.state.zoom_percent,
            origin.x,
            origin.y
        );
        self.state
    }

    /// Container resized.
    pub fn resize(&mut self, container: Size) -> ViewportState {
        self.container = container;
        self.recompute()
    }

    /// A new image was loaded; zoom and pan start over.
    pub fn set_image(&mut self, image_size: Size) -> ViewportState {
        self.image_size = image_size;
        self.zoom = 1.0;
        self.pan = (0.0, 0.0);
        self.recompute()
    }

    pub fn set_zoom(&mut self, zoom: f32) -> ViewportState {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.recompute()
    }

    /// Zoom while keeping the image point under `cursor` fixed on screen.
    pub fn zoom_at(&mut self, zoom: f32, cursor: ScreenPoint) -> ViewportState {
        let anchor = self.state.screen_to_image(cursor);
        self.set_zoom(zoom);
        let moved = self.state.image_to_screen(anchor);
        self.pan.0 += cursor.x - moved.x;
        self.pan.1 += cursor.y - moved.y;
        self.recompute()
    }

    pub fn zoom_in(&mut self, factor: f32, cursor: ScreenPoint) -> ViewportState {
        self.zoom_at(self.zoom * factor, cursor)
    }

    pub fn zoom_out(&mut self, factor: f32, cursor: ScreenPoint) -> ViewportState {
        self.zoom_at(self.zoom / factor, cursor)
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) -> ViewportState {
        self.pan.0 += dx;
        self.pan.1 += dy;
        self.recompute()
    }

    /// Back to the fitted, centered view.
    pub fn reset(&mut self) -> ViewportState {
        self.zoom = 1.0;
        self.pan = (0.0, 0.0);
        self.recompute()
    }
}
