//! labelkit - annotation canvas engine
//!
//! Draws boxes and polygons over an image: viewport transforms, the drawing
//! tool state machine, hit-testing, the smart polygon workflow with its
//! segmentation client, and frame rendering onto a [`labelkit_render::Surface`].

pub mod canvas;
pub mod config;
pub mod constants;
pub mod events;
pub mod geometry;
pub mod keybindings;
pub mod label_popup;
pub mod model;
pub mod render;
pub mod segmentation;
pub mod smart_polygon;
pub mod tools;
pub mod viewport;

pub use canvas::AnnotationCanvas;
pub use config::{CanvasConfig, ConfigError};
pub use events::{CanvasEvent, CanvasWarning};
pub use keybindings::Key;
pub use model::{Annotation, AnnotationShape, CompletedShape, ImageInfo};
pub use tools::{PointerButton, Tool, ToolState};
pub use viewport::{ScreenPoint, Size};
