//! fOS Render - Terminal rendering surface
//!
//! Turns text batches and damaged bitmaps into a grid of terminal cells
//! and paints it with ANSI escape sequences.

mod error;
mod grid;
mod painter;
mod renderer;
mod service;
mod text;

pub use error::RenderError;
pub use grid::{Cell, CellMetrics, Grapheme, TerminalRenderer};
pub use painter::{detect_true_color, Painter};
pub use renderer::{Renderer, RendererHandle};
pub use service::RenderCommandService;
pub use text::{Text, TextDrawCommand};
