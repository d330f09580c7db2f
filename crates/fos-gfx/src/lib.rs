//! fOS Gfx - Shared graphics primitives
//!
//! Geometry, colors and bitmaps passed between the display bridge
//! and the terminal renderer.

mod bitmap;
mod color;
mod geometry;

pub use bitmap::Bitmap;
pub use color::Color;
pub use geometry::{Point, Rect, Size};
