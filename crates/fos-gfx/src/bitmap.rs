//! Owned RGBA bitmaps produced from damaged framebuffer regions.

use crate::{Color, Size};
use image::{ImageBuffer, Rgba, RgbaImage};

/// An owned RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    image: RgbaImage,
}

impl Bitmap {
    /// Create a transparent bitmap of the given size
    pub fn new(size: Size) -> Self {
        Self {
            image: ImageBuffer::new(size.width, size.height),
        }
    }

    /// Wrap tightly packed RGBA bytes, `None` if the length doesn't match `size`
    pub fn from_rgba(size: Size, pixels: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(size.width, size.height, pixels).map(|image| Self { image })
    }

    /// Create a bitmap filled with a single color
    pub fn filled(size: Size, color: Color) -> Self {
        Self {
            image: ImageBuffer::from_pixel(size.width, size.height, Rgba(color.to_array())),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Color at `(x, y)`, `None` outside the bitmap
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.image
            .get_pixel_checked(x, y)
            .map(|Rgba([r, g, b, a])| Color::rgba(*r, *g, *b, *a))
    }

    /// All pixels in row-major order
    pub fn pixels(&self) -> &[Color] {
        bytemuck::cast_slice(self.image.as_raw())
    }
}
