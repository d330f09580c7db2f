//! Shared Framebuffer - a mapped shared-memory pixel buffer
//!
//! Rows are tightly packed, 4 bytes per pixel. The buffer is never
//! resized in place: a new allocation maps a new region.

use crate::error::MappingError;
use crate::region::SharedMemoryRegion;
use fos_gfx::{Bitmap, Rect, Size};
use memmap2::{MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

const BYTES_PER_PIXEL: usize = 4;

/// Byte order of pixels in the shared region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Blue, green, red, alpha (native N32 on little-endian compositors)
    #[default]
    Bgra8,
    /// Red, green, blue, alpha
    Rgba8,
}

/// A shared-memory region mapped read/write, tagged with its pixel size
pub struct SharedFramebuffer {
    mapping: MmapMut,
    size: Size,
    format: PixelFormat,
}

impl SharedFramebuffer {
    /// Map `region` as a `size` framebuffer
    pub fn map(
        region: &SharedMemoryRegion,
        size: Size,
        format: PixelFormat,
    ) -> Result<Self, MappingError> {
        if size.is_empty() {
            return Err(MappingError::EmptySize);
        }

        let required = size
            .area()
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or(MappingError::SizeOverflow)?;

        if region.len() < required {
            return Err(MappingError::RegionTooSmall {
                required,
                available: region.len(),
            });
        }

        let backing = usize::try_from(region.backing_len()?).unwrap_or(usize::MAX);
        if backing < required {
            return Err(MappingError::RegionTooSmall {
                required,
                available: backing,
            });
        }

        // SAFETY: the region is shared with the compositor, which only
        // writes pixels into it; we never hand out references that outlive
        // the mapping and treat its contents as plain bytes.
        let mapping = unsafe { MmapOptions::new().len(required).map_mut(region.file())? };

        debug!("Mapped {} framebuffer ({} bytes)", size, required);

        Ok(Self {
            mapping,
            size,
            format,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// The whole framebuffer as a rectangle at the origin
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.size)
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.size.width as usize * BYTES_PER_PIXEL
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mapping
    }

    /// Copy `rect ∩ bounds` out of the mapping as an RGBA bitmap.
    ///
    /// Returns the clipped rectangle alongside the bitmap. A rectangle that
    /// misses the framebuffer yields an empty bitmap at the requested origin.
    pub fn copy_rect(&self, rect: Rect) -> (Rect, Bitmap) {
        let Some(clipped) = self.bounds().intersection(&rect) else {
            let empty = Rect::new(rect.x, rect.y, 0, 0);
            return (empty, Bitmap::new(Size::default()));
        };

        let stride = self.stride();
        let x = clipped.x as usize;
        let row_len = clipped.width as usize * BYTES_PER_PIXEL;
        let mut rgba = Vec::with_capacity(row_len * clipped.height as usize);

        for y in clipped.y as usize..clipped.y as usize + clipped.height as usize {
            let start = y * stride + x * BYTES_PER_PIXEL;
            let row = &self.mapping[start..start + row_len];

            match self.format {
                PixelFormat::Rgba8 => rgba.extend_from_slice(row),
                PixelFormat::Bgra8 => {
                    let pixels: &[[u8; 4]] = bytemuck::cast_slice(row);
                    for &[b, g, r, a] in pixels {
                        rgba.extend_from_slice(&[r, g, b, a]);
                    }
                }
            }
        }

        let bitmap = Bitmap::from_rgba(clipped.size(), rgba)
            .unwrap_or_else(|| Bitmap::new(clipped.size()));

        (clipped, bitmap)
    }
}

impl std::fmt::Debug for SharedFramebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFramebuffer")
            .field("size", &self.size)
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_gfx::Color;
    use std::io::Write;

    fn region_with(bytes: &[u8]) -> SharedMemoryRegion {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(bytes).unwrap();
        SharedMemoryRegion::new(file, bytes.len())
    }

    #[test]
    fn test_map_rejects_empty_size() {
        let region = region_with(&[0; 16]);
        let result = SharedFramebuffer::map(&region, Size::new(0, 4), PixelFormat::Bgra8);
        assert!(matches!(result, Err(MappingError::EmptySize)));
    }

    #[test]
    fn test_map_rejects_small_region() {
        let region = region_with(&[0; 15]);
        let result = SharedFramebuffer::map(&region, Size::new(2, 2), PixelFormat::Bgra8);
        assert!(matches!(
            result,
            Err(MappingError::RegionTooSmall { required: 16, available: 15 })
        ));
    }

    #[test]
    fn test_map_rejects_overstated_region() {
        let file = tempfile::tempfile().unwrap();
        file.set_len(8).unwrap();
        let region = SharedMemoryRegion::new(file, 64);

        let result = SharedFramebuffer::map(&region, Size::new(2, 2), PixelFormat::Bgra8);
        assert!(matches!(
            result,
            Err(MappingError::RegionTooSmall { required: 16, available: 8 })
        ));
    }

    #[test]
    fn test_copy_rect_swizzles_bgra() {
        // 2x1: blue pixel, then red pixel (stored BGRA)
        let region = region_with(&[0xFF, 0, 0, 0xFF, 0, 0, 0xFF, 0xFF]);
        let fb = SharedFramebuffer::map(&region, Size::new(2, 1), PixelFormat::Bgra8).unwrap();

        let (rect, bitmap) = fb.copy_rect(Rect::new(0, 0, 2, 1));
        assert_eq!(rect, Rect::new(0, 0, 2, 1));
        assert_eq!(bitmap.pixel(0, 0), Some(Color::rgb(0, 0, 0xFF)));
        assert_eq!(bitmap.pixel(1, 0), Some(Color::RED));
    }

    #[test]
    fn test_copy_rect_clips_to_bounds() {
        let region = region_with(&[0x80; 4 * 4 * 4]);
        let fb = SharedFramebuffer::map(&region, Size::new(4, 4), PixelFormat::Rgba8).unwrap();

        let (rect, bitmap) = fb.copy_rect(Rect::new(2, -1, 10, 2));
        assert_eq!(rect, Rect::new(2, 0, 2, 1));
        assert_eq!(bitmap.size(), Size::new(2, 1));
    }

    #[test]
    fn test_copy_rect_outside_bounds_is_empty() {
        let region = region_with(&[0; 16]);
        let fb = SharedFramebuffer::map(&region, Size::new(2, 2), PixelFormat::Rgba8).unwrap();

        let (rect, bitmap) = fb.copy_rect(Rect::new(10, 10, 5, 5));
        assert!(rect.is_empty());
        assert_eq!(bitmap.size(), Size::default());
    }

    #[test]
    fn test_mapping_is_writable() {
        let region = region_with(&[0; 4]);
        let mut fb = SharedFramebuffer::map(&region, Size::new(1, 1), PixelFormat::Rgba8).unwrap();

        fb.as_bytes_mut().copy_from_slice(&[1, 2, 3, 4]);
        let (_, bitmap) = fb.copy_rect(fb.bounds());
        assert_eq!(bitmap.pixel(0, 0), Some(Color::rgba(1, 2, 3, 4)));
    }
}
