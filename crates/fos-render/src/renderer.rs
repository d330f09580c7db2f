//! Renderer trait and the shared handle to the rendering surface.

use crate::error::RenderError;
use crate::text::Text;
use fos_gfx::{Bitmap, Point, Rect};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// A surface that draws text batches and damaged bitmaps
pub trait Renderer: Send {
    /// Replace the visible text with `texts`, painted in order
    fn draw_text(&mut self, texts: Vec<Text>);

    /// Composite a damaged region of pixels
    fn draw_bitmap(&mut self, rect: Rect, bitmap: &Bitmap);

    /// Push pending changes to the output
    fn render(&mut self) -> io::Result<()>;

    /// Show the text cursor at a surface position, or hide it
    fn set_cursor(&mut self, _cursor: Option<Point>) {}

    /// Return the output device to its normal state before exit
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Shared handle to the process' rendering surface.
///
/// Starts empty until a renderer is installed. Every operation holds the
/// lock for its whole duration, so batches never interleave.
#[derive(Clone, Default)]
pub struct RendererHandle {
    slot: Arc<Mutex<Option<Box<dyn Renderer>>>>,
}

impl RendererHandle {
    /// A handle with no renderer installed yet
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(renderer: impl Renderer + 'static) -> Self {
        let handle = Self::new();
        handle.install(renderer);
        handle
    }

    /// Install (or replace) the renderer
    pub fn install(&self, renderer: impl Renderer + 'static) {
        *self.lock() = Some(Box::new(renderer));
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    /// Run `f` against the renderer while holding the lock
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Renderer) -> R) -> Result<R, RenderError> {
        let mut slot = self.lock();
        let renderer = slot.as_deref_mut().ok_or(RenderError::RendererUnavailable)?;
        Ok(f(renderer))
    }

    /// Composite a painted region and flush it
    pub fn present_bitmap(&self, rect: Rect, bitmap: &Bitmap) -> Result<(), RenderError> {
        self.with(|renderer| {
            renderer.draw_bitmap(rect, bitmap);
            renderer.render()
        })??;
        Ok(())
    }

    /// Restore the output device; a missing renderer has nothing to restore
    pub fn finish(&self) -> Result<(), RenderError> {
        match self.with(|renderer| renderer.finish()) {
            Err(RenderError::RendererUnavailable) => Ok(()),
            result => Ok(result??),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn Renderer>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
