//! Render Command Service - batched text drawing endpoint
//!
//! Translates wire text records into `Text` values and hands the whole
//! batch to the renderer in a single call. A malformed record fails the
//! batch before anything reaches the renderer.

use crate::error::RenderError;
use crate::renderer::RendererHandle;
use crate::text::{Text, TextDrawCommand};
use fos_gfx::Point;
use tracing::debug;

pub struct RenderCommandService {
    renderer: RendererHandle,
}

impl RenderCommandService {
    pub fn new(renderer: RendererHandle) -> Self {
        Self { renderer }
    }

    /// Draw a batch of text commands, preserving their order
    pub fn draw_text(&self, commands: Vec<TextDrawCommand>) -> Result<(), RenderError> {
        let texts = commands
            .into_iter()
            .enumerate()
            .map(|(index, command)| {
                Text::try_from(command)
                    .map_err(|reason| RenderError::MalformedCommand { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Drawing batch of {} texts", texts.len());

        self.renderer.with(|renderer| {
            renderer.draw_text(texts);
            renderer.render()
        })??;

        Ok(())
    }

    /// Move the text cursor to a surface position, or hide it
    pub fn set_cursor(&self, cursor: Option<Point>) -> Result<(), RenderError> {
        self.renderer.with(|renderer| {
            renderer.set_cursor(cursor);
            renderer.render()
        })??;

        Ok(())
    }
}
