//! Rendering errors

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer is not initialized")]
    RendererUnavailable,

    #[error("Malformed text command #{index}: {reason}")]
    MalformedCommand { index: usize, reason: String },

    #[error("Terminal output error: {0}")]
    Io(#[from] io::Error),
}
