//! fOS Display - Compositor display bridge
//!
//! Receives a shared-memory framebuffer from the remote compositor,
//! serves damage-rectangle draw requests against it and turns every
//! completed draw into a local paint notification.
//!
//! - `SharedSurfaceUpdater`: framebuffer handshake and draw acknowledgement
//! - `DisplayClientBridge`: owns at most one updater, forwards paints
//! - `DisplayHost`: the thread all of the above live on

mod bridge;
mod error;
mod framebuffer;
mod hooks;
mod host;
mod message;
mod region;
mod task;
mod updater;

pub use bridge::DisplayClientBridge;
pub use error::{DisplayError, MappingError, ProtocolViolation};
pub use framebuffer::{PixelFormat, SharedFramebuffer};
pub use hooks::{
    default_hooks, LayerParams, LayerParamsTracker, NoopHooks, PlatformHooks, SwapSizeTracker,
};
pub use host::{DisplayHandle, DisplayHost};
pub use message::{AllocateCallback, ConnectionId, DisplayEvent, DisplayMessage};
pub use region::SharedMemoryRegion;
pub use task::{CancellationToken, TaskQueue};
pub use updater::{
    CompletionMode, DrawCallback, DrawRequest, PaintCallback, SharedSurfaceUpdater,
    UpdaterConfig, UpdaterState,
};
