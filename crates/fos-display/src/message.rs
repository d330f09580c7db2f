//! Message types between the transport and the display host thread.

use crate::hooks::LayerParams;
use crate::region::SharedMemoryRegion;
use crate::error::DisplayError;
use crate::updater::DrawCallback;
use fos_gfx::{Rect, Size};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global connection ID counter
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one inbound compositor connection (one logical surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocate a fresh, process-unique ID.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection({})", self.0)
    }
}

/// Reports the outcome of a framebuffer allocation
pub type AllocateCallback = Box<dyn FnOnce(Result<(), DisplayError>) + Send>;

/// Messages delivered to the display host thread.
pub enum DisplayMessage {
    /// Create an updater for a new connection, replacing any previous one
    CreateUpdater { connection: ConnectionId },
    /// Shared memory has been allocated for the connection's surface
    AllocateFramebuffer {
        connection: ConnectionId,
        pixel_size: Size,
        region: SharedMemoryRegion,
        reply: AllocateCallback,
    },
    /// Draw the damaged region; `reply` acknowledges with the image
    Draw {
        connection: ConnectionId,
        damage: Rect,
        reply: DrawCallback,
    },
    /// The platform finished a buffer swap at a new size
    DidCompleteSwap { size: Size },
    /// The platform delivered compositor layer parameters
    LayerParams { params: LayerParams },
    /// Stop the host thread, abandoning any outstanding draw
    Shutdown,
}

impl fmt::Debug for DisplayMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateUpdater { connection } => write!(f, "CreateUpdater({connection})"),
            Self::AllocateFramebuffer {
                connection,
                pixel_size,
                ..
            } => write!(f, "AllocateFramebuffer({connection}, {pixel_size})"),
            Self::Draw {
                connection, damage, ..
            } => write!(f, "Draw({connection}, {damage})"),
            Self::DidCompleteSwap { size } => write!(f, "DidCompleteSwap({size})"),
            Self::LayerParams { params } => write!(f, "LayerParams({params:?})"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Events reported back by the display host thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// The connection's updater was torn down after an error
    ConnectionClosed {
        connection: ConnectionId,
        reason: String,
    },
}
