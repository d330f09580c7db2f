//! Shared Surface Updater - framebuffer handshake and draw protocol
//!
//! One updater serves one logical surface:
//!
//! ```text
//! Unallocated --allocate--> Allocated --draw--> Drawing
//!                              ^  |                |
//!                              |  +--allocate--+   |
//!                              +----complete-------+
//! ```
//!
//! Completion produces two independent signals: the paint notification
//! to the local presentation layer and the acknowledgement to the peer.
//! Neither fires for a draw abandoned by teardown.

use crate::error::{DisplayError, ProtocolViolation};
use crate::framebuffer::{PixelFormat, SharedFramebuffer};
use crate::message::ConnectionId;
use crate::region::SharedMemoryRegion;
use crate::task::{CancellationToken, TaskQueue};
use fos_gfx::{Bitmap, Rect, Size};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Acknowledges a draw to the remote compositor
pub type DrawCallback = Box<dyn FnOnce(Bitmap) + Send>;

/// Local paint notification: damaged rectangle and its pixels
pub type PaintCallback = Arc<dyn Fn(Rect, &Bitmap) + Send + Sync>;

/// When a draw's image is produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Inside the `draw` call
    Immediate,
    /// On the next drain of the updater's task queue
    #[default]
    Deferred,
}

/// Updater configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Pixel layout of shared regions
    #[serde(default)]
    pub pixel_format: PixelFormat,
    /// Draw completion timing
    #[serde(default)]
    pub completion: CompletionMode,
}

/// Protocol state of an updater
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    Unallocated,
    Allocated,
    Drawing,
}

/// An outstanding draw: the damaged rectangle and its acknowledgement
pub struct DrawRequest {
    damage: Rect,
    on_complete: DrawCallback,
}

impl DrawRequest {
    pub fn new(damage: Rect, on_complete: DrawCallback) -> Self {
        Self {
            damage,
            on_complete,
        }
    }
}

impl fmt::Debug for DrawRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawRequest")
            .field("damage", &self.damage)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct SurfaceState {
    framebuffer: Option<SharedFramebuffer>,
    pending: Option<DrawRequest>,
}

/// Owns one shared framebuffer and serves draws against it.
///
/// Lives on the thread of the task queue it was built with.
pub struct SharedSurfaceUpdater {
    connection: ConnectionId,
    config: UpdaterConfig,
    state: Rc<RefCell<SurfaceState>>,
    tasks: TaskQueue,
    paint: PaintCallback,
    token: CancellationToken,
}

impl SharedSurfaceUpdater {
    /// Create an updater bound to `connection` and to the queue's thread
    pub fn new(
        connection: ConnectionId,
        config: UpdaterConfig,
        tasks: TaskQueue,
        paint: PaintCallback,
    ) -> Self {
        debug_assert!(tasks.is_current(), "updater built off its task thread");
        debug!("Created surface updater for {}", connection);

        Self {
            connection,
            config,
            state: Rc::new(RefCell::new(SurfaceState::default())),
            tasks,
            paint,
            token: CancellationToken::new(),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn state(&self) -> UpdaterState {
        let state = self.state.borrow();
        match (&state.framebuffer, &state.pending) {
            (None, _) => UpdaterState::Unallocated,
            (Some(_), None) => UpdaterState::Allocated,
            (Some(_), Some(_)) => UpdaterState::Drawing,
        }
    }

    /// Pixel size of the active framebuffer
    pub fn framebuffer_size(&self) -> Option<Size> {
        self.state.borrow().framebuffer.as_ref().map(SharedFramebuffer::size)
    }

    /// Map a newly allocated region, releasing the previous one.
    ///
    /// On a mapping failure the previous mapping is gone too and the
    /// updater is back to `Unallocated`.
    pub fn allocate_framebuffer(
        &mut self,
        pixel_size: Size,
        region: SharedMemoryRegion,
    ) -> Result<(), DisplayError> {
        let mut state = self.state.borrow_mut();

        if state.pending.is_some() {
            warn!("{} reallocated its framebuffer mid-draw", self.connection);
            return Err(ProtocolViolation::AllocateDuringDraw.into());
        }

        if let Some(previous) = state.framebuffer.take() {
            debug!("Releasing {} framebuffer of {}", previous.size(), self.connection);
        }

        let framebuffer = SharedFramebuffer::map(&region, pixel_size, self.config.pixel_format)?;
        info!("{} allocated a {} framebuffer", self.connection, pixel_size);
        state.framebuffer = Some(framebuffer);

        Ok(())
    }

    /// Start drawing `damage`; `on_complete` receives the image exactly once.
    ///
    /// A rejected request's callback is dropped without being invoked.
    pub fn draw(&mut self, damage: Rect, on_complete: DrawCallback) -> Result<(), DisplayError> {
        {
            let mut state = self.state.borrow_mut();

            if state.framebuffer.is_none() {
                warn!("{} drew before allocating", self.connection);
                return Err(ProtocolViolation::DrawBeforeAllocate.into());
            }
            if state.pending.is_some() {
                warn!("{} issued an overlapping draw", self.connection);
                return Err(ProtocolViolation::OverlappingDraw.into());
            }

            debug!("{} draw {}", self.connection, damage);
            state.pending = Some(DrawRequest::new(damage, on_complete));
        }

        match self.config.completion {
            CompletionMode::Immediate => complete_draw(&self.state, &self.paint),
            CompletionMode::Deferred => {
                let state = Rc::downgrade(&self.state);
                let token = self.token.clone();
                let paint = self.paint.clone();

                self.tasks.post(move || {
                    if token.is_revoked() {
                        return;
                    }
                    if let Some(state) = state.upgrade() {
                        complete_draw(&state, &paint);
                    }
                });
            }
        }

        Ok(())
    }
}

/// Produce the pending draw's image, paint it, then acknowledge it.
fn complete_draw(state: &RefCell<SurfaceState>, paint: &PaintCallback) {
    let (request, rect, bitmap) = {
        let mut state = state.borrow_mut();
        let SurfaceState {
            framebuffer,
            pending,
        } = &mut *state;

        let (Some(framebuffer), Some(request)) = (framebuffer.as_ref(), pending.take()) else {
            return;
        };

        let (rect, bitmap) = framebuffer.copy_rect(request.damage);
        (request, rect, bitmap)
    };

    paint(rect, &bitmap);
    (request.on_complete)(bitmap);
}

impl Drop for SharedSurfaceUpdater {
    fn drop(&mut self) {
        self.token.revoke();

        if let Ok(mut state) = self.state.try_borrow_mut() {
            if let Some(request) = state.pending.take() {
                debug!("{} abandoned draw {}", self.connection, request.damage);
            }
        }
        debug!("Destroyed surface updater for {}", self.connection);
    }
}
