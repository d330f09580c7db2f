//! Display host thread.
//!
//! The bridge, its updater and its task queue all live on one dedicated
//! thread. The transport talks to it through a `DisplayHandle`; errors
//! tear the offending connection down and are reported as events rather
//! than taking the process with them.

use crate::bridge::DisplayClientBridge;
use crate::error::DisplayError;
use crate::hooks::{LayerParams, PlatformHooks};
use crate::message::{ConnectionId, DisplayEvent, DisplayMessage};
use crate::region::SharedMemoryRegion;
use crate::updater::{PaintCallback, UpdaterConfig};
use crossbeam_channel::{unbounded, Receiver, Sender};
use fos_gfx::{Bitmap, Rect, Size};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Sending side of the display host, cloneable across threads
#[derive(Clone, Debug)]
pub struct DisplayHandle {
    sender: Sender<DisplayMessage>,
}

impl DisplayHandle {
    fn send(&self, msg: DisplayMessage) -> Result<(), DisplayError> {
        self.sender.send(msg).map_err(|_| DisplayError::HostGone)
    }

    /// Open a new connection, replacing the current surface
    pub fn create_updater(&self) -> Result<ConnectionId, DisplayError> {
        let connection = ConnectionId::next();
        self.send(DisplayMessage::CreateUpdater { connection })?;
        Ok(connection)
    }

    /// Hand a shared region to the connection; `reply` reports whether it mapped
    pub fn allocate_framebuffer(
        &self,
        connection: ConnectionId,
        pixel_size: Size,
        region: SharedMemoryRegion,
        reply: impl FnOnce(Result<(), DisplayError>) + Send + 'static,
    ) -> Result<(), DisplayError> {
        self.send(DisplayMessage::AllocateFramebuffer {
            connection,
            pixel_size,
            region,
            reply: Box::new(reply),
        })
    }

    /// Request a draw; `reply` runs on the host thread once it completes
    pub fn draw(
        &self,
        connection: ConnectionId,
        damage: Rect,
        reply: impl FnOnce(Bitmap) + Send + 'static,
    ) -> Result<(), DisplayError> {
        self.send(DisplayMessage::Draw {
            connection,
            damage,
            reply: Box::new(reply),
        })
    }

    pub fn did_complete_swap(&self, size: Size) -> Result<(), DisplayError> {
        self.send(DisplayMessage::DidCompleteSwap { size })
    }

    pub fn layer_params(&self, params: LayerParams) -> Result<(), DisplayError> {
        self.send(DisplayMessage::LayerParams { params })
    }
}

/// Owner of the display host thread
pub struct DisplayHost {
    handle: DisplayHandle,
    events: Receiver<DisplayEvent>,
    thread: Option<JoinHandle<()>>,
}

impl DisplayHost {
    /// Spawn the host thread
    pub fn spawn(
        config: UpdaterConfig,
        paint: PaintCallback,
        hooks: Box<dyn PlatformHooks>,
    ) -> Self {
        let (sender, rx) = unbounded();
        let (events_tx, events) = unbounded();

        let thread = thread::Builder::new()
            .name("display-host".to_string())
            .spawn(move || {
                info!("Display host started");
                run_host_loop(rx, events_tx, config, paint, hooks);
                info!("Display host stopped");
            })
            .expect("Failed to spawn display host thread");

        Self {
            handle: DisplayHandle { sender },
            events,
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> DisplayHandle {
        self.handle.clone()
    }

    /// Events reported by the host thread
    pub fn events(&self) -> &Receiver<DisplayEvent> {
        &self.events
    }

    /// Stop the host thread and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.send(DisplayMessage::Shutdown);
            if thread.join().is_err() {
                error!("Display host thread panicked");
            }
        }
    }
}

impl Drop for DisplayHost {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_host_loop(
    rx: Receiver<DisplayMessage>,
    events_tx: Sender<DisplayEvent>,
    config: UpdaterConfig,
    paint: PaintCallback,
    hooks: Box<dyn PlatformHooks>,
) {
    let mut bridge = DisplayClientBridge::new(paint, hooks, config);

    loop {
        let msg = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => {
                debug!("Display channel closed, shutting down");
                break;
            }
        };

        if matches!(msg, DisplayMessage::Shutdown) {
            debug!("Display host received shutdown");
            break;
        }

        debug!("Display host handling {:?}", msg);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let outcome = dispatch(&mut bridge, msg);
            bridge.tasks().run_pending();
            outcome
        }));

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err((connection, reason))) => {
                warn!("Closing {}: {}", connection, reason);
                Some((connection, reason))
            }
            Err(panic_info) => {
                let reason = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                error!("Display host panicked: {}", reason);
                bridge
                    .updater()
                    .map(|updater| (updater.connection(), reason))
            }
        };

        if let Some((connection, reason)) = failure {
            if bridge.updater().map(|updater| updater.connection()) == Some(connection) {
                bridge.destroy_updater();
            }
            let _ = events_tx.send(DisplayEvent::ConnectionClosed { connection, reason });
        }
    }
}

/// Apply one message to the bridge.
///
/// A failure names the connection to tear down and why.
fn dispatch(
    bridge: &mut DisplayClientBridge,
    msg: DisplayMessage,
) -> Result<(), (ConnectionId, String)> {
    match msg {
        DisplayMessage::CreateUpdater { connection } => {
            bridge.create_updater(connection);
            Ok(())
        }

        DisplayMessage::AllocateFramebuffer {
            connection,
            pixel_size,
            region,
            reply,
        } => match bridge.updater_for(connection) {
            Some(updater) => match updater.allocate_framebuffer(pixel_size, region) {
                Ok(()) => {
                    reply(Ok(()));
                    Ok(())
                }
                Err(err) => {
                    let reason = err.to_string();
                    reply(Err(err));
                    Err((connection, reason))
                }
            },
            None => {
                debug!("Rejecting allocation for stale {}", connection);
                reply(Err(DisplayError::ConnectionClosed(connection)));
                Ok(())
            }
        },

        DisplayMessage::Draw {
            connection,
            damage,
            reply,
        } => match bridge.updater_for(connection) {
            Some(updater) => updater
                .draw(damage, reply)
                .map_err(|err| (connection, err.to_string())),
            None => {
                debug!("Dropping draw for stale {}", connection);
                Ok(())
            }
        },

        DisplayMessage::DidCompleteSwap { size } => {
            bridge.did_complete_swap(size);
            Ok(())
        }

        DisplayMessage::LayerParams { params } => {
            bridge.received_layer_params(&params);
            Ok(())
        }

        DisplayMessage::Shutdown => Ok(()),
    }
}
