//! Display Client Bridge - updater factory and paint fan-out
//!
//! The compositor assumes a single surface is composited at a time, so
//! the bridge keeps at most one updater alive. Creating a new one tears
//! the previous one down first, abandoning any draw it had in flight.

use crate::hooks::{LayerParams, PlatformHooks};
use crate::message::ConnectionId;
use crate::task::TaskQueue;
use crate::updater::{PaintCallback, SharedSurfaceUpdater, UpdaterConfig};
use fos_gfx::Size;
use tracing::info;

pub struct DisplayClientBridge {
    /// The single active updater
    updater: Option<SharedSurfaceUpdater>,
    /// Paint notification handed to every updater
    paint: PaintCallback,
    /// Platform-specific signals
    hooks: Box<dyn PlatformHooks>,
    /// Task queue of the bridge's thread
    tasks: TaskQueue,
    config: UpdaterConfig,
}

impl DisplayClientBridge {
    /// Create a bridge bound to the current thread
    pub fn new(paint: PaintCallback, hooks: Box<dyn PlatformHooks>, config: UpdaterConfig) -> Self {
        Self {
            updater: None,
            paint,
            hooks,
            tasks: TaskQueue::new(),
            config,
        }
    }

    /// Create the updater for `connection`, destroying the previous one.
    pub fn create_updater(&mut self, connection: ConnectionId) -> &mut SharedSurfaceUpdater {
        if let Some(previous) = self.updater.take() {
            info!("Replacing updater of {} with {}", previous.connection(), connection);
        }

        let updater = SharedSurfaceUpdater::new(
            connection,
            self.config,
            self.tasks.clone(),
            self.paint.clone(),
        );
        self.updater.insert(updater)
    }

    pub fn updater(&self) -> Option<&SharedSurfaceUpdater> {
        self.updater.as_ref()
    }

    /// The active updater, if it serves `connection`
    pub fn updater_for(&mut self, connection: ConnectionId) -> Option<&mut SharedSurfaceUpdater> {
        self.updater
            .as_mut()
            .filter(|updater| updater.connection() == connection)
    }

    /// Tear down the active updater, returning the connection it served
    pub fn destroy_updater(&mut self) -> Option<ConnectionId> {
        let updater = self.updater.take()?;
        let connection = updater.connection();
        info!("Destroying updater of {}", connection);
        Some(connection)
    }

    /// Queue that deferred draw completions run on
    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn did_complete_swap(&self, size: Size) {
        self.hooks.did_complete_swap(size);
    }

    pub fn received_layer_params(&self, params: &LayerParams) {
        self.hooks.received_layer_params(params);
    }
}

impl Drop for DisplayClientBridge {
    fn drop(&mut self) {
        // Revoke the updater before the queue holding its completions goes
        self.updater.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{NoopHooks, SwapSizeTracker};
    use crate::region::SharedMemoryRegion;
    use crate::updater::UpdaterState;
    use fos_gfx::{Bitmap, Rect};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn bridge_with_log() -> (DisplayClientBridge, Arc<Mutex<Vec<Rect>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let paint_log = log.clone();
        let paint: PaintCallback = Arc::new(move |rect: Rect, _: &Bitmap| {
            paint_log.lock().unwrap().push(rect);
        });
        let bridge = DisplayClientBridge::new(paint, Box::new(NoopHooks), UpdaterConfig::default());
        (bridge, log)
    }

    fn region(size: Size) -> SharedMemoryRegion {
        let file = tempfile::tempfile().unwrap();
        let len = (size.width * size.height * 4) as usize;
        file.set_len(len as u64).unwrap();
        SharedMemoryRegion::new(file, len)
    }

    #[test]
    fn test_create_updater() {
        let (mut bridge, _) = bridge_with_log();
        let connection = ConnectionId::new(10);

        let updater = bridge.create_updater(connection);
        assert_eq!(updater.connection(), connection);
        assert_eq!(updater.state(), UpdaterState::Unallocated);
        assert!(bridge.updater_for(connection).is_some());
        assert!(bridge.updater_for(ConnectionId::new(11)).is_none());
    }

    #[test]
    fn test_replacement_abandons_in_flight_draw() {
        let (mut bridge, log) = bridge_with_log();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = bridge.create_updater(ConnectionId::new(1));
        first.allocate_framebuffer(Size::new(4, 4), region(Size::new(4, 4))).unwrap();
        let counter = calls.clone();
        first
            .draw(
                Rect::new(0, 0, 4, 4),
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        bridge.create_updater(ConnectionId::new(2));
        bridge.tasks().run_pending();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(bridge.updater().map(|u| u.connection()), Some(ConnectionId::new(2)));
    }

    #[test]
    fn test_paint_notification_per_draw() {
        let (mut bridge, log) = bridge_with_log();
        let connection = ConnectionId::new(3);

        let updater = bridge.create_updater(connection);
        updater.allocate_framebuffer(Size::new(100, 100), region(Size::new(100, 100))).unwrap();

        for damage in [Rect::new(0, 0, 10, 10), Rect::new(20, 20, 5, 5)] {
            bridge
                .updater_for(connection)
                .unwrap()
                .draw(damage, Box::new(|_| {}))
                .unwrap();
            bridge.tasks().run_pending();
        }

        assert_eq!(
            *log.lock().unwrap(),
            vec![Rect::new(0, 0, 10, 10), Rect::new(20, 20, 5, 5)]
        );
    }

    #[test]
    fn test_destroy_updater() {
        let (mut bridge, _) = bridge_with_log();
        bridge.create_updater(ConnectionId::new(5));

        assert_eq!(bridge.destroy_updater(), Some(ConnectionId::new(5)));
        assert_eq!(bridge.destroy_updater(), None);
    }

    #[test]
    fn test_platform_hooks_pass_through() {
        let tracker = SwapSizeTracker::new();
        let paint: PaintCallback = Arc::new(|_: Rect, _: &Bitmap| {});
        let bridge =
            DisplayClientBridge::new(paint, Box::new(tracker.clone()), UpdaterConfig::default());

        bridge.did_complete_swap(Size::new(320, 200));
        assert_eq!(tracker.last_size(), Some(Size::new(320, 200)));
    }
}
