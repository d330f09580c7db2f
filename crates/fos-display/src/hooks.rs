//! Platform hooks - optional compositor signals
//!
//! Some platforms deliver extra metadata alongside frames: Linux reports
//! the size of each completed swap, macOS hands over layer parameters.
//! Each hook defaults to a no-op; a platform implements only its own.

use fos_gfx::Size;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Compositor layer parameters (macOS)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerParams {
    /// The layer carries no content
    pub is_empty: bool,
    /// Remote layer context identifier
    pub context_id: u32,
    /// Layer size in pixels
    pub pixel_size: Size,
    /// Device scale factor
    pub scale_factor: f32,
}

/// Capability set of platform-specific compositor signals.
pub trait PlatformHooks: Send {
    /// A buffer swap completed with a new size
    fn did_complete_swap(&self, _size: Size) {}

    /// Layer parameters were delivered
    fn received_layer_params(&self, _params: &LayerParams) {}
}

/// Hooks for platforms without extra signals
#[derive(Debug, Default)]
pub struct NoopHooks;

impl PlatformHooks for NoopHooks {}

/// Records the size of the most recent swap
#[derive(Debug, Clone, Default)]
pub struct SwapSizeTracker {
    last: Arc<Mutex<Option<Size>>>,
}

impl SwapSizeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_size(&self) -> Option<Size> {
        self.last.lock().ok().and_then(|last| *last)
    }
}

impl PlatformHooks for SwapSizeTracker {
    fn did_complete_swap(&self, size: Size) {
        debug!("Swap completed at {}", size);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(size);
        }
    }
}

/// Records the most recent layer parameters
#[derive(Debug, Clone, Default)]
pub struct LayerParamsTracker {
    last: Arc<Mutex<Option<LayerParams>>>,
}

impl LayerParamsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_params(&self) -> Option<LayerParams> {
        self.last.lock().ok().and_then(|last| *last)
    }
}

impl PlatformHooks for LayerParamsTracker {
    fn received_layer_params(&self, params: &LayerParams) {
        debug!("Layer params: {:?}", params);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(*params);
        }
    }
}

/// Hooks for the platform this binary targets
pub fn default_hooks() -> Box<dyn PlatformHooks> {
    if cfg!(target_os = "linux") {
        Box::new(SwapSizeTracker::new())
    } else if cfg!(target_os = "macos") {
        Box::new(LayerParamsTracker::new())
    } else {
        Box::new(NoopHooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_hooks_accept_everything() {
        let hooks = NoopHooks;
        hooks.did_complete_swap(Size::new(10, 10));
        hooks.received_layer_params(&LayerParams {
            is_empty: true,
            context_id: 0,
            pixel_size: Size::default(),
            scale_factor: 1.0,
        });
    }

    #[test]
    fn test_swap_tracker_records_latest() {
        let tracker = SwapSizeTracker::new();
        let hooks: Box<dyn PlatformHooks> = Box::new(tracker.clone());

        hooks.did_complete_swap(Size::new(640, 480));
        hooks.did_complete_swap(Size::new(800, 600));

        assert_eq!(tracker.last_size(), Some(Size::new(800, 600)));
    }

    #[test]
    fn test_swap_tracker_ignores_layer_params() {
        let tracker = SwapSizeTracker::new();
        tracker.received_layer_params(&LayerParams {
            is_empty: false,
            context_id: 7,
            pixel_size: Size::new(1, 1),
            scale_factor: 2.0,
        });

        assert_eq!(tracker.last_size(), None);
    }

    #[test]
    fn test_layer_tracker_records_params() {
        let tracker = LayerParamsTracker::new();
        let params = LayerParams {
            is_empty: false,
            context_id: 42,
            pixel_size: Size::new(1280, 720),
            scale_factor: 2.0,
        };

        tracker.received_layer_params(&params);
        assert_eq!(tracker.last_params(), Some(params));
    }
}
