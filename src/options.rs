//! Per-load options.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use time::Duration;

/// Scope of a declared scale (`SCAL`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalePolicy {
    /// Scale resets at the start of every stream block.
    #[default]
    PerBlock,
    /// The last scale declared for a stream block carries into later
    /// packets until replaced. Blocks are keyed by their first value identifier.
    Persistent,
}

/// Options for `load_with`. `LoadOptions::default()` auto-detects the device.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Explicit device, overrides detection. Must match a known device.
    pub device: Option<String>,
    pub scale_policy: ScalePolicy,
    /// Duration assumed for packets that carry none.
    pub packet_duration: Duration,
    /// Show a progress bar while decoding.
    pub progress: bool,
    /// Checked between packets. Setting it aborts the load with
    /// `GpmfError::Cancelled`, which holds the partial store.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            device: None,
            scale_policy: ScalePolicy::default(),
            // GoPro logs a device block about once a second
            packet_duration: Duration::seconds(1),
            progress: false,
            cancel: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device = Some(device.to_owned());
        self
    }

    pub fn with_scale_policy(mut self, policy: ScalePolicy) -> Self {
        self.scale_policy = policy;
        self
    }

    pub fn with_packet_duration(mut self, duration: Duration) -> Self {
        self.packet_duration = duration;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
