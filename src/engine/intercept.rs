//! engine::intercept
//!
//! Single-slot pause/resume gate checked at every render checkpoint.
//!
//! `pause()` opens a gate, replacing any gate already open. `resume()`
//! releases the open gate, or does nothing. The pipeline waits for "no gate
//! open", not for a particular gate, so a second `pause()` never strands the
//! pipeline: one `resume()` releases it.
//!
//! # Example
//!
//! ```
//! use boltnav::engine::InterceptGate;
//!
//! let gate = InterceptGate::new();
//! gate.pause();
//! assert!(gate.is_paused());
//! assert!(gate.resume());
//! assert!(!gate.resume());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle to the engine's gate. Clones share the slot.
#[derive(Debug, Clone)]
pub struct InterceptGate {
    slot: Arc<watch::Sender<Option<u64>>>,
    generation: Arc<AtomicU64>,
}

impl Default for InterceptGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptGate {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a gate. Any gate already open is discarded.
    pub fn pause(&self) {
        let id = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        if self.slot.send_replace(Some(id)).is_some() {
            tracing::debug!("pause replaced an open gate");
        }
    }

    /// Release the open gate. Returns whether one was open.
    pub fn resume(&self) -> bool {
        self.slot.send_if_modified(|gate| gate.take().is_some())
    }

    pub fn is_paused(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Wait until no gate is open. Returns immediately when none is.
    pub async fn wait(&self) {
        let mut rx = self.slot.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(Option::is_none).await;
    }
}
