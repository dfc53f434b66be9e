//! SIGINT/SIGTERM capture for the duration of a history rewrite.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::SigId;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::warn;

/// Sets a flag instead of terminating the process while alive.
///
/// The handlers are unregistered on drop, restoring the previous behaviour.
#[derive(Debug)]
pub struct InterruptGuard {
    flag: Arc<AtomicBool>,
    ids: Vec<SigId>,
}

impl InterruptGuard {
    /// Install handlers for SIGINT and SIGTERM.
    ///
    /// Registration failures are logged; the guard then only reports
    /// interrupts raised through [`trigger`](Self::trigger).
    #[must_use]
    pub fn install() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let ids = [SIGINT, SIGTERM]
            .into_iter()
            .filter_map(|signal| {
                signal_hook::flag::register(signal, Arc::clone(&flag))
                    .map_err(|e| warn!(signal, "cannot register signal handler: {e}"))
                    .ok()
            })
            .collect();
        Self { flag, ids }
    }

    /// Whether an interrupt arrived since installation.
    #[must_use]
    pub fn triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Mark the guard as interrupted.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Shared handle to the flag, for callers that interrupt from elsewhere.
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}
