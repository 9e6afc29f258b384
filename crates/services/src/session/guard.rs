//! Epoch-based flow re-entrancy guard.
//!
//! Each session flow captures the epoch at start; any resumption after an
//! await re-checks it and discards stale work. Starting a new flow (or
//! cancelling) bumps the epoch, which invalidates every outstanding guard
//! at once — there is no flag to forget to reset.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared epoch counter. One per `SessionFlowService`.
#[derive(Debug, Clone, Default)]
pub struct FlowEpochs {
    counter: Arc<AtomicU64>,
}

impl FlowEpochs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidates all outstanding guards and issues one for a new flow.
    #[must_use]
    pub fn begin(&self) -> FlowGuard {
        let epoch = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        FlowGuard {
            counter: Arc::clone(&self.counter),
            epoch,
        }
    }

    /// Invalidates all outstanding guards without starting a new flow.
    pub fn invalidate(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Witness of the epoch a flow started in.
#[derive(Debug, Clone)]
pub struct FlowGuard {
    counter: Arc<AtomicU64>,
    epoch: u64,
}

impl FlowGuard {
    /// True while no newer flow has started and nothing was cancelled.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.epoch
    }
}
