use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-owned flag that stops a batch from issuing further fetches.
///
/// Clones share the flag, so one handle can be given to the batch and
/// another kept by whoever decides to stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Entries already in flight still complete.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
