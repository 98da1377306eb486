use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Ordered buffer of event timestamps shared between the capture context
/// (the hall-sensor interrupt) and the main scheduling loop.
///
/// Every access runs under the same mutex and holds it only for the single
/// container operation, which is the critical-section discipline the capture
/// path requires: an append can never observe a half-finished drain and a
/// drain can never tear an in-flight append. Events are removed only in
/// full, and only after the uploader has confirmed delivery of a snapshot.
#[derive(Clone)]
pub struct EventBuffer {
    epochs: Arc<Mutex<Vec<i64>>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self {
            epochs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<i64>> {
        // A poisoned lock only means a panic elsewhere; the epochs themselves
        // are always in a consistent state between operations.
        self.epochs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one detected event. Called from the capture context; bounded,
    /// short, and atomic with respect to `snapshot`/`clear`.
    pub fn capture(&self, epoch: i64) {
        self.lock().push(epoch);
    }

    /// Returns the buffered epochs in capture order without removing them.
    pub fn snapshot(&self) -> Vec<i64> {
        self.lock().clone()
    }

    /// Empties the buffer. Only valid once the most recent snapshot has been
    /// confirmed delivered; removal is all-or-nothing.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}
