use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Single-slot, last-value-wins handoff between a producer thread and the render loop.
/// The lock is held only for the copy in or out.
pub struct LatestCell<T> {
    slot: Mutex<Option<T>>,
    published: AtomicU64,
}

impl<T: Clone> LatestCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            published: AtomicU64::new(0),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
            published: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, value: T) {
        *self.lock() = Some(value);
        self.published.fetch_add(1, Ordering::Release);
    }

    pub fn latest(&self) -> Option<T> {
        self.lock().clone()
    }

    /// Number of values published so far.
    pub fn version(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // A panicking writer cannot leave a half-written `Option<T>` behind.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Joins `handle` if it finishes within `timeout`; otherwise detaches it.
pub fn join_with_timeout(handle: thread::JoinHandle<()>, timeout: Duration, label: &str) {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!(thread = label, "capture thread did not stop in time; detaching");
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    if handle.join().is_err() {
        tracing::warn!(thread = label, "capture thread panicked");
    }
}
