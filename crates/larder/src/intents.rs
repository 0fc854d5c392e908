//! Write-intent semaphore: a counter of promised work plus a drain barrier.
//!
//! A write registers its intent when it is *submitted*, long before a worker
//! picks it up. Readers, compaction and teardown wait for the count to reach
//! zero before touching the file, so they never miss a write that has been
//! promised but has not yet taken the segment's exclusive lock.
//!
//! The same primitive counts pending teardowns for the whole cache and
//! in-flight jobs of the [`PoolScheduler`](crate::PoolScheduler).

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a pool thread sleeps between attempts to run queued jobs while
/// draining.
const HELP_INTERVAL: Duration = Duration::from_millis(1);

/// Counter of outstanding intents with a wake-on-zero signal.
#[derive(Debug, Default)]
pub struct WriteIntents {
    count: Mutex<usize>,
    idle: Condvar,
}

/// RAII token for one registered intent. Dropping it retires the intent.
#[derive(Debug)]
#[must_use = "dropping an Intent immediately retires it"]
pub struct Intent {
    owner: Arc<WriteIntents>,
}

impl WriteIntents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one outstanding intent.
    pub fn register(self: &Arc<Self>) -> Intent {
        *self.lock() += 1;
        Intent {
            owner: Arc::clone(self),
        }
    }

    /// Number of intents not yet retired.
    pub fn pending(&self) -> usize {
        *self.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Blocks until every registered intent has been retired.
    ///
    /// On a rayon worker thread the job holding the intent may be queued
    /// behind the caller, so the wait keeps running queued jobs instead of
    /// parking the thread.
    pub fn wait_idle(&self) {
        if rayon::current_thread_index().is_some() {
            while !self.is_idle() {
                if !matches!(rayon::yield_now(), Some(rayon::Yield::Executed)) {
                    self.wait_idle_timeout(HELP_INTERVAL);
                }
            }
            return;
        }

        let mut count = self.lock();
        while *count > 0 {
            count = self.idle.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait_idle`](Self::wait_idle) but gives up after `timeout`.
    ///
    /// Returns true if the count reached zero.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.lock();
        while *count > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            count = self
                .idle
                .wait_timeout(count, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn retire(&self) {
        let mut count = self.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    // The counter is updated with single statements, so a poisoned lock
    // still guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Intent {
    fn drop(&mut self) {
        self.owner.retire();
    }
}
