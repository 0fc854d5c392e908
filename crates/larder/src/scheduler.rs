//! Background execution of writes and teardowns.
//!
//! The cache owns no threads. It hands each unit of work to a [`Scheduler`]
//! and, when asked, waits on it to finish everything it was given.

use std::sync::Arc;

use crate::intents::WriteIntents;
use crate::{CacheError, CacheResult};

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Executes jobs out of line.
pub trait Scheduler: Send + Sync {
    /// Queues `job` for execution. Must not block on the job itself.
    fn submit(&self, job: Job);

    /// Blocks until every job submitted so far has finished.
    fn await_all(&self);
}

/// A `rayon` thread pool.
///
/// Panicking jobs are logged and do not take the pool down; the write they
/// belonged to reports [`CacheError::WorkerLost`].
pub struct PoolScheduler {
    pool: rayon::ThreadPool,
    in_flight: Arc<WriteIntents>,
}

impl PoolScheduler {
    /// Builds a pool with `threads` workers (at least one).
    pub fn new(threads: usize) -> CacheResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("larder-worker-{i}"))
            .panic_handler(|_| tracing::error!("background cache job panicked"))
            .build()
            .map_err(|e| CacheError::WorkerPool {
                reason: e.to_string(),
            })?;
        tracing::debug!(threads = pool.current_num_threads(), "worker pool started");
        Ok(Self {
            pool,
            in_flight: WriteIntents::new(),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Jobs submitted but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.pending()
    }
}

impl Scheduler for PoolScheduler {
    fn submit(&self, job: Job) {
        let intent = self.in_flight.register();
        self.pool.spawn(move || {
            let _intent = intent;
            job();
        });
    }

    fn await_all(&self) {
        self.in_flight.wait_idle();
    }
}

impl std::fmt::Debug for PoolScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolScheduler")
            .field("threads", &self.threads())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Runs every job on the submitting thread before `submit` returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn submit(&self, job: Job) {
        job();
    }

    fn await_all(&self) {}
}
