//! Write requests and their completion tickets.
//!
//! A [`WriteRequest`] carries the target segment and a serialize closure that
//! builds the payload on the worker thread. Submitting it yields a
//! [`WriteTicket`], fulfilled exactly once with the record's descriptor or the
//! failure.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use larder_types::RecordDescriptor;

use crate::{CacheError, CacheResult, Segment};

/// Builds a payload into the provided buffer.
pub type Serializer = Box<dyn FnOnce(&mut Vec<u8>) + Send + 'static>;

/// An asynchronous write against one segment.
///
/// ```no_run
/// # use larder::{Cache, CacheOptions, WriteRequest};
/// # let cache = Cache::open(CacheOptions::new("/tmp/cache")).unwrap();
/// let fonts = cache.group("fonts").unwrap();
/// let segment = cache.register(&fonts);
///
/// let ticket = cache.submit_write(
///     WriteRequest::new(segment).serialize(|buf| buf.extend_from_slice(&42i32.to_le_bytes())),
/// );
/// let descriptor = ticket.wait().unwrap();
/// ```
pub struct WriteRequest {
    pub(crate) segment: Arc<Segment>,
    pub(crate) serializer: Option<Serializer>,
}

impl WriteRequest {
    pub fn new(segment: Arc<Segment>) -> Self {
        Self {
            segment,
            serializer: None,
        }
    }

    /// Sets the closure that produces the payload.
    pub fn serialize<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Vec<u8>) + Send + 'static,
    {
        self.serializer = Some(Box::new(f));
        self
    }

    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }
}

impl fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRequest")
            .field("segment", &self.segment.id())
            .field("group", &self.segment.group())
            .field("has_serializer", &self.serializer.is_some())
            .finish()
    }
}

/// Worker side of a ticket. Consumed by [`Completion::complete`], so a result
/// is delivered at most once.
#[derive(Debug)]
pub(crate) struct Completion {
    tx: SyncSender<CacheResult<RecordDescriptor>>,
}

impl Completion {
    pub(crate) fn complete(self, result: CacheResult<RecordDescriptor>) {
        // The ticket may have been dropped; nobody is left to tell.
        let _ = self.tx.send(result);
    }
}

/// Caller side of a submitted write.
///
/// If the worker goes away without completing (a panicking serializer, a
/// scheduler that drops jobs), waiting yields [`CacheError::WorkerLost`]
/// instead of blocking forever.
#[derive(Debug)]
#[must_use = "a dropped ticket discards the write's outcome"]
pub struct WriteTicket {
    segment: Arc<Segment>,
    rx: Receiver<CacheResult<RecordDescriptor>>,
}

impl WriteTicket {
    pub(crate) fn channel(segment: Arc<Segment>) -> (Completion, Self) {
        let (tx, rx) = mpsc::sync_channel(1);
        (Completion { tx }, Self { segment, rx })
    }

    /// The segment the write targets.
    pub fn segment(&self) -> &Arc<Segment> {
        &self.segment
    }

    /// Blocks until the write completes.
    pub fn wait(self) -> CacheResult<RecordDescriptor> {
        self.rx.recv().unwrap_or(Err(CacheError::WorkerLost))
    }

    /// Blocks for at most `timeout`; hands the ticket back if still pending.
    pub fn wait_timeout(self, timeout: Duration) -> Result<CacheResult<RecordDescriptor>, Self> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(CacheError::WorkerLost)),
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    /// Returns the outcome if the write already finished; otherwise hands the
    /// ticket back.
    pub fn try_result(self) -> Result<CacheResult<RecordDescriptor>, Self> {
        match self.rx.try_recv() {
            Ok(result) => Ok(result),
            Err(TryRecvError::Disconnected) => Ok(Err(CacheError::WorkerLost)),
            Err(TryRecvError::Empty) => Err(self),
        }
    }
}
