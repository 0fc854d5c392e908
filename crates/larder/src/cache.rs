//! The cache façade: segment lifecycle, writes, reads and compaction.
//!
//! # Write path
//!
//! ```text
//! submit_write ── register intent ──> scheduler ──> serialize
//!                                                       │
//!     ticket <── complete <── drop intent <── unlock <── append <── encode
//! ```
//!
//! The intent is registered before the job is queued, so a read issued right
//! after `submit_write` waits for the write even if no worker has picked it
//! up yet.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use larder_io::{IoBackend, SyncBackend};
use larder_types::{RecordDescriptor, SegmentId};

use crate::codec::{Codec, ZstdCodec};
use crate::intents::{Intent, WriteIntents};
use crate::request::{Completion, Serializer, WriteRequest, WriteTicket};
use crate::scheduler::{PoolScheduler, Scheduler};
use crate::{CacheError, CacheOptions, CacheResult, Segment, SegmentGroup, payload};

/// Outcome of a [`Cache::filter`] compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    pub records_kept: usize,
    /// File length before compaction.
    pub bytes_before: u64,
    /// File length after compaction: header plus retained records.
    pub bytes_after: u64,
}

impl CompactionReport {
    pub fn bytes_reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// A segmented blob cache rooted at one directory.
///
/// Writes and teardowns run on the injected [`Scheduler`]; reads and
/// compaction run on the calling thread.
pub struct Cache {
    options: CacheOptions,
    scheduler: Arc<dyn Scheduler>,
    io: Arc<dyn IoBackend>,
    codec: Arc<dyn Codec>,
    groups: Mutex<HashMap<String, Arc<SegmentGroup>>>,
    teardowns: Arc<WriteIntents>,
}

impl Cache {
    /// Creates a cache that runs background work on `scheduler`.
    pub fn new(options: CacheOptions, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            options,
            scheduler,
            io: Arc::new(SyncBackend::new()),
            codec: Arc::new(ZstdCodec),
            groups: Mutex::new(HashMap::new()),
            teardowns: WriteIntents::new(),
        }
    }

    /// Creates a cache with its own worker pool of `options.worker_threads`.
    pub fn open(options: CacheOptions) -> CacheResult<Self> {
        let scheduler = PoolScheduler::new(options.worker_threads)?;
        tracing::debug!(root = %options.root.display(), "cache opened");
        Ok(Self::new(options, Arc::new(scheduler)))
    }

    /// Replaces the file I/O backend.
    pub fn with_io_backend(mut self, io: Arc<dyn IoBackend>) -> Self {
        self.io = io;
        self
    }

    /// Replaces the compression codec.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Deregistered segments whose teardown has not finished.
    pub fn pending_teardowns(&self) -> usize {
        self.teardowns.pending()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Returns the group called `name`, creating it on first use.
    pub fn group(&self, name: &str) -> CacheResult<Arc<SegmentGroup>> {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(group) = groups.get(name) {
            return Ok(Arc::clone(group));
        }
        let group = Arc::new(SegmentGroup::new(name, &self.options.root)?);
        groups.insert(name.to_string(), Arc::clone(&group));
        Ok(group)
    }

    /// Adds a new, empty segment to `group`.
    ///
    /// No file is created until the segment is first written or read.
    pub fn register(&self, group: &SegmentGroup) -> Arc<Segment> {
        let id = loop {
            let id = SegmentId::random();
            if !group.contains(id) && !self.io.exists(&group.path_for(id)) {
                break id;
            }
        };
        let segment = Arc::new(Segment::new(id, group.name(), group.path_for(id)));
        group.insert(Arc::clone(&segment));
        tracing::debug!(segment = %id, group = %group.name(), "segment registered");
        segment
    }

    /// Adopts the existing segment file `id` in `group`, e.g. after a restart.
    ///
    /// The header is validated immediately. Descriptors the caller persisted
    /// for this segment remain valid.
    pub fn attach(&self, group: &SegmentGroup, id: SegmentId) -> CacheResult<Arc<Segment>> {
        if let Some(segment) = group.find(id) {
            return Ok(segment);
        }

        let path = group.path_for(id);
        if !self.io.exists(&path) {
            return Err(CacheError::SegmentNotFound {
                group: group.name().to_string(),
                segment: id,
            });
        }

        let segment = Arc::new(Segment::new(id, group.name(), path));
        {
            let mut file = segment.exclusive_drained()?;
            segment.materialize(&mut file, self.io.as_ref())?;
        }
        let segment = group.insert_or_get(segment);
        tracing::debug!(
            segment = %id,
            group = %group.name(),
            len = segment.len(),
            "segment attached"
        );
        Ok(segment)
    }

    /// Removes `segment` from `group` and schedules its teardown.
    ///
    /// The segment is unlisted immediately. Teardown waits for pending writes,
    /// closes the file and deletes it; [`await_teardowns`](Self::await_teardowns)
    /// blocks until that has happened.
    pub fn deregister(&self, segment: &Arc<Segment>, group: &SegmentGroup) -> CacheResult<()> {
        let Some(segment) = group.remove(segment.id()) else {
            return Err(CacheError::SegmentNotFound {
                group: group.name().to_string(),
                segment: segment.id(),
            });
        };

        let teardown = self.teardowns.register();
        let io = Arc::clone(&self.io);
        tracing::debug!(segment = %segment.id(), group = %group.name(), "segment deregistered");

        self.scheduler.submit(Box::new(move || {
            run_teardown(&segment, io.as_ref(), teardown);
        }));
        Ok(())
    }

    /// Blocks until every teardown scheduled so far has finished.
    pub fn await_teardowns(&self) {
        self.teardowns.wait_idle();
    }

    /// Blocks until the scheduler is idle and every teardown has finished.
    pub fn await_idle(&self) {
        self.scheduler.await_all();
        self.await_teardowns();
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Queues a write and returns its completion ticket.
    pub fn submit_write(&self, request: WriteRequest) -> WriteTicket {
        let WriteRequest {
            segment,
            serializer,
        } = request;

        let intent = segment.register_write();
        let (completion, ticket) = WriteTicket::channel(Arc::clone(&segment));
        let job = WriteJob {
            segment,
            serializer,
            intent,
            completion,
            io: Arc::clone(&self.io),
            codec: Arc::clone(&self.codec),
            options: self.options.clone(),
        };

        self.scheduler.submit(Box::new(move || job.run()));
        ticket
    }

    /// Writes `data` and waits for the descriptor.
    ///
    /// Must not be called from a scheduler worker that the write itself needs.
    pub fn write(
        &self,
        segment: &Arc<Segment>,
        data: impl Into<Vec<u8>>,
    ) -> CacheResult<RecordDescriptor> {
        let data = data.into();
        let request = WriteRequest::new(Arc::clone(segment))
            .serialize(move |buf| buf.extend_from_slice(&data));
        self.submit_write(request).wait()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Reads and validates the payload described by `descriptor`.
    ///
    /// Waits for writes already submitted against the segment. Runs
    /// concurrently with other reads, never with a write or compaction.
    pub fn read(&self, segment: &Segment, descriptor: &RecordDescriptor) -> CacheResult<Vec<u8>> {
        if descriptor.is_empty() {
            return Err(CacheError::InvalidSize);
        }
        let stored = segment.read_stored(self.io.as_ref(), descriptor)?;
        payload::decode(
            stored,
            descriptor,
            self.codec.as_ref(),
            self.options.checksum_seed,
        )
    }

    // ========================================================================
    // Compaction
    // ========================================================================

    /// Rewrites the segment to hold only the records in `keep`, in order.
    ///
    /// On success each descriptor in `keep` is updated in place with its new
    /// offset; every other descriptor of this segment becomes invalid. On
    /// failure the descriptors and the segment file are left untouched.
    pub fn filter(
        &self,
        segment: &Segment,
        keep: &mut [RecordDescriptor],
    ) -> CacheResult<CompactionReport> {
        let io = self.io.as_ref();
        let mut file = segment.exclusive_drained()?;
        let _busy = segment.register_write();

        segment.materialize(&mut file, io)?;
        let bytes_before = file.len();

        let records = keep
            .iter()
            .map(|descriptor| segment.read_locked(&file, io, descriptor))
            .collect::<CacheResult<Vec<_>>>()?;

        let offsets = segment.rewrite(&mut file, io, &records)?;
        for (descriptor, offset) in keep.iter_mut().zip(offsets) {
            descriptor.offset = offset;
        }

        let report = CompactionReport {
            records_kept: keep.len(),
            bytes_before,
            bytes_after: file.len(),
        };
        drop(file);

        tracing::debug!(
            segment = %segment.id(),
            group = %segment.group(),
            records_kept = report.records_kept,
            bytes_reclaimed = report.bytes_reclaimed(),
            "segment compacted"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("options", &self.options)
            .field("codec", &self.codec.name())
            .field("pending_teardowns", &self.pending_teardowns())
            .finish_non_exhaustive()
    }
}

fn run_teardown(segment: &Segment, io: &dyn IoBackend, teardown: Intent) {
    match segment.close_and_remove(io) {
        Ok(()) => {
            tracing::debug!(segment = %segment.id(), group = %segment.group(), "segment torn down");
        }
        Err(e) => {
            tracing::error!(
                segment = %segment.id(),
                group = %segment.group(),
                error = %e,
                "segment teardown failed"
            );
        }
    }
    drop(teardown);
}

/// One queued write, executed on a scheduler worker.
struct WriteJob {
    segment: Arc<Segment>,
    serializer: Option<Serializer>,
    intent: Intent,
    completion: Completion,
    io: Arc<dyn IoBackend>,
    codec: Arc<dyn Codec>,
    options: CacheOptions,
}

impl WriteJob {
    fn run(self) {
        let Self {
            segment,
            serializer,
            intent,
            completion,
            io,
            codec,
            options,
        } = self;

        let result = execute_write(
            &segment,
            serializer,
            io.as_ref(),
            codec.as_ref(),
            &options,
        );
        if let Err(e) = &result {
            tracing::error!(
                segment = %segment.id(),
                group = %segment.group(),
                error = %e,
                "background write failed"
            );
        }

        // The segment lock is already released; retire the intent, then report.
        drop(intent);
        completion.complete(result);
    }
}

fn execute_write(
    segment: &Segment,
    serializer: Option<Serializer>,
    io: &dyn IoBackend,
    codec: &dyn Codec,
    options: &CacheOptions,
) -> CacheResult<RecordDescriptor> {
    let serialize = serializer.ok_or(CacheError::MissingSerializer)?;
    let mut buf = Vec::new();
    serialize(&mut buf);

    let encoded = payload::encode(buf, options, codec)?;
    let offset = segment.append(io, &encoded.stored)?;
    Ok(encoded.descriptor(offset))
}
