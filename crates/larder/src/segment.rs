//! A segment: one append-only backing file and its synchronization state.
//!
//! # Locking
//!
//! Each segment guards its file state with a reader/writer lock and counts
//! promised writes in a [`WriteIntents`] drain barrier:
//!
//! - appends take the exclusive lock without draining (they *are* the
//!   pending writes),
//! - reads take the shared lock once no write is pending,
//! - compaction and teardown take the exclusive lock once no write is pending.
//!
//! Waiting for the drain never happens while a lock is held. A waiter drops
//! its guard, waits for the count to reach zero, then retries, so a queued
//! writer can always make progress.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use larder_io::{FileHandle, IoBackend, IoError, OpenMode};
use larder_types::{RecordDescriptor, SegmentId};

use crate::header::{HEADER_SIZE, Header};
use crate::intents::{Intent, WriteIntents};
use crate::{CacheError, CacheResult};

/// File state guarded by the segment lock.
#[derive(Debug, Default)]
pub(crate) struct SegmentFile {
    handle: Option<FileHandle>,
    /// End of file; the next append lands here.
    cursor: u64,
    retired: bool,
}

impl SegmentFile {
    pub(crate) fn len(&self) -> u64 {
        self.cursor
    }
}

/// One physical segment file.
///
/// Shared as `Arc<Segment>`: a request holding a segment keeps it alive after
/// `deregister`, and operations on it fail with
/// [`CacheError::SegmentRetired`] once teardown has run.
#[derive(Debug)]
pub struct Segment {
    id: SegmentId,
    group: String,
    path: PathBuf,
    file: RwLock<SegmentFile>,
    pending: Arc<WriteIntents>,
}

impl Segment {
    pub(crate) fn new(id: SegmentId, group: &str, path: PathBuf) -> Self {
        Self {
            id,
            group: group.to_string(),
            path,
            file: RwLock::new(SegmentFile::default()),
            pending: WriteIntents::new(),
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Name of the group the segment was registered in.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes submitted against this segment that have not finished.
    pub fn pending_writes(&self) -> usize {
        self.pending.pending()
    }

    /// Current end of the backing file; 0 if it was never created.
    pub fn len(&self) -> u64 {
        self.read_lock().cursor
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= HEADER_SIZE
    }

    pub fn is_retired(&self) -> bool {
        self.read_lock().retired
    }

    /// Registers a write intent; the returned token must live until the
    /// write has released the exclusive lock.
    pub(crate) fn register_write(&self) -> Intent {
        self.pending.register()
    }

    // ------------------------------------------------------------------
    // Lock acquisition
    // ------------------------------------------------------------------

    /// Shared access once pending writes have drained, with the file open.
    pub(crate) fn shared(
        &self,
        io: &dyn IoBackend,
    ) -> CacheResult<RwLockReadGuard<'_, SegmentFile>> {
        loop {
            let guard = self.read_lock();
            self.check_live(&guard)?;
            if !self.pending.is_idle() {
                drop(guard);
                self.pending.wait_idle();
                continue;
            }
            if guard.handle.is_some() {
                return Ok(guard);
            }
            drop(guard);

            let mut guard = self.write_lock();
            self.check_live(&guard)?;
            self.materialize(&mut guard, io)?;
        }
    }

    /// Exclusive access for an append. Does not drain: the caller holds one of
    /// the pending intents.
    fn exclusive(&self) -> CacheResult<RwLockWriteGuard<'_, SegmentFile>> {
        let guard = self.write_lock();
        self.check_live(&guard)?;
        Ok(guard)
    }

    /// Exclusive access once pending writes have drained.
    pub(crate) fn exclusive_drained(
        &self,
    ) -> CacheResult<RwLockWriteGuard<'_, SegmentFile>> {
        loop {
            let guard = self.write_lock();
            self.check_live(&guard)?;
            if self.pending.is_idle() {
                return Ok(guard);
            }
            drop(guard);
            self.pending.wait_idle();
        }
    }

    fn check_live(&self, file: &SegmentFile) -> CacheResult<()> {
        if file.retired {
            return Err(CacheError::SegmentRetired { segment: self.id });
        }
        Ok(())
    }

    // A panic while the lock is held can only come from the backend, before
    // the cursor moves; the guarded state stays consistent.
    fn read_lock(&self) -> RwLockReadGuard<'_, SegmentFile> {
        self.file.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, SegmentFile> {
        self.file.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // File operations (lock held by the caller)
    // ------------------------------------------------------------------

    /// Opens the backing file if it is not open yet.
    ///
    /// A new or empty file gets the header; an existing file must carry a
    /// valid one.
    pub(crate) fn materialize(
        &self,
        file: &mut SegmentFile,
        io: &dyn IoBackend,
    ) -> CacheResult<()> {
        if file.handle.is_some() {
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            io.create_dir_all(dir).map_err(|source| CacheError::Open {
                path: self.path.clone(),
                source,
            })?;
        }
        let handle = io
            .open(&self.path, OpenMode::Create)
            .map_err(|source| CacheError::Open {
                path: self.path.clone(),
                source,
            })?;

        let size = io.file_size(&handle).map_err(|source| self.read_error(source))?;
        let cursor = if size == 0 {
            self.write_header(io, &handle)?;
            tracing::debug!(segment = %self.id, group = %self.group, "segment file created");
            HEADER_SIZE
        } else {
            self.check_header(io, &handle, size)?;
            size
        };

        file.handle = Some(handle);
        file.cursor = cursor;
        Ok(())
    }

    fn write_header(&self, io: &dyn IoBackend, handle: &FileHandle) -> CacheResult<()> {
        io.write_all_at(handle, 0, &Header::CURRENT.encode())
            .map_err(|source| self.write_error(source))
    }

    fn check_header(
        &self,
        io: &dyn IoBackend,
        handle: &FileHandle,
        size: u64,
    ) -> CacheResult<()> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        let len = size.min(HEADER_SIZE) as usize;
        io.read_exact_at(handle, 0, &mut buf[..len])
            .map_err(|source| self.read_error(source))?;
        Header::decode(&buf[..len]).map(drop).inspect_err(|e| {
            tracing::warn!(
                segment = %self.id,
                path = %self.path.display(),
                error = %e,
                "segment file has an invalid header"
            );
        })
    }

    /// Appends `bytes` at the end of the file and returns their offset.
    pub(crate) fn append(&self, io: &dyn IoBackend, bytes: &[u8]) -> CacheResult<u64> {
        let mut file = self.exclusive()?;
        self.materialize(&mut file, io)?;

        let offset = file.cursor;
        let handle = self.handle(&file)?;
        io.write_all_at(handle, offset, bytes)
            .map_err(|source| self.write_error(source))?;
        file.cursor = offset + bytes.len() as u64;
        Ok(offset)
    }

    /// Reads the stored bytes of one record.
    pub(crate) fn read_stored(
        &self,
        io: &dyn IoBackend,
        descriptor: &RecordDescriptor,
    ) -> CacheResult<Vec<u8>> {
        let file = self.shared(io)?;
        self.read_locked(&file, io, descriptor)
    }

    /// Reads the stored bytes of one record under a lock the caller holds.
    pub(crate) fn read_locked(
        &self,
        file: &SegmentFile,
        io: &dyn IoBackend,
        descriptor: &RecordDescriptor,
    ) -> CacheResult<Vec<u8>> {
        let invalid = |reason| CacheError::InvalidDescriptor {
            offset: descriptor.offset,
            reason,
        };

        if descriptor.is_empty() {
            return Err(CacheError::InvalidSize);
        }
        if descriptor.stored_size == 0 {
            return Err(invalid("stored size is zero"));
        }
        if descriptor.offset < HEADER_SIZE {
            return Err(invalid("offset falls inside the segment header"));
        }
        let end = descriptor
            .end()
            .ok_or_else(|| invalid("offset plus size overflows"))?;
        if end > file.cursor {
            return Err(invalid("record extends past the end of the segment"));
        }
        let len = usize::try_from(descriptor.stored_size)
            .map_err(|_| invalid("stored size does not fit in memory"))?;

        let mut buf = vec![0u8; len];
        io.read_exact_at(self.handle(file)?, descriptor.offset, &mut buf)
            .map_err(|source| self.read_error(source))?;
        Ok(buf)
    }

    /// Replaces the file with one holding only `records`, written back in
    /// order.
    ///
    /// The records go to a staging file next to the segment, which is synced
    /// and then renamed over it. On any failure the staging file is deleted
    /// and the segment file on disk is left as it was. Afterwards the handle
    /// is closed and the file reopens on next use.
    ///
    /// Returns the new offset of each record. The caller holds the exclusive
    /// lock and has drained pending writes.
    pub(crate) fn rewrite(
        &self,
        file: &mut SegmentFile,
        io: &dyn IoBackend,
        records: &[Vec<u8>],
    ) -> CacheResult<Vec<u64>> {
        let staging = self.staging_path();
        let (offsets, end) = self
            .swap_in(file, io, &staging, records)
            .inspect_err(|e| {
                tracing::warn!(
                    segment = %self.id,
                    group = %self.group,
                    error = %e,
                    "compaction abandoned, segment file unchanged"
                );
                self.discard(io, &staging);
            })?;

        file.cursor = end;
        Ok(offsets)
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("compact")
    }

    fn swap_in(
        &self,
        file: &mut SegmentFile,
        io: &dyn IoBackend,
        staging: &Path,
        records: &[Vec<u8>],
    ) -> CacheResult<(Vec<u64>, u64)> {
        let staged = self.stage(io, staging, records)?;

        // The live handle goes first so the rename can replace the file.
        // Without a handle the segment reopens lazily.
        if let Some(handle) = file.handle.take() {
            io.close(handle).map_err(|source| self.write_error(source))?;
        }
        io.rename(staging, &self.path)
            .map_err(|source| self.write_error(source))?;
        Ok(staged)
    }

    /// Writes the header and `records` to a fresh file at `staging`.
    fn stage(
        &self,
        io: &dyn IoBackend,
        staging: &Path,
        records: &[Vec<u8>],
    ) -> CacheResult<(Vec<u64>, u64)> {
        let handle = io
            .open(staging, OpenMode::Recreate)
            .map_err(|source| CacheError::Open {
                path: staging.to_path_buf(),
                source,
            })?;

        let mut offsets = Vec::with_capacity(records.len());
        let written = io
            .write_all_at(&handle, 0, &Header::CURRENT.encode())
            .and_then(|()| {
                let mut cursor = HEADER_SIZE;
                for bytes in records {
                    io.write_all_at(&handle, cursor, bytes)?;
                    offsets.push(cursor);
                    cursor += bytes.len() as u64;
                }
                io.fsync(&handle)?;
                Ok(cursor)
            });
        let closed = io.close(handle);

        let end = written.and_then(|end| closed.map(|()| end));
        end.map(|end| (offsets, end))
            .map_err(|source| CacheError::Write {
                path: staging.to_path_buf(),
                source,
            })
    }

    fn discard(&self, io: &dyn IoBackend, staging: &Path) {
        if !io.exists(staging) {
            return;
        }
        if let Err(e) = io.remove_file(staging) {
            tracing::warn!(
                segment = %self.id,
                path = %staging.display(),
                error = %e,
                "failed to delete compaction staging file"
            );
        }
    }

    /// Marks the segment retired, closes the handle and deletes its file.
    ///
    /// The delete is attempted even when closing fails; the first error is
    /// reported.
    pub(crate) fn close_and_remove(&self, io: &dyn IoBackend) -> CacheResult<()> {
        let mut file = self.exclusive_drained()?;
        file.retired = true;
        file.cursor = 0;
        let handle = file.handle.take();
        drop(file);

        let closed = handle.map_or(Ok(()), |handle| io.close(handle));
        let removed = if io.exists(&self.path) {
            io.remove_file(&self.path)
        } else {
            Ok(())
        };
        closed
            .and(removed)
            .map_err(|source| self.write_error(source))
    }

    fn handle<'a>(&self, file: &'a SegmentFile) -> CacheResult<&'a FileHandle> {
        file.handle.as_ref().ok_or_else(|| CacheError::Read {
            path: self.path.clone(),
            source: IoError::Closed { handle: 0 },
        })
    }

    fn read_error(&self, source: IoError) -> CacheError {
        CacheError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: IoError) -> CacheError {
        CacheError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
