//! The [`IoBackend`] seam.
//!
//! A segment file is opened once, read and written at absolute offsets, and
//! either replaced by a compacted copy or deleted on teardown. The trait
//! covers exactly that; there is no shared file cursor, so concurrent readers
//! of one handle never disturb each other.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::IoError;

/// How [`IoBackend::open`] treats the file at the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file read-write; fail with `NotFound` otherwise.
    Existing,
    /// Open read-write, creating an empty file if there is none.
    Create,
    /// Open read-write and discard any previous contents.
    Recreate,
}

/// An open file.
///
/// Handed out by [`IoBackend::open`] and given back to [`IoBackend::close`].
/// The id is unique per backend and only used for diagnostics.
#[derive(Debug)]
pub struct FileHandle {
    pub(crate) id: u64,
    pub(crate) path: PathBuf,
    pub(crate) file: Option<File>,
}

impl FileHandle {
    pub(crate) fn new(id: u64, path: &Path, file: File) -> Self {
        Self {
            id,
            path: path.to_path_buf(),
            file: Some(file),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Path the handle was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn file(&self) -> Result<&File, IoError> {
        self.file.as_ref().ok_or(IoError::Closed { handle: self.id })
    }
}

/// File operations used by segments.
///
/// Synchronous and `&self` throughout: one backend is shared by every segment
/// of a cache, from any thread.
pub trait IoBackend: Send + Sync {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<FileHandle, IoError>;

    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// A file that ends first is an error (see [`IoError::is_unexpected_eof`]),
    /// never a short read.
    fn read_exact_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8])
    -> Result<(), IoError>;

    /// Writes all of `buf` starting at `offset`.
    fn write_all_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> Result<(), IoError>;

    /// Flushes data and metadata to stable storage.
    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError>;

    fn close(&self, handle: FileHandle) -> Result<(), IoError>;

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError>;

    /// True only for regular files.
    fn exists(&self, path: &Path) -> bool;

    fn remove_file(&self, path: &Path) -> Result<(), IoError>;

    /// Moves `from` over `to`, replacing any file already at `to`.
    ///
    /// Handles opened on `to` beforehand should be closed first; on some
    /// platforms the replace fails otherwise.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), IoError>;

    fn create_dir_all(&self, path: &Path) -> Result<(), IoError>;
}
