//! [`IoBackend`] on `std::fs`.
//!
//! Reads and writes are positional: `pread`/`pwrite` through
//! `std::os::unix::fs::FileExt`, or `seek_read`/`seek_write` loops on Windows.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{FileHandle, IoBackend, OpenMode};
use crate::error::{IoError, IoOp};

/// Blocking backend over the OS page cache.
#[derive(Debug)]
pub struct SyncBackend {
    next_handle_id: AtomicU64,
}

impl SyncBackend {
    pub fn new() -> Self {
        Self {
            next_handle_id: AtomicU64::new(1),
        }
    }
}

impl Default for SyncBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for SyncBackend {
    fn open(&self, path: &Path, mode: OpenMode) -> Result<FileHandle, IoError> {
        let mut opts = OpenOptions::new();
        opts.read(true).write(true);
        match mode {
            OpenMode::Existing => {}
            OpenMode::Create => {
                opts.create(true);
            }
            OpenMode::Recreate => {
                opts.create(true).truncate(true);
            }
        }

        let file = opts.open(path).map_err(IoError::at_path(IoOp::Open, path))?;
        let id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle = id, path = %path.display(), ?mode, "file opened");
        Ok(FileHandle::new(id, path, file))
    }

    fn read_exact_at(
        &self,
        handle: &FileHandle,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<(), IoError> {
        let file = handle.file()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.read_exact_at(buf, offset).map_err(IoError::os(IoOp::Read))
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut filled = 0;
            while filled < buf.len() {
                let n = file
                    .seek_read(&mut buf[filled..], offset + filled as u64)
                    .map_err(IoError::os(IoOp::Read))?;
                if n == 0 {
                    let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
                    return Err(IoError::os(IoOp::Read)(eof));
                }
                filled += n;
            }
            Ok(())
        }
    }

    fn write_all_at(&self, handle: &FileHandle, offset: u64, buf: &[u8]) -> Result<(), IoError> {
        let file = handle.file()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            file.write_all_at(buf, offset).map_err(IoError::os(IoOp::Write))
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut written = 0;
            while written < buf.len() {
                let n = file
                    .seek_write(&buf[written..], offset + written as u64)
                    .map_err(IoError::os(IoOp::Write))?;
                if n == 0 {
                    let zero = std::io::Error::from(std::io::ErrorKind::WriteZero);
                    return Err(IoError::os(IoOp::Write)(zero));
                }
                written += n;
            }
            Ok(())
        }
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        handle.file()?.sync_all().map_err(IoError::os(IoOp::Sync))
    }

    fn close(&self, mut handle: FileHandle) -> Result<(), IoError> {
        handle.file = None;
        tracing::trace!(handle = handle.id, path = %handle.path.display(), "file closed");
        Ok(())
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        let metadata = handle.file()?.metadata().map_err(IoError::os(IoOp::Stat))?;
        Ok(metadata.len())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn remove_file(&self, path: &Path) -> Result<(), IoError> {
        fs::remove_file(path).map_err(IoError::at_path(IoOp::Remove, path))?;
        tracing::trace!(path = %path.display(), "file removed");
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), IoError> {
        fs::rename(from, to).map_err(IoError::at_path(IoOp::Rename, from))?;
        tracing::trace!(from = %from.display(), to = %to.display(), "file renamed");
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), IoError> {
        fs::create_dir_all(path).map_err(IoError::os(IoOp::CreateDir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_mode_requires_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let backend = SyncBackend::new();

        let err = backend.open(&path, OpenMode::Existing).unwrap_err();
        assert!(matches!(err, IoError::NotFound { path: ref p } if *p == path));
        assert!(!path.exists());

        backend.close(backend.open(&path, OpenMode::Create).unwrap()).unwrap();
        backend.close(backend.open(&path, OpenMode::Existing).unwrap()).unwrap();
    }

    #[test]
    fn create_mode_keeps_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let backend = SyncBackend::new();

        let handle = backend.open(&path, OpenMode::Create).unwrap();
        backend.write_all_at(&handle, 0, b"keep me").unwrap();
        backend.close(handle).unwrap();

        let handle = backend.open(&path, OpenMode::Create).unwrap();
        assert_eq!(backend.file_size(&handle).unwrap(), 7);
        backend.close(handle).unwrap();
    }

    #[test]
    fn recreate_mode_discards_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        let backend = SyncBackend::new();

        let handle = backend.open(&path, OpenMode::Create).unwrap();
        backend.write_all_at(&handle, 0, b"old records").unwrap();
        backend.close(handle).unwrap();

        let handle = backend.open(&path, OpenMode::Recreate).unwrap();
        assert_eq!(backend.file_size(&handle).unwrap(), 0);
        backend.close(handle).unwrap();
    }

    #[test]
    fn rename_replaces_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("segment");
        let staged = dir.path().join("segment.compact");
        let backend = SyncBackend::new();

        for (path, body) in [(&live, &b"old contents"[..]), (&staged, &b"new"[..])] {
            let handle = backend.open(path, OpenMode::Create).unwrap();
            backend.write_all_at(&handle, 0, body).unwrap();
            backend.close(handle).unwrap();
        }

        backend.rename(&staged, &live).unwrap();
        assert!(!backend.exists(&staged));
        assert_eq!(std::fs::read(&live).unwrap(), b"new");

        let err = backend.rename(&staged, &live).unwrap_err();
        assert!(matches!(err, IoError::NotFound { path } if path == staged));
    }

    #[test]
    fn closed_handle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyncBackend::new();
        let mut handle = backend.open(&dir.path().join("segment"), OpenMode::Create).unwrap();
        handle.file = None;

        let err = backend.write_all_at(&handle, 0, b"x").unwrap_err();
        assert!(matches!(err, IoError::Closed { handle: id } if id == handle.id()));
        assert_eq!(err.op(), None);
    }

    #[test]
    fn os_errors_carry_the_operation() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyncBackend::new();
        let handle = backend.open(&dir.path().join("segment"), OpenMode::Create).unwrap();

        let mut buf = [0u8; 4];
        let err = backend.read_exact_at(&handle, 0, &mut buf).unwrap_err();
        assert_eq!(err.op(), Some(IoOp::Read));
        assert!(err.is_unexpected_eof());
        assert!(err.to_string().starts_with("read failed"));
        backend.close(handle).unwrap();
    }
}
