//! I/O error types.

use std::fmt;
use std::path::{Path, PathBuf};

/// The backend operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Open,
    Read,
    Write,
    Sync,
    Stat,
    Remove,
    Rename,
    CreateDir,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Write => "write",
            Self::Sync => "fsync",
            Self::Stat => "stat",
            Self::Remove => "remove",
            Self::Rename => "rename",
            Self::CreateDir => "create_dir",
        })
    }
}

/// Errors from the I/O backend.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("{op} failed: {source}")]
    Os {
        op: IoOp,
        #[source]
        source: std::io::Error,
    },

    #[error("no such file: {path}")]
    NotFound { path: PathBuf },

    /// The handle was used after [`IoBackend::close`](crate::IoBackend::close).
    #[error("file handle {handle} is closed")]
    Closed { handle: u64 },
}

impl IoError {
    /// Adapter for `map_err` that tags an OS error with `op`.
    pub fn os(op: IoOp) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Os { op, source }
    }

    /// Maps `NotFound` to [`IoError::NotFound`] for `path`, anything else to
    /// [`IoError::Os`].
    pub(crate) fn at_path(op: IoOp, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        move |source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Self::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Self::Os { op, source }
            }
        }
    }

    /// The failed operation, if the OS reported the error.
    pub fn op(&self) -> Option<IoOp> {
        match self {
            Self::Os { op, .. } => Some(*op),
            Self::NotFound { .. } | Self::Closed { .. } => None,
        }
    }

    /// Returns true if a read ran past the end of the file.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, Self::Os { source, .. } if source.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
