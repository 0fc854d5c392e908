//! Cache error types.

use std::path::PathBuf;

use larder_io::IoError;
use larder_types::SegmentId;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// Every failure is a per-operation outcome. Background writes report theirs
/// through the [`WriteTicket`](crate::WriteTicket); nothing crosses the
/// scheduler boundary by panic.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The segment file could not be opened or created.
    #[error("failed to open segment file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    /// Reading the segment file failed.
    #[error("failed to read segment file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    /// Writing, truncating or deleting the segment file failed.
    #[error("failed to write segment file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("{codec} compression failed: {reason}")]
    CompressionFailed { codec: &'static str, reason: String },

    #[error("{codec} decompression failed: {reason}")]
    DecompressionFailed { codec: &'static str, reason: String },

    /// The stored payload does not hash to the descriptor's checksum.
    #[error("checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// A zero-length payload or descriptor.
    #[error("record size must be non-zero")]
    InvalidSize,

    /// A write request was submitted without a serialize closure.
    #[error("write request has no serializer")]
    MissingSerializer,

    /// The descriptor cannot address a record in this segment.
    #[error("invalid descriptor at offset {offset}: {reason}")]
    InvalidDescriptor { offset: u64, reason: &'static str },

    #[error("invalid segment header: {reason}")]
    InvalidHeader { reason: String },

    #[error("unsupported segment format version {found} (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    /// The decoded payload length disagrees with the descriptor.
    #[error("payload size mismatch: descriptor says {expected} bytes, decoded {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The segment has been torn down; its file no longer exists.
    #[error("segment {segment} has been retired")]
    SegmentRetired { segment: SegmentId },

    #[error("segment {segment} not found in group {group:?}")]
    SegmentNotFound { group: String, segment: SegmentId },

    #[error("invalid group name {name:?}")]
    InvalidGroupName { name: String },

    /// The background job ended without reporting a result.
    #[error("background worker exited without completing the write")]
    WorkerLost,

    #[error("failed to start worker pool: {reason}")]
    WorkerPool { reason: String },
}

/// Broad failure category of a [`CacheError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    Io,
    Codec,
    Integrity,
    Request,
    Lifecycle,
}

/// Flat error code, matchable without inspecting payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Open,
    Read,
    Write,
    CompressionFailed,
    DecompressionFailed,
    ChecksumMismatch,
    InvalidSize,
    MissingSerializer,
    InvalidDescriptor,
    InvalidHeader,
    VersionMismatch,
    SizeMismatch,
    SegmentRetired,
    SegmentNotFound,
    InvalidGroupName,
    WorkerLost,
    WorkerPool,
}

impl ErrorKind {
    pub fn domain(self) -> ErrorDomain {
        match self {
            Self::Open | Self::Read | Self::Write => ErrorDomain::Io,
            Self::CompressionFailed | Self::DecompressionFailed => ErrorDomain::Codec,
            Self::ChecksumMismatch
            | Self::InvalidHeader
            | Self::VersionMismatch
            | Self::SizeMismatch => ErrorDomain::Integrity,
            Self::InvalidSize
            | Self::MissingSerializer
            | Self::InvalidDescriptor
            | Self::InvalidGroupName => ErrorDomain::Request,
            Self::SegmentRetired | Self::SegmentNotFound | Self::WorkerLost | Self::WorkerPool => {
                ErrorDomain::Lifecycle
            }
        }
    }
}

impl CacheError {
    /// Returns the flat error code of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open { .. } => ErrorKind::Open,
            Self::Read { .. } => ErrorKind::Read,
            Self::Write { .. } => ErrorKind::Write,
            Self::CompressionFailed { .. } => ErrorKind::CompressionFailed,
            Self::DecompressionFailed { .. } => ErrorKind::DecompressionFailed,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::InvalidSize => ErrorKind::InvalidSize,
            Self::MissingSerializer => ErrorKind::MissingSerializer,
            Self::InvalidDescriptor { .. } => ErrorKind::InvalidDescriptor,
            Self::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::SegmentRetired { .. } => ErrorKind::SegmentRetired,
            Self::SegmentNotFound { .. } => ErrorKind::SegmentNotFound,
            Self::InvalidGroupName { .. } => ErrorKind::InvalidGroupName,
            Self::WorkerLost => ErrorKind::WorkerLost,
            Self::WorkerPool { .. } => ErrorKind::WorkerPool,
        }
    }

    /// Returns true if the error means stored bytes failed validation.
    pub fn is_corruption(&self) -> bool {
        self.kind().domain() == ErrorDomain::Integrity
            || matches!(self, Self::DecompressionFailed { .. })
    }
}
