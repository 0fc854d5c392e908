//! # larder-types: Core types for `Larder`
//!
//! This crate contains the plain value types shared across the `Larder`
//! workspace:
//! - Segment identity ([`SegmentId`])
//! - Payload compression marker ([`CompressionLevel`])
//! - Caller-held record metadata ([`RecordDescriptor`])
//!
//! None of these types perform I/O. A [`RecordDescriptor`] is produced by the
//! cache when a write completes and is owned by the caller from then on; the
//! cache never persists it.

use std::{
    fmt::{Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Segment identity
// ============================================================================

/// Identity of a segment (one backing file).
///
/// Identities are random 64-bit values rather than a sequence, so two caches
/// sharing a root directory practically never collide. The [`Display`] form
/// (16 lowercase hex digits) is the segment's file name on disk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Draws a fresh random identity from the thread-local RNG.
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Debug for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SegmentId({:016x})", self.0)
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for SegmentId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SegmentId> for u64 {
    fn from(id: SegmentId) -> Self {
        id.0
    }
}

/// Error returned when a string is not a 16-digit hex segment identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSegmentIdError {
    input: String,
}

impl Display for ParseSegmentIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid segment id {:?}: expected 16 hex digits", self.input)
    }
}

impl std::error::Error for ParseSegmentIdError {}

impl FromStr for SegmentId {
    type Err = ParseSegmentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseSegmentIdError {
                input: s.to_string(),
            });
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| ParseSegmentIdError {
                input: s.to_string(),
            })
    }
}

// ============================================================================
// Compression
// ============================================================================

/// Compression level a payload was stored with.
///
/// Level 0 means the bytes are stored raw. Any other value is the zstd level
/// that produced the stored bytes; the level is informational on the read
/// path, since zstd frames decode without it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// Stored raw.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    pub const fn new(level: u8) -> Self {
        Self(level)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns true if the stored bytes must be decompressed on read.
    pub const fn is_compressed(self) -> bool {
        self.0 != 0
    }
}

impl Display for CompressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_compressed() {
            write!(f, "zstd:{}", self.0)
        } else {
            write!(f, "raw")
        }
    }
}

impl From<u8> for CompressionLevel {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

// ============================================================================
// Record descriptor
// ============================================================================

/// Where a payload lives inside a segment file and how to validate it.
///
/// # Invariants
///
/// - `offset` always falls after the segment header.
/// - `checksum` is computed over the *decompressed* payload.
/// - `stored_size` is the number of bytes on disk; it equals `logical_size`
///   when `compression` is [`CompressionLevel::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RecordDescriptor {
    /// Byte position of the stored payload in the segment file.
    pub offset: u64,
    /// Length of the payload as produced by the serializer.
    pub logical_size: u64,
    /// Length of the payload as written to disk.
    pub stored_size: u64,
    /// Compression applied to the stored bytes.
    pub compression: CompressionLevel,
    /// Checksum of the logical (decompressed) payload.
    pub checksum: u32,
}

impl RecordDescriptor {
    /// Returns true for a descriptor that describes no payload.
    pub fn is_empty(&self) -> bool {
        self.logical_size == 0
    }

    /// Returns the byte position one past the stored payload, or `None` if
    /// that position overflows.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.stored_size)
    }
}
