//! Segment file header.
//!
//! Every segment file starts with a fixed 8-byte header, written once when the
//! file is created and again when compaction recreates it:
//!
//! ```text
//! [magic:u32 LE = "LRDR"][version:u32 LE]
//!        4B                    4B
//! ```
//!
//! Record payloads follow with no framing; their positions live only in the
//! caller's [`RecordDescriptor`](larder_types::RecordDescriptor)s.

use crate::{CacheError, CacheResult};

/// Format magic, the ASCII bytes `LRDR` on disk.
pub const MAGIC: u32 = u32::from_le_bytes(*b"LRDR");

/// Current format version.
pub const VERSION: u32 = 1;

/// Encoded header length; the first record starts here.
pub const HEADER_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
}

impl Header {
    /// The header written by this build.
    pub const CURRENT: Self = Self {
        magic: MAGIC,
        version: VERSION,
    };

    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..].copy_from_slice(&self.version.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// Fails with [`CacheError::InvalidHeader`] on a short buffer or wrong
    /// magic, and [`CacheError::VersionMismatch`] on an unknown version.
    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        let Some(b) = bytes.get(..HEADER_SIZE as usize) else {
            return Err(CacheError::InvalidHeader {
                reason: format!("expected {HEADER_SIZE} bytes, found {}", bytes.len()),
            });
        };

        let header = Self {
            magic: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            version: u32::from_le_bytes([b[4], b[5], b[6], b[7]]),
        };

        if header.magic != MAGIC {
            return Err(CacheError::InvalidHeader {
                reason: format!("bad magic {:#010x}", header.magic),
            });
        }
        if header.version != VERSION {
            return Err(CacheError::VersionMismatch {
                expected: VERSION,
                found: header.version,
            });
        }
        Ok(header)
    }
}
