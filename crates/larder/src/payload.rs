//! Turning serialized payloads into stored bytes and back.
//!
//! Encoding decides between raw and compressed storage and computes the
//! checksum over the logical bytes. Decoding reverses it and validates, in
//! order: stored length, decompression (capped at the logical length),
//! logical length, checksum.

use larder_types::{CompressionLevel, RecordDescriptor};

use crate::checksum::checksum;
use crate::codec::Codec;
use crate::{CacheError, CacheOptions, CacheResult};

/// A payload ready to be appended, minus its offset.
#[derive(Debug)]
pub struct EncodedPayload {
    pub stored: Vec<u8>,
    pub logical_size: u64,
    pub compression: CompressionLevel,
    pub checksum: u32,
}

impl EncodedPayload {
    /// Completes the descriptor once the payload has been written at `offset`.
    pub fn descriptor(&self, offset: u64) -> RecordDescriptor {
        RecordDescriptor {
            offset,
            logical_size: self.logical_size,
            stored_size: self.stored.len() as u64,
            compression: self.compression,
            checksum: self.checksum,
        }
    }
}

/// Encodes a serialized payload for storage.
///
/// Payloads above the threshold are compressed; a codec error aborts the
/// write. Output that does not shrink is discarded and the raw bytes are
/// stored instead.
pub fn encode(
    logical: Vec<u8>,
    options: &CacheOptions,
    codec: &dyn Codec,
) -> CacheResult<EncodedPayload> {
    if logical.is_empty() {
        return Err(CacheError::InvalidSize);
    }

    let checksum = checksum(options.checksum_seed, &logical);
    let logical_size = logical.len() as u64;

    if options.should_compress(logical.len()) {
        let compressed = codec.compress(&logical, options.compression_level)?;
        if compressed.len() < logical.len() {
            return Ok(EncodedPayload {
                stored: compressed,
                logical_size,
                compression: options.compression_level,
                checksum,
            });
        }
        tracing::trace!(
            logical_size,
            compressed_size = compressed.len(),
            "compression did not shrink payload, storing raw"
        );
    }

    Ok(EncodedPayload {
        stored: logical,
        logical_size,
        compression: CompressionLevel::NONE,
        checksum,
    })
}

/// Decodes stored bytes read for `descriptor` and validates them.
pub fn decode(
    stored: Vec<u8>,
    descriptor: &RecordDescriptor,
    codec: &dyn Codec,
    seed: u32,
) -> CacheResult<Vec<u8>> {
    if stored.len() as u64 != descriptor.stored_size {
        return Err(CacheError::SizeMismatch {
            expected: descriptor.stored_size,
            actual: stored.len() as u64,
        });
    }

    let logical = if descriptor.compression.is_compressed() {
        let limit = usize::try_from(descriptor.logical_size).map_err(|_| {
            CacheError::InvalidDescriptor {
                offset: descriptor.offset,
                reason: "logical size does not fit in memory",
            }
        })?;
        codec.decompress(&stored, limit)?
    } else {
        stored
    };

    if logical.len() as u64 != descriptor.logical_size {
        return Err(CacheError::SizeMismatch {
            expected: descriptor.logical_size,
            actual: logical.len() as u64,
        });
    }

    let actual = checksum(seed, &logical);
    if actual != descriptor.checksum {
        tracing::warn!(
            offset = descriptor.offset,
            expected = descriptor.checksum,
            actual,
            "record checksum mismatch"
        );
        return Err(CacheError::ChecksumMismatch {
            expected: descriptor.checksum,
            actual,
        });
    }

    Ok(logical)
}
