//! Compression codecs for record payloads.
//!
//! The cache talks to compression through the [`Codec`] trait so a failing or
//! instrumented codec can be swapped in with [`Cache::with_codec`]. The
//! default is [`ZstdCodec`].
//!
//! [`Cache::with_codec`]: crate::Cache::with_codec

use std::io::Read;

use larder_types::CompressionLevel;

use crate::{CacheError, CacheResult};

/// A compression/decompression codec.
pub trait Codec: Send + Sync {
    /// Short name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Compresses `input` at `level`.
    fn compress(&self, input: &[u8], level: CompressionLevel) -> CacheResult<Vec<u8>>;

    /// Decompresses previously compressed data.
    ///
    /// Fails rather than produce more than `limit` bytes.
    fn decompress(&self, input: &[u8], limit: usize) -> CacheResult<Vec<u8>>;
}

/// Zstandard codec. The level travels with each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, input: &[u8], level: CompressionLevel) -> CacheResult<Vec<u8>> {
        zstd::encode_all(input, i32::from(level.as_u8())).map_err(|e| {
            CacheError::CompressionFailed {
                codec: "zstd",
                reason: e.to_string(),
            }
        })
    }

    fn decompress(&self, input: &[u8], limit: usize) -> CacheResult<Vec<u8>> {
        let failed = |reason: String| CacheError::DecompressionFailed {
            codec: "zstd",
            reason,
        };

        // Stream one byte past the limit so overlong frames are caught
        // without allocating what they claim.
        let decoder =
            zstd::stream::read::Decoder::new(input).map_err(|e| failed(e.to_string()))?;
        let mut out = Vec::new();
        decoder
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|e| failed(e.to_string()))?;
        if out.len() > limit {
            return Err(failed(format!("output exceeds {limit} bytes")));
        }
        Ok(out)
    }
}
