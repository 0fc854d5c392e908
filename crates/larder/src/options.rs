//! Runtime settings consumed by the cache.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use larder_config::LarderConfig;
use larder_types::CompressionLevel;

/// Default size above which payloads are compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 4096;

/// Default zstd level.
pub const DEFAULT_COMPRESSION_LEVEL: CompressionLevel = CompressionLevel::new(3);

/// Settings for one [`Cache`](crate::Cache).
///
/// Built directly, or from a loaded [`LarderConfig`]:
///
/// ```no_run
/// use larder::CacheOptions;
/// use larder_config::LarderConfig;
///
/// let config = LarderConfig::load().unwrap();
/// let options = CacheOptions::from(&config);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Directory holding one subdirectory per segment group.
    pub root: PathBuf,
    /// Payloads strictly larger than this are compressed.
    pub compression_threshold: usize,
    pub compression_level: CompressionLevel,
    pub checksum_seed: u32,
    /// Worker count for [`Cache::open`](crate::Cache::open).
    pub worker_threads: usize,
}

impl CacheOptions {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            checksum_seed: 0,
            worker_threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    pub fn with_compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_checksum_seed(mut self, seed: u32) -> Self {
        self.checksum_seed = seed;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Returns true if a payload of `len` bytes goes through the codec.
    pub fn should_compress(&self, len: usize) -> bool {
        len > self.compression_threshold && self.compression_level.is_compressed()
    }
}

impl From<&LarderConfig> for CacheOptions {
    fn from(config: &LarderConfig) -> Self {
        Self {
            root: config.cache.root.clone(),
            compression_threshold: config.cache.compression_threshold,
            compression_level: CompressionLevel::new(config.cache.compression_level),
            checksum_seed: config.cache.checksum_seed,
            worker_threads: config.workers.threads,
        }
    }
}
