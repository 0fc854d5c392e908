//! # larder-config: cache settings from files and the environment
//!
//! [`LarderConfig`] holds the `[cache]` and `[workers]` tables. Most callers
//! want [`ConfigLoader`], which layers defaults, the user file,
//! `larder.toml`, `larder.local.toml` and `LARDER_*` variables (`__` between
//! table and key), in that order of increasing precedence.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{DEFAULT_CACHE_ROOT, LOCAL_FILE, PROJECT_FILE, Paths};

/// Highest zstd level accepted in `cache.compression_level`.
pub const MAX_COMPRESSION_LEVEL: u8 = 22;

/// Everything a cache needs to start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LarderConfig {
    pub cache: CacheSection,
    pub workers: WorkerSection,
}

/// Storage settings for the segment cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Directory holding one subdirectory per segment group.
    pub root: PathBuf,
    /// Payloads strictly larger than this many bytes are compressed.
    pub compression_threshold: usize,
    /// zstd level applied above the threshold.
    pub compression_level: u8,
    /// Seed for the CRC32 record checksum.
    pub checksum_seed: u32,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_CACHE_ROOT),
            compression_threshold: 4096,
            compression_level: 3,
            checksum_seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    /// Background threads executing writes and teardowns.
    pub threads: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }
}

impl LarderConfig {
    /// Loads from the current directory with every layer enabled.
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parses a single TOML file, without merging any other source.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders the configuration as a TOML document.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks value ranges the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.cache.compression_level;
        if self.cache.root.as_os_str().is_empty() {
            Err(ConfigError::EmptyCacheRoot)
        } else if !(1..=MAX_COMPRESSION_LEVEL).contains(&level) {
            Err(ConfigError::CompressionLevel {
                level,
                max: MAX_COMPRESSION_LEVEL,
            })
        } else if self.workers.threads == 0 {
            Err(ConfigError::NoWorkers)
        } else {
            Ok(())
        }
    }

    /// Anchors a relative `cache.root` at `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if self.cache.root.is_relative() {
            self.cache.root = base_dir.as_ref().join(&self.cache.root);
        }
    }
}
