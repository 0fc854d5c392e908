//! Errors raised while locating, reading or checking configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid TOML")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot render configuration as TOML")]
    Render(#[from] toml::ser::Error),

    #[error("cache.root is empty")]
    EmptyCacheRoot,

    #[error("cache.compression_level {level} is outside 1..={max}")]
    CompressionLevel { level: u8, max: u8 },

    #[error("workers.threads must be at least 1")]
    NoWorkers,

    /// The platform reports no home directory, so there is no user config file.
    #[error("no home directory to place the user config file in")]
    NoHomeDirectory,
}
