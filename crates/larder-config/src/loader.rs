//! Layered loading through the `config` crate.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

use crate::{LarderConfig, Paths};

/// Builds a [`LarderConfig`] from defaults, files and the environment.
///
/// Later layers win, key by key:
///
/// 1. built-in defaults
/// 2. the user file (see [`Paths::user_file`])
/// 3. `larder.toml`
/// 4. `larder.local.toml`
/// 5. `{PREFIX}_SECTION__KEY` environment variables, e.g.
///    `LARDER_CACHE__COMPRESSION_LEVEL=9`
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    with_user: bool,
}

impl ConfigLoader {
    /// Loader for the current directory.
    pub fn new() -> Self {
        Self {
            project_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "LARDER".to_string(),
            with_user: true,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn without_user_config(mut self) -> Self {
        self.with_user = false;
        self
    }

    /// Files consulted by [`load`](Self::load), lowest precedence first.
    pub fn files(&self) -> Vec<PathBuf> {
        Paths::for_project(&self.project_dir).layers(self.with_user)
    }

    /// Merges every layer, makes `cache.root` absolute and validates.
    pub fn load(self) -> Result<LarderConfig> {
        let defaults =
            Config::try_from(&LarderConfig::default()).context("cannot seed default config")?;

        let layered = self.files().into_iter().fold(
            Config::builder().add_source(defaults),
            |builder, file| {
                builder.add_source(File::from(file).format(FileFormat::Toml).required(false))
            },
        );
        let merged = layered
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("cannot merge configuration sources")?;

        let mut config: LarderConfig = merged
            .try_deserialize()
            .context("configuration has unexpected keys or types")?;
        config.resolve_paths(&self.project_dir);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to resolved defaults on any error.
    pub fn load_or_default(self) -> LarderConfig {
        let project_dir = self.project_dir.clone();
        self.load().unwrap_or_else(|_| {
            let mut config = LarderConfig::default();
            config.resolve_paths(project_dir);
            config
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
