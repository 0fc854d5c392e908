//! Where configuration files live.
//!
//! ```text
//! <user config dir>/larder/config.toml    user defaults
//! <project>/larder.toml                   checked in
//! <project>/larder.local.toml             local overrides, not checked in
//! <project>/.larder/cache                 default cache root
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

pub const PROJECT_FILE: &str = "larder.toml";
pub const LOCAL_FILE: &str = "larder.local.toml";
/// Default `cache.root`, relative to the project directory.
pub const DEFAULT_CACHE_ROOT: &str = ".larder/cache";

const USER_FILE: &str = "config.toml";

/// Configuration file locations for one project.
#[derive(Debug, Clone)]
pub struct Paths {
    project_dir: PathBuf,
    user_file: Option<PathBuf>,
}

impl Paths {
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        let user_file = ProjectDirs::from("dev", "larder", "larder")
            .map(|dirs| dirs.config_dir().join(USER_FILE));
        Self {
            project_dir: project_dir.into(),
            user_file,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn user_file(&self) -> Result<&Path, ConfigError> {
        self.user_file
            .as_deref()
            .ok_or(ConfigError::NoHomeDirectory)
    }

    pub fn project_file(&self) -> PathBuf {
        self.project_dir.join(PROJECT_FILE)
    }

    pub fn local_file(&self) -> PathBuf {
        self.project_dir.join(LOCAL_FILE)
    }

    /// Candidate files, lowest precedence first. Missing files are skipped by
    /// the loader, so nothing here touches the filesystem.
    pub fn layers(&self, with_user: bool) -> Vec<PathBuf> {
        let user = self.user_file.clone().filter(|_| with_user);
        user.into_iter()
            .chain([self.project_file(), self.local_file()])
            .collect()
    }
}
