//! Locates and loads canopy.toml for a project.

use std::path::PathBuf;

use super::{CanopyConfig, parser};

/// File name of the project configuration.
pub const CONFIG_FILE_NAME: &str = "canopy.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn from_project_root(project_root: PathBuf) -> Self {
        Self {
            config_path: project_root.join(CONFIG_FILE_NAME),
        }
    }

    /// Load the configuration; a missing file yields an empty configuration.
    pub fn load(&self) -> anyhow::Result<CanopyConfig> {
        if !self.config_path.exists() {
            tracing::debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(CanopyConfig::new());
        }
        parser::parse_canopy_toml(&self.config_path)
    }
}
