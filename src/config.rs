//! Workspace configuration loaded from TOML.
//!
//! ```toml
//! [board]
//! name = "Studio Sprint"
//!
//! [[board.columns]]
//! name = "Not Started"
//! status = "not-started"
//!
//! [storage]
//! root = "/srv/psychostasia"
//! ```

use crate::domain::BoardConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Project root; file storage lives in `<root>/.psychostasia`
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub board: BoardConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl WorkspaceConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: WorkspaceConfig = toml::from_str(contents)?;
        config.board.validate()?;
        Ok(config)
    }

    /// Reads a config file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
