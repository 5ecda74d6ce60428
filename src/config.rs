//! Engine configuration, loaded from an optional TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level snaplab configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the zfs binary.
    #[serde(default = "default_zfs_path")]
    pub zfs_path: PathBuf,
    /// Per-command timeout in seconds. Commands that exceed it fail; there
    /// is no automatic retry.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_zfs_path() -> PathBuf {
    PathBuf::from(crate::zfs::DEFAULT_ZFS_PATH)
}

fn default_command_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zfs_path: default_zfs_path(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config file {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if it exists, otherwise returns defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the command timeout as a Duration.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(Error::Config(
                "command_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.zfs_path.as_os_str().is_empty() {
            return Err(Error::Config("zfs_path cannot be empty".to_string()));
        }
        Ok(())
    }
}
