//! Backend configuration via `emulator.toml`
//!
//! The file sits next to the catalog in the data directory. It is written
//! when the backend is started and read by every process that attaches to
//! it, so all scenario runners see the same behaviour.

use crate::error::{Result, Status};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the backend data directory.
pub const CONFIG_FILE_NAME: &str = "emulator.toml";

/// Backend behaviour knobs.
///
/// # Example
///
/// ```toml
/// multiplexed_mutation_loss = true
/// ```
///
/// The fault profile is off unless a config turns it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Drop the mutations of a commit on a multiplexed session whose
    /// transaction was begun by a standalone RPC without a mutation key and
    /// has executed no DML. The commit still reports success.
    #[serde(default = "default_mutation_loss")]
    pub multiplexed_mutation_loss: bool,
}

fn default_mutation_loss() -> bool {
    false
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            multiplexed_mutation_loss: default_mutation_loss(),
        }
    }
}

impl EmulatorConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Transactional backend configuration
#
# Reproduce the lost-mutation defect: a commit on a multiplexed session,
# begun explicitly without a mutation key and with no DML executed,
# silently discards its buffered mutations (default: false)
multiplexed_mutation_loss = false
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Status::internal(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            Status::invalid_argument(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load `emulator.toml` from a data directory, defaulting when absent.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Status::internal(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Status::internal(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Status::internal(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
