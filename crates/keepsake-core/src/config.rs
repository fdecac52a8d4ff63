//! Keepsake configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::Result;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "KEEPSAKE_DATA_DIR";

const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the snapshot database file
    pub database_path: PathBuf,
    /// Directory holding the embedded databases the scanner inspects
    pub databases_dir: PathBuf,
    /// Whether the scanner may list every database in `databases_dir`
    pub enumerate_databases: bool,
    /// Largest inbound host message accepted, in bytes
    pub max_message_bytes: usize,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("keepsake.db"),
            databases_dir: data_dir.join("databases"),
            enumerate_databases: true,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Read a JSON config file. Keys left out take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| CoreError::Config(format!("{}: {e}", path.display())))?;

        if config.max_message_bytes == 0 {
            return Err(CoreError::Config(
                "max_message_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn data_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }

        dirs::data_local_dir()
            .map(|d| d.join("Keepsake"))
            .unwrap_or_else(|| PathBuf::from(".keepsake"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

// Platform data directory lookup
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
