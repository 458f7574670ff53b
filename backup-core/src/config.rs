//! Configuration for the backup subsystem.
//!
//! Loaded from a TOML file; the daemon layers environment variables and
//! command-line flags on top.

use crate::policy::RetentionConfig;
use crate::service::DEFAULT_COMPRESSION_LEVEL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root holding `servers/<id>/{server,backups}`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Deflate level (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Base policy every server's overrides are applied to
    #[serde(default)]
    pub backup: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: String,

    /// Partial policy, validated when schedules are hydrated
    #[serde(default)]
    pub backup: Option<serde_json::Value>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/panel")
}

fn default_compression_level() -> u8 {
    DEFAULT_COMPRESSION_LEVEL
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn server(&self, id: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.id == id)
    }
}
