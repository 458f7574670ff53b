use backup_core::Config;
use std::path::{Path, PathBuf};

/// Effective settings after layering the config file, environment and flags.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub file: Config,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub compression_level: u8,
}

/// Values given on the command line; each one wins over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let file = match config_path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok(), overrides))
    }

    fn resolve(file: Config, env: impl Fn(&str) -> Option<String>, overrides: Overrides) -> Self {
        let data_dir = overrides
            .data_dir
            .or_else(|| env("PANEL_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| file.storage.data_dir.clone());
        let log_level = overrides
            .log_level
            .or_else(|| env("LOG_LEVEL"))
            .unwrap_or_else(|| file.log.level.clone());

        Self {
            compression_level: file.archive.compression_level,
            file,
            data_dir,
            log_level,
        }
    }
}
