//! On-disk layout of a managed server.
//!
//! ```text
//! <data_dir>/servers/<id>/server/{universe,config,mods,logs}/...
//! <data_dir>/servers/<id>/server/*.{json,yaml,yml,properties}
//! <data_dir>/servers/<id>/backups/backup-<backup id>.zip
//! <data_dir>/servers/<id>/backups/.trash/<name>.deleted-<epoch ms>
//! ```

use crate::catalog::id::{artifact_name, BackupId};
use crate::utils::errors::{BackupError, Result};
use std::path::{Path, PathBuf};

/// Sub-directories captured by a backup and replaced by a restore.
pub const MANAGED_DIRS: [&str; 4] = ["universe", "config", "mods", "logs"];

/// Extensions of loose root-level files captured alongside the managed directories.
pub const ROOT_FILE_EXTENSIONS: [&str; 4] = ["json", "yaml", "yml", "properties"];

pub const TRASH_DIR: &str = ".trash";
pub const TMP_SUFFIX: &str = ".tmp";
pub const RESTORE_STAGING_PREFIX: &str = ".restore-tmp-";
pub const RESTORE_ROLLBACK_PREFIX: &str = ".restore-backup-";

/// Whether a root-level file name belongs in a backup.
pub fn is_root_config_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ROOT_FILE_EXTENSIONS.contains(&ext))
}

/// Paths for one server, resolved from a validated server id.
#[derive(Debug, Clone)]
pub struct ServerLayout {
    server_id: String,
    root: PathBuf,
}

impl ServerLayout {
    pub fn new(data_dir: &Path, server_id: &str) -> Result<Self> {
        if !is_valid_server_id(server_id) {
            return Err(BackupError::InvalidServerId(server_id.to_string()));
        }
        Ok(Self {
            server_id: server_id.to_string(),
            root: data_dir.join("servers").join(server_id),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// The live data tree.
    pub fn server_dir(&self) -> PathBuf {
        self.root.join("server")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.backups_dir().join(TRASH_DIR)
    }

    pub fn artifact_path(&self, id: &BackupId) -> PathBuf {
        self.backups_dir().join(artifact_name(id.as_str()))
    }
}

fn is_valid_server_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
