//! Restores an artifact onto a live server data tree.
//!
//! The artifact is fully extracted and checked in a staging directory before
//! anything live is touched. The swap then moves each live managed directory
//! and root config file aside into a rollback area and moves the staged
//! replacement in; any failure unwinds those moves.
//!
//! ```text
//! Idle -> Validating -> Extracting -> Swapping -> Committed
//!                                        \-> RollingBack -> Failed
//! ```

pub mod journal;

use crate::catalog::id::BackupId;
use crate::fs::layout::{ServerLayout, MANAGED_DIRS, RESTORE_ROLLBACK_PREFIX, RESTORE_STAGING_PREFIX};
use crate::fs::ops::FsOps;
use crate::fs::walker::collect_root_files;
use crate::utils::errors::{BackupError, Result};
use journal::{discard_dir, Journal};
use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStage {
    Idle,
    Validating,
    Extracting,
    Swapping,
    Committed,
    RollingBack,
    Failed,
}

/// What a successful restore replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub backup_id: String,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

/// Restorable entries found at the top of a staging directory.
#[derive(Debug, Default)]
struct StagedContent {
    directories: Vec<String>,
    files: Vec<String>,
}

impl StagedContent {
    fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

struct RestoreRun<'a> {
    layout: &'a ServerLayout,
    ops: &'a dyn FsOps,
    stage: RestoreStage,
}

impl<'a> RestoreRun<'a> {
    fn advance(&mut self, next: RestoreStage) {
        debug!(
            server_id = %self.layout.server_id(),
            from = ?self.stage,
            to = ?next,
            "Restore stage"
        );
        self.stage = next;
    }

    async fn run(&mut self, backup_id: &str) -> Result<RestoreReport> {
        self.advance(RestoreStage::Validating);
        let artifact = self.validate(backup_id).await?;

        let server_dir = self.layout.server_dir();
        let stamp = chrono::Utc::now().timestamp_millis();
        let staging = server_dir.join(format!("{RESTORE_STAGING_PREFIX}{stamp}"));

        self.advance(RestoreStage::Extracting);
        tokio::fs::create_dir(&staging).await?;
        let content = match self.extract(&artifact, &staging).await {
            Ok(content) => content,
            Err(e) => {
                discard_dir(&staging).await;
                return Err(e);
            }
        };

        self.advance(RestoreStage::Swapping);
        let rollback = server_dir.join(format!("{RESTORE_ROLLBACK_PREFIX}{stamp}"));
        if let Err(e) = tokio::fs::create_dir(&rollback).await {
            discard_dir(&staging).await;
            return Err(e.into());
        }

        let mut journal = Journal::new();
        let swapped = self
            .swap(&mut journal, &content, &staging, &rollback, &server_dir)
            .await;
        discard_dir(&staging).await;

        match swapped {
            Ok(()) => {
                discard_dir(&rollback).await;
                self.advance(RestoreStage::Committed);
                Ok(RestoreReport {
                    backup_id: backup_id.to_string(),
                    directories: content.directories,
                    files: content.files,
                })
            }
            Err(cause) => {
                self.advance(RestoreStage::RollingBack);
                warn!(
                    server_id = %self.layout.server_id(),
                    error = %cause,
                    steps = journal.steps().len(),
                    "Restore swap failed, rolling back"
                );
                let failed_undos = journal.unwind(self.ops).await;
                let rolled_back = failed_undos == 0;
                if rolled_back {
                    discard_dir(&rollback).await;
                } else {
                    error!(
                        server_id = %self.layout.server_id(),
                        failed_undos,
                        rollback_dir = %rollback.display(),
                        "Rollback incomplete, original data kept in rollback directory"
                    );
                }
                self.advance(RestoreStage::Failed);
                Err(BackupError::RestoreFailed {
                    cause: cause.to_string(),
                    rolled_back,
                })
            }
        }
    }

    async fn validate(&self, backup_id: &str) -> Result<PathBuf> {
        let id = BackupId::parse(backup_id)
            .ok_or_else(|| BackupError::InvalidBackupId(backup_id.to_string()))?;

        let server_dir = self.layout.server_dir();
        match tokio::fs::metadata(&server_dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(BackupError::ServerDataMissing(server_dir)),
        }

        let artifact = self.layout.artifact_path(&id);
        match tokio::fs::metadata(&artifact).await {
            Ok(meta) if meta.is_file() => Ok(artifact),
            _ => Err(BackupError::NotFound(id.filename())),
        }
    }

    async fn extract(&self, artifact: &Path, staging: &Path) -> Result<StagedContent> {
        let (artifact, staging) = (artifact.to_path_buf(), staging.to_path_buf());
        let content = tokio::task::spawn_blocking(move || {
            extract_archive(&artifact, &staging)?;
            scan_staging(&staging)
        })
        .await??;

        if content.is_empty() {
            return Err(BackupError::NoRestorableContent);
        }
        Ok(content)
    }

    async fn swap(
        &self,
        journal: &mut Journal,
        content: &StagedContent,
        staging: &Path,
        rollback: &Path,
        server_dir: &Path,
    ) -> io::Result<()> {
        let names = content.directories.iter().chain(content.files.iter());
        for name in names {
            let live = server_dir.join(name);
            if tokio::fs::symlink_metadata(&live).await.is_ok() {
                journal.capture(self.ops, &live, &rollback.join(name)).await?;
            }
            journal.place(self.ops, &staging.join(name), &live).await?;
        }
        Ok(())
    }
}

/// Restore `backup_id` onto the live data tree of `layout`.
///
/// Invalid ids, missing artifacts, unreadable archives and archives with no
/// restorable content fail before the live tree is touched.
pub async fn restore_backup(layout: &ServerLayout, ops: &dyn FsOps, backup_id: &str) -> Result<RestoreReport> {
    info!(server_id = %layout.server_id(), backup = %backup_id, "Restoring backup");

    let mut run = RestoreRun {
        layout,
        ops,
        stage: RestoreStage::Idle,
    };
    let result = run.run(backup_id).await;

    match &result {
        Ok(report) => info!(
            server_id = %layout.server_id(),
            backup = %backup_id,
            directories = ?report.directories,
            files = ?report.files,
            "Backup restored"
        ),
        Err(e) => error!(
            server_id = %layout.server_id(),
            backup = %backup_id,
            stage = ?run.stage,
            error = %e,
            "Restore failed"
        ),
    }
    result
}

/// Blocking. Unpacks every entry of `artifact` under `dest`.
fn extract_archive(artifact: &Path, dest: &Path) -> Result<()> {
    let file = File::open(artifact)?;
    let mut archive = ZipArchive::new(file).map_err(corrupt)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(corrupt)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(BackupError::CorruptArchive(format!(
                "entry escapes the archive root: {}",
                entry.name()
            )));
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = File::create(&out_path)?;
        io::copy(&mut entry, &mut output).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                BackupError::CorruptArchive(e.to_string())
            }
            _ => BackupError::Io(e),
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode().map(|m| m & 0o777).filter(|m| *m != 0) {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

/// Blocking. Managed directories and root config files at the top of `staging`.
fn scan_staging(staging: &Path) -> Result<StagedContent> {
    let directories = MANAGED_DIRS
        .iter()
        .filter(|name| staging.join(name).is_dir())
        .map(|name| name.to_string())
        .collect();
    let files = collect_root_files(staging)?
        .into_iter()
        .map(|f| f.archive_name)
        .collect();
    Ok(StagedContent { directories, files })
}

fn corrupt(e: zip::result::ZipError) -> BackupError {
    BackupError::CorruptArchive(e.to_string())
}
