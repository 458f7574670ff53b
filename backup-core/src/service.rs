//! Backup operations for every server under one data directory.

use crate::catalog::{self, id::BackupId, BackupRecord};
use crate::daemon::guard::CreationGuard;
use crate::executor::{self, CreatedBackup};
use crate::fs::layout::{ServerLayout, RESTORE_ROLLBACK_PREFIX, RESTORE_STAGING_PREFIX, TMP_SUFFIX};
use crate::fs::ops::{FsOps, TokioFs};
use crate::fs::trash::{remove_artifact, Removal};
use crate::policy::{self, RetentionConfig};
use crate::restore::{self, RestoreReport};
use crate::retention::{self, RetentionReport};
use crate::utils::errors::{BackupError, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// Leftovers found by [`BackupService::sweep_stale`]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub removed_tmp: usize,
    pub removed_staging: usize,
    /// Rollback directories are never removed automatically
    pub kept_rollback: Vec<PathBuf>,
}

pub struct BackupService {
    data_dir: PathBuf,
    compression_level: u8,
    ops: Arc<dyn FsOps>,
    guard: CreationGuard,
}

impl BackupService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            ops: Arc::new(TokioFs),
            guard: CreationGuard::new(),
        }
    }

    /// Swap the filesystem primitives used for moves and deletes.
    pub fn with_ops(mut self, ops: Arc<dyn FsOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Clamped to the deflate range 0..=9.
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn guard(&self) -> &CreationGuard {
        &self.guard
    }

    pub fn layout(&self, server_id: &str) -> Result<ServerLayout> {
        ServerLayout::new(&self.data_dir, server_id)
    }

    /// Create a backup, refusing if one is already running for this server.
    pub async fn create(&self, server_id: &str) -> Result<CreatedBackup> {
        let layout = self.layout(server_id)?;
        let _permit = self.guard.acquire(server_id)?;
        executor::create_backup(&layout, self.ops.as_ref(), self.compression_level).await
    }

    /// Newest first.
    pub async fn list(&self, server_id: &str) -> Result<Vec<BackupRecord>> {
        let layout = self.layout(server_id)?;
        catalog::list(&layout.backups_dir()).await
    }

    pub async fn restore(&self, server_id: &str, backup_id: &str) -> Result<RestoreReport> {
        let layout = self.layout(server_id)?;
        restore::restore_backup(&layout, self.ops.as_ref(), backup_id).await
    }

    /// Delete one backup, falling back to the trash directory when the
    /// artifact cannot be unlinked.
    pub async fn delete(&self, server_id: &str, backup_id: &str) -> Result<Removal> {
        let layout = self.layout(server_id)?;
        let id = BackupId::parse(backup_id).ok_or_else(|| BackupError::InvalidBackupId(backup_id.to_string()))?;
        let removal = remove_artifact(self.ops.as_ref(), &layout.artifact_path(&id), &layout.trash_dir()).await?;

        match &removal {
            Removal::Deleted => info!(server_id, backup = %id, "Backup deleted"),
            Removal::Quarantined(to) => {
                warn!(server_id, backup = %id, trash = %to.display(), "Backup moved to trash")
            }
        }
        Ok(removal)
    }

    /// Delete whatever `policy` marks as surplus.
    ///
    /// Only a failure to list the catalog is an error. Individual deletions
    /// that fail are counted in the report.
    pub async fn apply_retention(&self, server_id: &str, policy: &RetentionConfig) -> Result<RetentionReport> {
        let layout = self.layout(server_id)?;
        let records = catalog::list(&layout.backups_dir()).await?;
        let plan = retention::evaluate(&records, policy, Utc::now());
        if plan.is_empty() {
            return Ok(RetentionReport::default());
        }

        let report = retention::apply(&plan, &layout, self.ops.as_ref()).await;
        info!(
            server_id,
            expired = plan.expired.len(),
            excess = plan.excess.len(),
            deleted = report.deleted,
            quarantined = report.quarantined,
            failed = report.failed,
            "Retention applied"
        );
        Ok(report)
    }

    pub fn normalize_policy(&self, partial: Option<&Value>, base: Option<&RetentionConfig>) -> Result<RetentionConfig> {
        let fallback = RetentionConfig::default();
        Ok(policy::normalize(partial, base.unwrap_or(&fallback))?)
    }

    /// Remove temporary artifacts and restore staging left by a crash.
    ///
    /// Holds the creation guard while it runs. Must not run alongside a
    /// restore of the same server.
    pub async fn sweep_stale(&self, server_id: &str) -> Result<SweepReport> {
        let layout = self.layout(server_id)?;
        let _permit = self.guard.acquire(server_id)?;
        let mut report = SweepReport::default();

        for path in entries_matching(&layout.backups_dir(), is_tmp_artifact).await? {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.removed_tmp += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove stale temporary artifact"),
            }
        }

        let server_dir = layout.server_dir();
        for path in entries_matching(&server_dir, |name| name.starts_with(RESTORE_STAGING_PREFIX)).await? {
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => report.removed_staging += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove stale restore staging"),
            }
        }

        for path in entries_matching(&server_dir, |name| name.starts_with(RESTORE_ROLLBACK_PREFIX)).await? {
            warn!(server_id, path = %path.display(), "Found rollback directory from an interrupted restore");
            report.kept_rollback.push(path);
        }

        Ok(report)
    }
}

/// `backup-<id>.zip.tmp`, as left by an interrupted creation.
fn is_tmp_artifact(name: &str) -> bool {
    name.strip_suffix(TMP_SUFFIX)
        .is_some_and(|artifact| BackupId::from_filename(artifact).is_some())
}

async fn entries_matching(dir: &Path, pred: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut matched = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_str().is_some_and(&pred) {
            matched.push(entry.path());
        }
    }
    matched.sort();
    Ok(matched)
}
