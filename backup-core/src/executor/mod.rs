//! Backup creation: archive to a temporary file, then promote it.

pub mod archive;
pub mod promote;

use crate::catalog::id::BackupId;
use crate::catalog::BackupRecord;
use crate::fs::layout::ServerLayout;
use crate::fs::ops::{discard, FsOps};
use crate::utils::errors::{BackupError, Result};
use archive::{write_archive, ArchiveSummary};
use promote::{promote, tmp_path_for};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// A promoted artifact and what went into it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBackup {
    pub backup: BackupRecord,
    pub summary: ArchiveSummary,
}

/// Create one artifact for `layout`. Callers serialize creations per server.
pub async fn create_backup(
    layout: &ServerLayout,
    ops: &dyn FsOps,
    compression_level: u8,
) -> Result<CreatedBackup> {
    let start_time = Instant::now();
    let server_dir = layout.server_dir();
    let backups_dir = layout.backups_dir();

    match tokio::fs::metadata(&server_dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(BackupError::ServerDataMissing(server_dir)),
    }

    tokio::fs::create_dir_all(&backups_dir).await?;

    let id = BackupId::generate();
    let dest = layout.artifact_path(&id);
    let tmp = tmp_path_for(&dest);

    info!(server_id = %layout.server_id(), backup = %id, "Creating backup");

    let summary = {
        let server_dir = server_dir.clone();
        let tmp = tmp.clone();
        tokio::task::spawn_blocking(move || write_archive(&server_dir, &tmp, compression_level)).await
    };
    let summary = match summary {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            error!(server_id = %layout.server_id(), error = %e, "Archive write failed");
            discard(ops, &tmp).await;
            return Err(e);
        }
        Err(e) => {
            discard(ops, &tmp).await;
            return Err(e.into());
        }
    };

    let method = promote(ops, &tmp, &dest).await?;
    let size = tokio::fs::metadata(&dest).await?.len();
    let backup = BackupRecord::new(&id, size);

    info!(
        server_id = %layout.server_id(),
        backup = %backup.filename,
        files = summary.files,
        bytes = size,
        promoted_by = ?method,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Backup created"
    );

    Ok(CreatedBackup { backup, summary })
}
