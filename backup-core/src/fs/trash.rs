//! Artifact removal with a quarantine fallback.

use crate::fs::ops::{move_file, FsOps};
use crate::utils::errors::{BackupError, Result};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What happened to a removed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "path", rename_all = "snake_case")]
pub enum Removal {
    Deleted,
    /// Unlink failed, the artifact now lives at this path in the trash.
    Quarantined(PathBuf),
}

/// Unlink `artifact`, or move it under `trash_dir` when unlinking fails for
/// any reason other than the file being absent.
///
/// If quarantine fails too, the unlink error is returned and the artifact
/// stays where it was.
pub async fn remove_artifact(ops: &dyn FsOps, artifact: &Path, trash_dir: &Path) -> Result<Removal> {
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let unlink_err = match ops.remove_file(artifact).await {
        Ok(()) => {
            info!(backup = %name, "Deleted backup");
            return Ok(Removal::Deleted);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackupError::NotFound(name));
        }
        Err(e) => e,
    };

    warn!(backup = %name, error = %unlink_err, "Unlink failed, moving backup to trash");

    if let Err(e) = tokio::fs::create_dir_all(trash_dir).await {
        warn!(dir = %trash_dir.display(), error = %e, "Failed to create trash directory");
        return Err(unlink_err.into());
    }

    let target = quarantine_path(trash_dir, &name).await;
    match move_file(ops, artifact, &target).await {
        Ok(_) => {
            info!(backup = %name, trash = %target.display(), "Backup quarantined");
            Ok(Removal::Quarantined(target))
        }
        Err(e) => {
            warn!(backup = %name, error = %e, "Failed to quarantine backup");
            Err(unlink_err.into())
        }
    }
}

/// `<trash>/<name>.deleted-<epoch ms>`, with a counter if that is taken.
async fn quarantine_path(trash_dir: &Path, name: &str) -> PathBuf {
    let stamp = chrono::Utc::now().timestamp_millis();
    let base = format!("{name}.deleted-{stamp}");
    let mut candidate = trash_dir.join(&base);
    let mut n = 1;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = trash_dir.join(format!("{base}-{n}"));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::ops::TokioFs;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Unlink of the original artifact is refused; everything else is real.
    struct LockedArtifact {
        locked: PathBuf,
        rename_allowed: bool,
    }

    #[async_trait]
    impl FsOps for LockedArtifact {
        async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            if self.rename_allowed {
                TokioFs.rename(from, to).await
            } else {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
        }

        async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
            TokioFs.copy(from, to).await
        }

        async fn remove_file(&self, path: &Path) -> io::Result<()> {
            if path == self.locked {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            TokioFs.remove_file(path).await
        }
    }

    #[tokio::test]
    async fn test_plain_delete() -> Result<()> {
        let dir = TempDir::new()?;
        let artifact = dir.path().join("backup-2026-02-28T00-00-00.zip");
        std::fs::write(&artifact, b"zip")?;

        let removal = remove_artifact(&TokioFs, &artifact, &dir.path().join(".trash")).await?;
        assert_eq!(removal, Removal::Deleted);
        assert!(!artifact.exists());
        assert!(!dir.path().join(".trash").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() -> Result<()> {
        let dir = TempDir::new()?;
        let artifact = dir.path().join("backup-2026-02-28T00-00-00.zip");

        let err = remove_artifact(&TokioFs, &artifact, &dir.path().join(".trash"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unlink_failure_moves_to_trash() -> Result<()> {
        let dir = TempDir::new()?;
        let artifact = dir.path().join("backup-2026-02-28T00-00-00.zip");
        std::fs::write(&artifact, b"zip")?;
        let ops = LockedArtifact { locked: artifact.clone(), rename_allowed: true };

        let removal = remove_artifact(&ops, &artifact, &dir.path().join(".trash")).await?;
        let Removal::Quarantined(target) = removal else {
            panic!("expected quarantine, got {removal:?}");
        };
        assert!(!artifact.exists());
        assert!(target
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("backup-2026-02-28T00-00-00.zip.deleted-"));
        assert_eq!(std::fs::read(&target)?, b"zip");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_quarantine_keeps_artifact_in_place() -> Result<()> {
        let dir = TempDir::new()?;
        let artifact = dir.path().join("backup-2026-02-28T00-00-00.zip");
        std::fs::write(&artifact, b"zip")?;
        // Rename refused, and the copy fallback cannot unlink the source either.
        let ops = LockedArtifact { locked: artifact.clone(), rename_allowed: false };

        let err = remove_artifact(&ops, &artifact, &dir.path().join(".trash"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Io(ref e) if e.kind() == io::ErrorKind::PermissionDenied));
        assert!(artifact.exists());
        assert_eq!(std::fs::read_dir(dir.path().join(".trash"))?.count(), 0);
        Ok(())
    }
}
