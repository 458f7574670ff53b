//! Reversible moves for the restore swap.
//!
//! Each forward move records its undo only after it succeeded, so unwinding
//! the journal in reverse order returns the live tree to where it started.

use crate::fs::ops::FsOps;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// Move the captured original at `saved` back to `live`.
    Uncapture { live: PathBuf, saved: PathBuf },
    /// Remove the restored entry now sitting at `live`.
    Unplace { live: PathBuf },
}

#[derive(Debug, Default)]
pub struct Journal {
    steps: Vec<Undo>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the live entry at `live` into the rollback area at `saved`.
    pub async fn capture(&mut self, ops: &dyn FsOps, live: &Path, saved: &Path) -> io::Result<()> {
        ops.rename(live, saved).await?;
        self.steps.push(Undo::Uncapture {
            live: live.to_path_buf(),
            saved: saved.to_path_buf(),
        });
        Ok(())
    }

    /// Move a staged entry into its live location.
    pub async fn place(&mut self, ops: &dyn FsOps, staged: &Path, live: &Path) -> io::Result<()> {
        ops.rename(staged, live).await?;
        self.steps.push(Undo::Unplace {
            live: live.to_path_buf(),
        });
        Ok(())
    }

    pub fn steps(&self) -> &[Undo] {
        &self.steps
    }

    /// Undo every recorded step, newest first, carrying on past failures.
    /// Returns how many undo steps failed.
    pub async fn unwind(self, ops: &dyn FsOps) -> usize {
        let mut failed = 0;
        for step in self.steps.into_iter().rev() {
            let result = match &step {
                Undo::Unplace { live } => remove_entry(ops, live).await,
                Undo::Uncapture { live, saved } => ops.rename(saved, live).await,
            };
            if let Err(e) = result {
                error!(step = ?step, error = %e, "Rollback step failed");
                failed += 1;
            }
        }
        failed
    }
}

/// Remove a file or directory tree; already absent is fine.
async fn remove_entry(ops: &dyn FsOps, path: &Path) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        ops.remove_file(path).await
    }
}

/// Best-effort `remove_dir_all` for staging areas.
pub(crate) async fn discard_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staging directory"),
    }
}
