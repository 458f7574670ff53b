//! Filesystem primitives used for every mutation of artifacts and live data.
//!
//! All renames, copies and unlinks performed by the promoter, the safe
//! deleter and the restore swap go through [`FsOps`], so alternative
//! implementations can stand in for the real filesystem.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tracing::warn;

#[cfg(windows)]
const CROSS_DEVICE_OS_ERROR: i32 = 17; // ERROR_NOT_SAME_DEVICE
#[cfg(not(windows))]
const CROSS_DEVICE_OS_ERROR: i32 = 18; // EXDEV

#[async_trait]
pub trait FsOps: Send + Sync {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    async fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl FsOps for TokioFs {
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        tokio::fs::copy(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

pub fn cross_device_error() -> io::Error {
    io::Error::from_raw_os_error(CROSS_DEVICE_OS_ERROR)
}

pub fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(CROSS_DEVICE_OS_ERROR)
}

/// Failures a rename can recover from by copying instead.
pub fn is_fallback_eligible(err: &io::Error) -> bool {
    is_cross_device(err) || err.kind() == io::ErrorKind::PermissionDenied
}

/// How [`move_file`] got the file to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    Renamed,
    Copied,
}

/// Rename `from` to `to`, falling back to copy-then-unlink on cross-device
/// and permission failures.
///
/// On error `to` does not exist (a partial copy is removed) and `from` is
/// untouched; the rename error is returned, not the fallback's.
pub async fn move_file(ops: &dyn FsOps, from: &Path, to: &Path) -> io::Result<MoveMethod> {
    let rename_err = match ops.rename(from, to).await {
        Ok(()) => return Ok(MoveMethod::Renamed),
        Err(e) if is_fallback_eligible(&e) => e,
        Err(e) => return Err(e),
    };

    warn!(
        from = %from.display(),
        to = %to.display(),
        error = %rename_err,
        "Rename failed, falling back to copy"
    );

    let fallback = async {
        ops.copy(from, to).await?;
        ops.remove_file(from).await
    };

    match fallback.await {
        Ok(()) => Ok(MoveMethod::Copied),
        Err(e) => {
            warn!(from = %from.display(), error = %e, "Copy fallback failed");
            discard(ops, to).await;
            Err(rename_err)
        }
    }
}

/// Best-effort unlink for cleanup paths; a missing file is fine.
pub async fn discard(ops: &dyn FsOps, path: &Path) {
    match ops.remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}
