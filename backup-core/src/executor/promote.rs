//! Moves a finished temporary artifact to its discoverable name.

use crate::fs::layout::TMP_SUFFIX;
use crate::fs::ops::{discard, move_file, FsOps, MoveMethod};
use crate::utils::errors::Result;
use std::path::{Path, PathBuf};

/// `<dest>.tmp`, in the same directory so promotion is normally a rename.
pub fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Move `tmp` onto `dest`.
///
/// Whatever the outcome, `tmp` is gone afterwards (best effort on failure),
/// and on failure nothing is left at `dest`.
pub async fn promote(ops: &dyn FsOps, tmp: &Path, dest: &Path) -> Result<MoveMethod> {
    match move_file(ops, tmp, dest).await {
        Ok(method) => Ok(method),
        Err(e) => {
            discard(ops, tmp).await;
            Err(e.into())
        }
    }
}
