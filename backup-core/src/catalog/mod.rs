//! Read-only projection of the artifacts in a backups directory.
//!
//! Nothing here is cached: every call rescans the directory, so the
//! filesystem stays the only source of truth.

pub mod id;

use crate::utils::errors::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use id::BackupId;
use serde::{Serialize, Serializer};
use std::io;
use std::path::Path;

/// One artifact as found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub filename: String,
    #[serde(serialize_with = "iso_millis")]
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

impl BackupRecord {
    pub fn new(id: &BackupId, size: u64) -> Self {
        Self {
            id: id.as_str().to_string(),
            filename: id.filename(),
            created_at: id.created_at(),
            size,
        }
    }
}

fn iso_millis<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// All recognized artifacts in `backups_dir`, newest first.
///
/// A missing directory is an empty catalog. Names outside the artifact
/// grammar are skipped; a metadata failure on a recognized artifact fails
/// the whole listing.
pub async fn list(backups_dir: &Path) -> Result<Vec<BackupRecord>> {
    let mut dir = match tokio::fs::read_dir(backups_dir).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(BackupId::from_filename) else {
            continue;
        };

        let metadata = tokio::fs::metadata(entry.path()).await?;
        if !metadata.is_file() {
            continue;
        }
        records.push(BackupRecord::new(&id, metadata.len()));
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
}
