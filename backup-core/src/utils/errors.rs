//! Error types for the backup engine.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by collaborators to decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rejected before touching the filesystem
    Input,
    /// A required file or directory is missing, nothing was changed
    Precondition,
    /// Filesystem failure that survived every fallback
    Transient,
    /// Artifact is unreadable or holds nothing restorable, nothing was changed
    Corruption,
    Internal,
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("invalid server id: {0:?}")]
    InvalidServerId(String),

    #[error("invalid backup id: {0:?}")]
    InvalidBackupId(String),

    #[error(transparent)]
    InvalidPolicy(#[from] PolicyError),

    #[error("server data directory not found: {}", .0.display())]
    ServerDataMissing(PathBuf),

    #[error("backup source directory not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("backup not found: {0}")]
    NotFound(String),

    #[error("backup already in progress")]
    AlreadyInProgress(String),

    #[error("backup archive is corrupt: {0}")]
    CorruptArchive(String),

    #[error("backup contains no restorable content")]
    NoRestorableContent,

    /// `rolled_back` is false only when undoing the swap itself failed part-way.
    #[error("restore failed: {cause}")]
    RestoreFailed { cause: String, rolled_back: bool },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl BackupError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BackupError::InvalidServerId(_)
            | BackupError::InvalidBackupId(_)
            | BackupError::InvalidPolicy(_) => ErrorCategory::Input,
            BackupError::AlreadyInProgress(_)
            | BackupError::ServerDataMissing(_)
            | BackupError::SourceMissing(_)
            | BackupError::NotFound(_) => ErrorCategory::Precondition,
            BackupError::CorruptArchive(_) | BackupError::NoRestorableContent => {
                ErrorCategory::Corruption
            }
            BackupError::Io(_) | BackupError::RestoreFailed { .. } => ErrorCategory::Transient,
            BackupError::Archive(_) | BackupError::Task(_) => ErrorCategory::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for BackupError {
    fn from(e: tokio::task::JoinError) -> Self {
        BackupError::Task(e.to_string())
    }
}

/// First field of a retention policy that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid backup config: {field} {reason}")]
pub struct PolicyError {
    pub field: &'static str,
    pub reason: &'static str,
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_taxonomy() {
        assert_eq!(BackupError::InvalidBackupId("x".into()).category(), ErrorCategory::Input);
        assert_eq!(BackupError::NotFound("x".into()).category(), ErrorCategory::Precondition);
        assert_eq!(BackupError::NoRestorableContent.category(), ErrorCategory::Corruption);
        assert_eq!(
            BackupError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied)).category(),
            ErrorCategory::Transient
        );
    }

    #[test]
    fn test_in_progress_message_is_stable() {
        // Collaborators match on this text.
        let err = BackupError::AlreadyInProgress("alpha".into());
        assert_eq!(err.to_string(), "backup already in progress");
    }
}
