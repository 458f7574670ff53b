//! Backup and restore for game-server data directories.
//!
//! Creates compressed snapshots of a server's world data and configuration,
//! lists and prunes them under a retention policy, and restores one with a
//! journaled swap that rolls back on failure.

pub mod api;
pub mod catalog;
pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod policy;
pub mod restore;
pub mod retention;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use api::Outcome;
pub use catalog::BackupRecord;
pub use config::Config;
pub use daemon::scheduler::Scheduler;
pub use policy::RetentionConfig;
pub use service::BackupService;
pub use utils::errors::{BackupError, ErrorCategory, Result};
