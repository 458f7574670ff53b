//! Error taxonomy and logging bootstrap.

pub mod errors;
pub mod logger;

pub use errors::{BackupError, ErrorCategory, PolicyError, Result};
