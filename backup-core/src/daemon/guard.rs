//! Per-server exclusion for backup creation.

use crate::utils::errors::{BackupError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Tracks which servers currently have a creation in flight
#[derive(Debug, Clone, Default)]
pub struct CreationGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

impl CreationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `server_id`, failing at once if it is already claimed.
    /// The claim is released when the returned permit is dropped.
    pub fn acquire(&self, server_id: &str) -> Result<CreationPermit> {
        let mut active = self.lock();
        if !active.insert(server_id.to_string()) {
            return Err(BackupError::AlreadyInProgress(server_id.to_string()));
        }
        Ok(CreationPermit {
            active: Arc::clone(&self.active),
            server_id: server_id.to_string(),
        })
    }

    pub fn is_active(&self, server_id: &str) -> bool {
        self.lock().contains(server_id)
    }

    /// Number of servers with a creation in flight
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of one creation
#[derive(Debug)]
pub struct CreationPermit {
    active: Arc<Mutex<HashSet<String>>>,
    server_id: String,
}

impl CreationPermit {
    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}

impl Drop for CreationPermit {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.server_id);
    }
}
