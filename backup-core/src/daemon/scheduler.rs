//! Repeating backup timers, one per server.
//!
//! The registry is an ordinary value owned by whoever hosts the process
//! lifecycle; tests build their own instances.

use crate::policy::RetentionConfig;
use crate::service::BackupService;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

struct ScheduledTask {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

pub struct Scheduler {
    service: Arc<BackupService>,
    tasks: Mutex<HashMap<String, ScheduledTask>>,
}

impl Scheduler {
    pub fn new(service: Arc<BackupService>) -> Self {
        Self {
            service,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace any timer for `server_id` with one following `policy`.
    ///
    /// Returns false (and leaves no timer) when the policy is disabled or has
    /// no interval. Must be called from within a Tokio runtime.
    pub fn start(&self, server_id: &str, policy: RetentionConfig) -> bool {
        let period = Duration::from_secs(u64::from(policy.interval_minutes) * 60);
        self.start_every(server_id, policy, period)
    }

    fn start_every(&self, server_id: &str, policy: RetentionConfig, period: Duration) -> bool {
        // Remove and insert under one lock; a replaced timer is always cancelled.
        let mut tasks = self.lock();
        if let Some(old) = tasks.remove(server_id) {
            old.cancel.cancel();
            info!(server_id, "Scheduler stopped");
        }
        if !policy.is_scheduled() {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.service),
            server_id.to_string(),
            policy,
            period,
            cancel.clone(),
        ));

        tasks.insert(
            server_id.to_string(),
            ScheduledTask {
                cancel,
                _handle: handle,
            },
        );
        info!(server_id, interval_minutes = policy.interval_minutes, "Scheduler started");
        true
    }

    /// Cancel the timer for `server_id`. A tick already running finishes.
    pub fn stop(&self, server_id: &str) -> bool {
        match self.lock().remove(server_id) {
            Some(task) => {
                task.cancel.cancel();
                info!(server_id, "Scheduler stopped");
                true
            }
            None => false,
        }
    }

    /// Cancel every timer. Safe to call repeatedly.
    pub fn stop_all(&self) -> usize {
        let tasks: Vec<(String, ScheduledTask)> = self.lock().drain().collect();
        for (server_id, task) in &tasks {
            task.cancel.cancel();
            info!(server_id = %server_id, "Scheduler stopped");
        }
        tasks.len()
    }

    pub fn is_scheduled(&self, server_id: &str) -> bool {
        self.lock().contains_key(server_id)
    }

    /// Server ids with a live timer, sorted
    pub fn scheduled(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ScheduledTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for task in self.lock().values() {
            task.cancel.cancel();
        }
    }
}

async fn run_schedule(
    service: Arc<BackupService>,
    server_id: String,
    policy: RetentionConfig,
    period: Duration,
    cancel: CancellationToken,
) {
    // First tick one full period after start.
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => run_tick(&service, &server_id, &policy).await,
        }
    }
}

/// One scheduled run: create, then apply retention only if creation worked.
async fn run_tick(service: &BackupService, server_id: &str, policy: &RetentionConfig) {
    info!(server_id, "Creating scheduled backup");
    match service.create(server_id).await {
        Ok(created) => {
            info!(server_id, backup = %created.backup.filename, "Scheduled backup created");
            if let Err(e) = service.apply_retention(server_id, policy).await {
                error!(server_id, error = %e, "Retention after scheduled backup failed");
            }
        }
        Err(e) => error!(server_id, error = %e, "Scheduled backup failed"),
    }
}
