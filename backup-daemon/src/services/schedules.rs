use backup_core::config::ServerEntry;
use backup_core::{BackupService, Config, RetentionConfig, Scheduler};

/// Normalized policy for `server_id`: its `backup` table over `[defaults.backup]`.
/// Servers missing from the config get the defaults unchanged.
pub fn server_policy(service: &BackupService, config: &Config, server_id: &str) -> backup_core::Result<RetentionConfig> {
    let partial = config.server(server_id).and_then(|s| s.backup.as_ref());
    service.normalize_policy(partial, Some(&config.defaults.backup))
}

/// Start a timer for every configured server whose policy is valid and enabled.
pub fn init_schedules(scheduler: &Scheduler, service: &BackupService, config: &Config) -> usize {
    let mut count = 0;
    for ServerEntry { id, .. } in &config.servers {
        let policy = match server_policy(service, config, id) {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!(server_id = %id, error = %e, "Skipping schedule: invalid backup config");
                continue;
            }
        };
        if scheduler.start(id, policy) {
            count += 1;
        }
    }
    tracing::info!("Initialized {} backup schedules", count);
    count
}

/// Clear crash leftovers for every configured server.
pub async fn sweep_all(service: &BackupService, config: &Config) {
    for entry in &config.servers {
        match service.sweep_stale(&entry.id).await {
            Ok(report) if report.removed_tmp + report.removed_staging > 0 => tracing::info!(
                server_id = %entry.id,
                removed_tmp = report.removed_tmp,
                removed_staging = report.removed_staging,
                "Removed stale backup files"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(server_id = %entry.id, error = %e, "Stale file sweep failed"),
        }
    }
}
