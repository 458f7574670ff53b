//! Age and count based expiry of backups.

use crate::catalog::BackupRecord;
use crate::fs::layout::ServerLayout;
use crate::fs::ops::FsOps;
use crate::fs::trash::{remove_artifact, Removal};
use crate::policy::RetentionConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Records selected for deletion, split by the rule that selected them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Older than `max_age_days`
    pub expired: Vec<BackupRecord>,
    /// Beyond the newest `max_backups` of the records that were not expired
    pub excess: Vec<BackupRecord>,
}

impl RetentionPlan {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.excess.is_empty()
    }

    pub fn len(&self) -> usize {
        self.expired.len() + self.excess.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &BackupRecord> {
        self.expired.iter().chain(self.excess.iter())
    }
}

/// Outcome of applying a plan. Individual failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    pub deleted: usize,
    /// Counted in `deleted` as well; these went to the trash instead of being unlinked
    pub quarantined: usize,
    pub failed: usize,
    pub failed_ids: Vec<String>,
}

/// Select what `policy` removes from `records` (newest first) at `now`.
///
/// Both rules run independently: a zero `max_backups` never disables the
/// age rule, and a zero `max_age_days` never disables the count rule.
pub fn evaluate(records: &[BackupRecord], policy: &RetentionConfig, now: DateTime<Utc>) -> RetentionPlan {
    let (expired, remaining): (Vec<_>, Vec<_>) = if policy.max_age_days > 0 {
        let max_age = Duration::days(i64::from(policy.max_age_days));
        records
            .iter()
            .cloned()
            .partition(|r| now.signed_duration_since(r.created_at) > max_age)
    } else {
        (Vec::new(), records.to_vec())
    };

    let excess = if policy.max_backups > 0 {
        remaining
            .into_iter()
            .skip(policy.max_backups as usize)
            .collect()
    } else {
        Vec::new()
    };

    RetentionPlan { expired, excess }
}

/// Remove every record of `plan`, one at a time.
pub async fn apply(plan: &RetentionPlan, layout: &ServerLayout, ops: &dyn FsOps) -> RetentionReport {
    let server_id = layout.server_id();
    if !plan.expired.is_empty() {
        info!(server_id, count = plan.expired.len(), "Found expired backups");
    }
    if !plan.excess.is_empty() {
        info!(server_id, count = plan.excess.len(), "Found backups over the count limit");
    }

    let backups_dir = layout.backups_dir();
    let trash_dir = layout.trash_dir();
    let mut report = RetentionReport::default();

    for record in plan.records() {
        let age_days = Utc::now().signed_duration_since(record.created_at).num_days();
        info!(server_id, backup = %record.filename, age_days, "Deleting old backup");

        match remove_artifact(ops, &backups_dir.join(&record.filename), &trash_dir).await {
            Ok(removal) => {
                report.deleted += 1;
                if matches!(removal, Removal::Quarantined(_)) {
                    report.quarantined += 1;
                }
            }
            Err(e) => {
                warn!(server_id, backup = %record.filename, error = %e, "Failed to delete old backup");
                report.failed += 1;
                report.failed_ids.push(record.id.clone());
            }
        }
    }

    info!(
        server_id,
        deleted = report.deleted,
        failed = report.failed,
        "Retention cleanup completed"
    );
    report
}
