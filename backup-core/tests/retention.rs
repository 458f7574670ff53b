mod common;

use backup_core::catalog::id::BackupId;
use backup_core::fs::trash::Removal;
use backup_core::{BackupError, RetentionConfig};
use chrono::{DateTime, Duration, Utc};
use common::{entries, FaultyFs, Fixture, SERVER};
use std::io;
use std::path::Path;

fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

/// Write an empty artifact created `age` ago and return its id.
fn artifact_aged(backups_dir: &Path, age: Duration) -> io::Result<String> {
    std::fs::create_dir_all(backups_dir)?;
    let id = BackupId::at(now_millis() - age);
    std::fs::write(backups_dir.join(id.filename()), b"zip")?;
    Ok(id.as_str().to_string())
}

fn policy(max_backups: u32, max_age_days: u32) -> RetentionConfig {
    RetentionConfig {
        max_backups,
        max_age_days,
        ..RetentionConfig::default()
    }
}

#[tokio::test]
async fn test_age_rule_removes_expired() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let fresh = artifact_aged(&fx.backups_dir, Duration::days(1))?;
    artifact_aged(&fx.backups_dir, Duration::days(3))?;
    artifact_aged(&fx.backups_dir, Duration::days(5))?;

    let service = fx.service();
    let report = service.apply_retention(SERVER, &policy(0, 2)).await?;
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 0);

    let remaining: Vec<String> = service.list(SERVER).await?.into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![fresh]);
    Ok(())
}

#[tokio::test]
async fn test_count_rule_keeps_newest() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let mut ids = Vec::new();
    for hours in [1, 2, 3, 4, 5] {
        ids.push(artifact_aged(&fx.backups_dir, Duration::hours(hours))?);
    }

    let service = fx.service();
    let report = service.apply_retention(SERVER, &policy(3, 0)).await?;
    assert_eq!(report.deleted, 2);

    let remaining: Vec<String> = service.list(SERVER).await?.into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, ids[..3].to_vec());
    Ok(())
}

#[tokio::test]
async fn test_zero_limits_delete_nothing() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    artifact_aged(&fx.backups_dir, Duration::days(400))?;
    artifact_aged(&fx.backups_dir, Duration::days(1))?;

    let service = fx.service();
    let report = service.apply_retention(SERVER, &policy(0, 0)).await?;
    assert_eq!(report.deleted, 0);
    assert_eq!(service.list(SERVER).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_batch() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let stuck = artifact_aged(&fx.backups_dir, Duration::days(3))?;
    artifact_aged(&fx.backups_dir, Duration::days(4))?;
    artifact_aged(&fx.backups_dir, Duration::days(5))?;

    // Neither unlink nor move works for one artifact.
    let stuck_name = BackupId::parse(&stuck).unwrap().filename();
    let (unlink_name, rename_name) = (stuck_name.clone(), stuck_name.clone());
    let ops = FaultyFs::new()
        .fail_remove(move |p| p.ends_with(&unlink_name).then_some(io::ErrorKind::PermissionDenied))
        .fail_rename(move |from, _| from.ends_with(&rename_name).then_some(io::ErrorKind::PermissionDenied));

    let service = fx.service_with(ops);
    let report = service.apply_retention(SERVER, &policy(0, 2)).await?;
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failed_ids, vec![stuck.clone()]);

    let remaining: Vec<String> = service.list(SERVER).await?.into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![stuck]);
    Ok(())
}

#[tokio::test]
async fn test_locked_artifact_is_quarantined() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let id = artifact_aged(&fx.backups_dir, Duration::days(1))?;

    let ops = FaultyFs::new().fail_remove(|p| {
        (p.extension().is_some_and(|e| e == "zip")).then_some(io::ErrorKind::PermissionDenied)
    });
    let service = fx.service_with(ops);

    let removal = service.delete(SERVER, &id).await?;
    let Removal::Quarantined(target) = removal else {
        panic!("expected quarantine, got {removal:?}");
    };
    assert!(target.starts_with(fx.backups_dir.join(".trash")));
    assert!(target.exists());
    assert!(service.list(SERVER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_unknown_backup() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let err = fx
        .service()
        .delete(SERVER, "2025-01-15T10-30-00-000-abc123")
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_delete_then_list() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let service = fx.service();
    let created = service.create(SERVER).await?;

    assert_eq!(service.delete(SERVER, &created.backup.id).await?, Removal::Deleted);
    assert!(service.list(SERVER).await?.is_empty());
    assert!(entries(&fx.backups_dir).is_empty());
    Ok(())
}
