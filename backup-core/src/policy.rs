//! Retention and scheduling policy, and its normalization from loose input.

use crate::utils::errors::PolicyError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetentionConfig {
    /// Gates the scheduler only; retention evaluation ignores it
    pub enabled: bool,

    /// Minutes between scheduled backups (0 = no schedule)
    pub interval_minutes: u32,

    /// Newest backups to keep (0 = no count limit)
    pub max_backups: u32,

    /// Days before a backup expires (0 = no age limit)
    pub max_age_days: u32,

    /// Read by the container lifecycle, not by this crate
    pub on_server_start: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 60,
            max_backups: 10,
            max_age_days: 7,
            on_server_start: true,
        }
    }
}

impl RetentionConfig {
    /// Whether this policy asks for a repeating backup timer.
    pub fn is_scheduled(&self) -> bool {
        self.enabled && self.interval_minutes > 0
    }
}

/// Fill `base` with the fields present in `partial` and validate the result.
///
/// `partial` is loosely typed (it comes straight from a request body or a
/// config file); a missing or non-object value means "no overrides". Fields
/// are checked in a fixed order and the first violation is reported. A
/// disabled policy always comes back with `interval_minutes == 0`.
pub fn normalize(partial: Option<&Value>, base: &RetentionConfig) -> Result<RetentionConfig, PolicyError> {
    let empty = Map::new();
    let fields = partial.and_then(Value::as_object).unwrap_or(&empty);

    let enabled = bool_field(fields, "enabled", base.enabled)?;
    let on_server_start = bool_field(fields, "onServerStart", base.on_server_start)?;
    let interval_minutes = count_field(fields, "intervalMinutes", base.interval_minutes)?;
    let max_backups = count_field(fields, "maxBackups", base.max_backups)?;
    let max_age_days = count_field(fields, "maxAgeDays", base.max_age_days)?;

    if enabled && interval_minutes < 1 {
        return Err(PolicyError {
            field: "intervalMinutes",
            reason: "must be at least 1 when backups are enabled",
        });
    }

    Ok(RetentionConfig {
        enabled,
        interval_minutes: if enabled { interval_minutes } else { 0 },
        max_backups,
        max_age_days,
        on_server_start,
    })
}

fn bool_field(fields: &Map<String, Value>, field: &'static str, default: bool) -> Result<bool, PolicyError> {
    match fields.get(field) {
        None => Ok(default),
        Some(value) => value.as_bool().ok_or(PolicyError {
            field,
            reason: "must be a boolean",
        }),
    }
}

fn count_field(fields: &Map<String, Value>, field: &'static str, default: u32) -> Result<u32, PolicyError> {
    let Some(value) = fields.get(field) else {
        return Ok(default);
    };
    as_count(value).ok_or(PolicyError {
        field,
        reason: "must be a non-negative integer",
    })
}

/// Integral, non-negative JSON numbers; `12.0` counts, `0.1` does not.
fn as_count(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}
