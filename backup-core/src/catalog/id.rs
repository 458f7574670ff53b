//! Backup identifiers and their artifact filenames.
//!
//! An id is the UTC creation instant rendered filesystem-safe:
//! `YYYY-MM-DDTHH-mm-ss-mmm-rrrrrr` (milliseconds plus a random suffix).
//! Ids without the `-mmm-rrrrrr` tail are the legacy grammar; they are still
//! recognized but never generated.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;

const FILENAME_PREFIX: &str = "backup-";
const FILENAME_SUFFIX: &str = ".zip";
const SECONDS_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";
/// Byte layout of the seconds part; `d` is an ASCII digit.
const SECONDS_SHAPE: &[u8; 19] = b"dddd-dd-ddTdd-dd-dd";
const RANDOM_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackupId {
    raw: String,
    created_at: DateTime<Utc>,
}

impl BackupId {
    /// A fresh id for the current instant.
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    /// A fresh id for `instant`, truncated to whole milliseconds.
    pub fn at(instant: DateTime<Utc>) -> Self {
        let created_at =
            DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant);
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let raw = format!(
            "{}-{:03}-{}",
            created_at.format(SECONDS_FORMAT),
            created_at.timestamp_subsec_millis(),
            &suffix[..RANDOM_LEN]
        );
        Self { raw, created_at }
    }

    /// Parse an id in either the modern or the legacy grammar.
    pub fn parse(raw: &str) -> Option<Self> {
        let split = SECONDS_SHAPE.len();
        let (Some(seconds), Some(tail)) = (raw.get(..split), raw.get(split..)) else {
            return None;
        };
        if !matches_shape(seconds.as_bytes()) {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(seconds, SECONDS_FORMAT).ok()?;

        let millis = if tail.is_empty() {
            0
        } else {
            parse_modern_tail(tail)?
        };

        let created_at = naive.and_utc() + chrono::Duration::milliseconds(millis);
        Some(Self {
            raw: raw.to_string(),
            created_at,
        })
    }

    /// Recognize an artifact filename. Anything else is not a backup.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let inner = filename
            .strip_prefix(FILENAME_PREFIX)?
            .strip_suffix(FILENAME_SUFFIX)?;
        Self::parse(inner)
    }

    pub fn filename(&self) -> String {
        artifact_name(&self.raw)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_legacy(&self) -> bool {
        self.raw.len() == SECONDS_SHAPE.len()
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Filename of the artifact for a (not necessarily valid) id string.
pub fn artifact_name(id: &str) -> String {
    format!("{FILENAME_PREFIX}{id}{FILENAME_SUFFIX}")
}

fn matches_shape(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .zip(SECONDS_SHAPE.iter())
        .all(|(b, shape)| match shape {
            b'd' => b.is_ascii_digit(),
            other => b == other,
        })
}

/// `-mmm-rrrrrr`, returning the milliseconds.
fn parse_modern_tail(tail: &str) -> Option<i64> {
    let rest = tail.strip_prefix('-')?;
    let (millis, random) = rest.split_once('-')?;
    if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if random.len() != RANDOM_LEN
        || !random
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
    {
        return None;
    }
    millis.parse().ok()
}
