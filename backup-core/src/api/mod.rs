//! Result envelope handed to callers outside the crate.

use crate::utils::errors::{BackupError, ErrorCategory};
use serde::Serialize;

/// `{ "success": true, "data": ... }` or
/// `{ "success": false, "error": "...", "category": "..." }`
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

impl<T> Outcome<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            category: None,
        }
    }

    pub fn failed(err: &BackupError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            category: Some(err.category()),
        }
    }
}

impl<T> From<Result<T, BackupError>> for Outcome<T> {
    fn from(result: Result<T, BackupError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let outcome: Outcome<Vec<u32>> = Ok(vec![1, 2]).into();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "success": true, "data": [1, 2] })
        );
    }

    #[test]
    fn test_failure_shape() {
        let outcome: Outcome<()> = Err(BackupError::AlreadyInProgress("alpha".into())).into();
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "success": false,
                "error": "backup already in progress",
                "category": "precondition"
            })
        );
    }
}
