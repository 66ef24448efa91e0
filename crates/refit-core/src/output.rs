//! JSON output types for `--format json`.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, result order)
//! 3. **Absent means not applicable:** success fields are omitted on failure
//!    and vice versa
//! 4. **Versioned:** Schema version in every response

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::RefitError;
use crate::migrate::{MigrationResult, MigrationStatus};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Error information for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error kind (see `ErrorKind::as_str`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &RefitError) -> Self {
        ErrorInfo {
            kind: err.kind().as_str().to_string(),
            message: err.to_string(),
        }
    }
}

/// One location in a migration report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReport {
    /// "success" or "failure".
    pub status: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural_matches: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renames_applied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl From<&MigrationResult> for LocationReport {
    fn from(result: &MigrationResult) -> Self {
        let location = result.location.display().to_string();
        match &result.status {
            MigrationStatus::Success(outcome) => LocationReport {
                status: "success".to_string(),
                location,
                changed: Some(outcome.changed),
                written: Some(outcome.written),
                structural_matches: Some(outcome.structural_matches),
                renames_applied: Some(outcome.renames_applied),
                content_hash: Some(outcome.content_hash.0.clone()),
                error: None,
            },
            MigrationStatus::Failure(err) => LocationReport {
                status: "failure".to_string(),
                location,
                changed: None,
                written: None,
                structural_matches: None,
                renames_applied: None,
                content_hash: None,
                error: Some(ErrorInfo::from_error(err)),
            },
        }
    }
}

/// Response for a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// "ok" when every processed location succeeded, otherwise "error".
    pub status: String,
    pub schema_version: String,
    pub dry_run: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<LocationReport>,
}

impl MigrationReport {
    pub fn new(results: &[MigrationResult], dry_run: bool) -> Self {
        let results: Vec<LocationReport> = results.iter().map(LocationReport::from).collect();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        MigrationReport {
            status: if failed == 0 { "ok" } else { "error" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            dry_run,
            succeeded: results.len() - failed,
            failed,
            results,
        }
    }
}

/// Response for an error that prevented the run from starting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &RefitError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::MigrationOutcome;
    use crate::types::ContentHash;
    use std::path::{Path, PathBuf};

    fn success(path: &str) -> MigrationResult {
        MigrationResult {
            location: PathBuf::from(path),
            status: MigrationStatus::Success(MigrationOutcome {
                changed: true,
                written: true,
                structural_matches: 1,
                renames_applied: 2,
                content_hash: ContentHash::compute(b"x"),
            }),
        }
    }

    fn failure(path: &str) -> MigrationResult {
        MigrationResult {
            location: PathBuf::from(path),
            status: MigrationStatus::Failure(RefitError::read_failed(
                Path::new(path),
                io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            )),
        }
    }

    #[test]
    fn report_counts_outcomes() {
        let report = MigrationReport::new(&[success("a.ts"), failure("b.ts")], false);
        assert_eq!(report.status, "error");
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[1].status, "failure");
        assert_eq!(
            report.results[1].error.as_ref().unwrap().kind,
            "resource_access_error"
        );
    }

    #[test]
    fn empty_report_is_ok() {
        let report = MigrationReport::new(&[], false);
        assert_eq!(report.status, "ok");
        assert!(report.results.is_empty());
    }

    #[test]
    fn success_omits_error_field() {
        let report = MigrationReport::new(&[success("a.ts")], true);
        let mut output = Vec::new();
        emit_response(&report, &mut output).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["results"][0]["renames_applied"], 2);
        assert!(json["results"][0].get("error").is_none());
    }

    #[test]
    fn failure_omits_outcome_fields() {
        let report = LocationReport::from(&failure("b.ts"));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("changed").is_none());
        assert!(json.get("content_hash").is_none());
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("failed to read b.ts"));
    }

    #[test]
    fn status_is_first_field() {
        let response = ErrorResponse::from_error(&RefitError::invalid_args("no locations"));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with(r#"{"status":"error""#));
    }
}
