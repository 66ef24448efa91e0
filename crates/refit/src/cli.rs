//! Batch driver for `migrate-fixtures`.
//!
//! The engine (`Migrator`) tolerates per-file failures and can always finish
//! the batch. This layer decides what a failure means for the run:
//!
//! - `fail-fast` (default): report the first failure and stop; later files
//!   are left untouched.
//! - `collect-all`: process every file and report all failures.
//!
//! Either way the exit status is 0 only when every processed file succeeded.
//!
//! ## Output
//!
//! Text format prints `Fixed <file>` on stdout for each success and
//! `Error fixing <file>: <detail>` on stderr for each failure. JSON format
//! prints one `MigrationReport` on stdout after the run.

use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::Path;

use clap::ValueEnum;
use refit_core::config::RulesConfig;
use refit_core::error::{RefitError, EXIT_FAILURE};
use refit_core::migrate::{MigrationResult, MigrationStatus, Migrator};
use refit_core::output::{emit_response, ErrorResponse, MigrationReport};
use refit_core::rules::RuleSet;

/// Usage line printed when no files are given.
pub const USAGE: &str = "Usage: migrate-fixtures <file1> [file2] [file3] ...";

/// What a failed file means for the rest of the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Stop at the first failure.
    #[default]
    FailFast,
    /// Process every file, then report.
    CollectAll,
}

/// Output format for migration results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One status line per file (default).
    #[default]
    Text,
    /// A single JSON report.
    Json,
}

/// Driver settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverOptions {
    pub policy: FailurePolicy,
    pub format: OutputFormat,
}

/// Run a migration batch and report results.
///
/// Returns the process exit status. An empty batch succeeds with 0.
pub fn run_migrate<P: AsRef<Path>>(
    migrator: &Migrator,
    locations: &[P],
    options: DriverOptions,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<u8> {
    let mut write_error: Option<io::Error> = None;

    let results = migrator.migrate_each(locations, |result| {
        if options.format == OutputFormat::Text {
            if let Err(e) = report_line(result, out, err) {
                write_error = Some(e);
                return ControlFlow::Break(());
            }
        }
        if !result.is_success() && options.policy == FailurePolicy::FailFast {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    if let Some(e) = write_error {
        return Err(e);
    }

    if options.format == OutputFormat::Json {
        let report = MigrationReport::new(&results, migrator.options().dry_run);
        emit_response(&report, out)?;
    }
    out.flush()?;

    Ok(exit_status(&results))
}

/// 0 when every result succeeded, 1 otherwise.
pub fn exit_status(results: &[MigrationResult]) -> u8 {
    if results.iter().all(MigrationResult::is_success) {
        0
    } else {
        EXIT_FAILURE
    }
}

fn report_line(
    result: &MigrationResult,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    match &result.status {
        MigrationStatus::Success(_) => writeln!(out, "Fixed {}", result.location.display()),
        MigrationStatus::Failure(e) => {
            writeln!(err, "Error fixing {}: {}", result.location.display(), e)
        }
    }
}

/// Print the effective rule set as a JSON rule document.
pub fn print_rules(rules: &RuleSet, out: &mut impl Write) -> Result<(), RefitError> {
    let json = RulesConfig::from(rules).to_json_pretty()?;
    writeln!(out, "{}", json)
        .map_err(|e| RefitError::internal(format!("failed to write rules: {}", e)))
}

/// Report an error that stopped the run before any file was processed.
pub fn report_error(
    error: &RefitError,
    format: OutputFormat,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => writeln!(err, "error: {}", error),
        OutputFormat::Json => emit_response(&ErrorResponse::from_error(error), out),
    }
}

// ============================================================================
// Tests
// ============================================================================
