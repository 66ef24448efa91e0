//! The fixture migration engine.
//!
//! A [`Migrator`] owns a validated [`RuleSet`] and rewrites locations (files)
//! one at a time: read the whole file, apply the structural rules then the
//! renames, write the result back over the original. Each location is
//! independent. A failure is recorded in that location's
//! [`MigrationResult`] and never stops the batch; batch policy (fail-fast or
//! collect-all) belongs to the caller, via [`Migrator::migrate_each`].
//!
//! Successfully read files are always written back, even when the rules
//! changed nothing. Rules are idempotent, so a second run leaves the bytes
//! identical.

use std::any::Any;
use std::fs;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RefitError;
use crate::rules::{Rewrite, RuleSet};
use crate::types::ContentHash;

// ============================================================================
// Results
// ============================================================================

/// What happened to a location that migrated successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// The rules changed the text.
    pub changed: bool,
    /// The text was written back (false in dry-run mode).
    pub written: bool,
    pub structural_matches: usize,
    pub renames_applied: usize,
    /// Hash of the final text.
    pub content_hash: ContentHash,
}

/// Per-location status.
#[derive(Debug)]
pub enum MigrationStatus {
    Success(MigrationOutcome),
    Failure(RefitError),
}

/// Outcome for one location, in input order.
#[derive(Debug)]
pub struct MigrationResult {
    pub location: PathBuf,
    pub status: MigrationStatus,
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, MigrationStatus::Success(_))
    }

    pub fn outcome(&self) -> Option<&MigrationOutcome> {
        match &self.status {
            MigrationStatus::Success(outcome) => Some(outcome),
            MigrationStatus::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RefitError> {
        match &self.status {
            MigrationStatus::Success(_) => None,
            MigrationStatus::Failure(err) => Some(err),
        }
    }
}

// ============================================================================
// Migrator
// ============================================================================

/// Engine options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Compute results without writing files.
    pub dry_run: bool,
}

/// Applies a rule set to locations.
#[derive(Debug, Clone)]
pub struct Migrator {
    rules: RuleSet,
    options: MigrateOptions,
}

impl Migrator {
    pub fn new(rules: RuleSet) -> Self {
        Migrator {
            rules,
            options: MigrateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MigrateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> MigrateOptions {
        self.options
    }

    /// Rewrite text without touching the filesystem.
    pub fn migrate_text(&self, text: &str) -> Rewrite {
        self.rules.apply(text)
    }

    /// Migrate every location, in order.
    pub fn migrate<P: AsRef<Path>>(&self, locations: &[P]) -> Vec<MigrationResult> {
        self.migrate_each(locations, |_| ControlFlow::Continue(()))
    }

    /// Migrate locations in order, calling `on_result` after each one.
    ///
    /// Returning `ControlFlow::Break` from the callback stops the batch;
    /// remaining locations are neither read nor written and have no result.
    pub fn migrate_each<P, F>(&self, locations: &[P], mut on_result: F) -> Vec<MigrationResult>
    where
        P: AsRef<Path>,
        F: FnMut(&MigrationResult) -> ControlFlow<()>,
    {
        let mut results = Vec::with_capacity(locations.len());
        for location in locations {
            let result = self.migrate_location(location.as_ref());
            let flow = on_result(&result);
            results.push(result);
            if flow.is_break() {
                debug!(
                    processed = results.len(),
                    total = locations.len(),
                    "migration stopped by caller"
                );
                break;
            }
        }
        results
    }

    /// Migrate a single location.
    pub fn migrate_location(&self, location: &Path) -> MigrationResult {
        self.migrate_location_with(location, |text| self.migrate_text(text))
    }

    fn migrate_location_with<F>(&self, location: &Path, transform: F) -> MigrationResult
    where
        F: Fn(&str) -> Rewrite,
    {
        let status = match self.rewrite_location(location, transform) {
            Ok(outcome) => {
                info!(
                    location = %location.display(),
                    changed = outcome.changed,
                    structural_matches = outcome.structural_matches,
                    renames_applied = outcome.renames_applied,
                    "location migrated"
                );
                MigrationStatus::Success(outcome)
            }
            Err(err) => {
                info!(location = %location.display(), error = %err, "location failed");
                MigrationStatus::Failure(err)
            }
        };
        MigrationResult {
            location: location.to_path_buf(),
            status,
        }
    }

    fn rewrite_location<F>(
        &self,
        location: &Path,
        transform: F,
    ) -> Result<MigrationOutcome, RefitError>
    where
        F: Fn(&str) -> Rewrite,
    {
        let original =
            fs::read_to_string(location).map_err(|e| RefitError::read_failed(location, e))?;

        let rewrite = panic::catch_unwind(AssertUnwindSafe(|| transform(&original)))
            .map_err(|payload| RefitError::RuleApplication {
                path: location.to_path_buf(),
                message: panic_message(payload.as_ref()),
            })?;

        if rewrite.structural_matches == 0 && !self.rules.is_empty() {
            debug!(location = %location.display(), "no structural rule matched");
        }

        let written = !self.options.dry_run;
        if written {
            fs::write(location, &rewrite.text).map_err(|e| RefitError::write_failed(location, e))?;
        }

        Ok(MigrationOutcome {
            changed: rewrite.text != original,
            written,
            structural_matches: rewrite.structural_matches,
            renames_applied: rewrite.renames_applied,
            content_hash: ContentHash::compute(rewrite.text.as_bytes()),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
