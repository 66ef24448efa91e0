//! refit - fixture schema migration and work-unit test dispatch.
//!
//! This crate provides the two binaries and the logic behind them.
//!
//! ## Modules
//!
//! - `cli` - Batch driver for `migrate-fixtures` (failure policy, output)
//! - `hook` - Test dispatch for `run-unit-tests`
//! - `logging` - Tracing setup shared by both binaries

pub mod cli;
pub mod hook;
pub mod logging;

// Re-export core types for convenience
pub use refit_core::config::{load_rule_set, RulesConfig};
pub use refit_core::error::{ErrorKind, RefitError, EXIT_FAILURE};
pub use refit_core::migrate::{MigrateOptions, MigrationResult, Migrator};
pub use refit_core::output::{MigrationReport, SCHEMA_VERSION};
pub use refit_core::rules::{RenameRule, RuleSet, StructuralRule};
