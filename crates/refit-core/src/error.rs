//! Error types and error kinds for refit.
//!
//! This module provides a unified error type (`RefitError`) that bridges
//! the domain errors from rule validation and rule file loading into one
//! type suitable for both the text output and the JSON report.
//!
//! ## Error Kinds
//!
//! Every error falls into one of these kinds, which appear in JSON output:
//! - `input_error`: bad arguments, invalid rule definitions or rule files
//! - `resource_access_error`: a location could not be read or written
//! - `rule_application_error`: applying the rules to a location panicked
//! - `internal_error`: bugs, unexpected state
//!
//! All kinds end the process with exit code 1.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ConfigError;

/// Process exit code for every failure.
pub const EXIT_FAILURE: u8 = 1;

// ============================================================================
// Error Kinds
// ============================================================================

/// Error categories reported in JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller (arguments, rule definitions, rule files).
    InputError,
    /// A location could not be read or written.
    ResourceAccessError,
    /// Rule application failed unexpectedly for one location.
    RuleApplicationError,
    /// Bugs, unexpected state.
    InternalError,
}

impl ErrorKind {
    /// Stable string form used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputError => "input_error",
            ErrorKind::ResourceAccessError => "resource_access_error",
            ErrorKind::RuleApplicationError => "rule_application_error",
            ErrorKind::InternalError => "internal_error",
        }
    }

    /// Process exit code for this kind.
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which half of a read-modify-write cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => f.write_str("read"),
            Operation::Write => f.write_str("write"),
        }
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for refit.
#[derive(Debug, Error)]
pub enum RefitError {
    /// Invalid arguments from caller.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The rule set could not be loaded or failed validation.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A location could not be read or written.
    #[error("failed to {operation} {}: {source}", path.display())]
    ResourceAccess {
        path: PathBuf,
        operation: Operation,
        source: io::Error,
    },

    /// Applying the rules to a location panicked.
    #[error("rule application failed for {}: {message}", path.display())]
    RuleApplication { path: PathBuf, message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<&RefitError> for ErrorKind {
    fn from(err: &RefitError) -> Self {
        match err {
            RefitError::InvalidArguments { .. } => ErrorKind::InputError,
            RefitError::Config(_) => ErrorKind::InputError,
            RefitError::ResourceAccess { .. } => ErrorKind::ResourceAccessError,
            RefitError::RuleApplication { .. } => ErrorKind::RuleApplicationError,
            RefitError::Internal { .. } => ErrorKind::InternalError,
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl RefitError {
    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        RefitError::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RefitError::Internal {
            message: message.into(),
        }
    }

    /// Create a read failure for a location.
    pub fn read_failed(path: &Path, source: io::Error) -> Self {
        RefitError::ResourceAccess {
            path: path.to_path_buf(),
            operation: Operation::Read,
            source,
        }
    }

    /// Create a write failure for a location.
    pub fn write_failed(path: &Path, source: io::Error) -> Self {
        RefitError::ResourceAccess {
            path: path.to_path_buf(),
            operation: Operation::Write,
            source,
        }
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
