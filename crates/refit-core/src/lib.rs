//! Core infrastructure for refit.
//!
//! This crate provides the text migration engine and everything it needs:
//! - Rule types (structural fixture rewrites and literal renames)
//! - Rule set construction, validation, and the built-in rule set
//! - JSON rule configuration files
//! - The per-location migration engine
//! - Error types and error kinds
//! - JSON report types for CLI output

pub mod config;
pub mod error;
pub mod migrate;
pub mod output;
pub mod rules;
pub mod types;
