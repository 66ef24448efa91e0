//! JSON rule configuration files.
//!
//! A rule file replaces the built-in rule set:
//!
//! ```json
//! {
//!   "structural": [
//!     {
//!       "name": "minimal-foundation",
//!       "start": "const minimalFoundation = {",
//!       "guard": "$schema:",
//!       "end": "notes: { developmentStatus: [] },",
//!       "terminator": "};",
//!       "replacement": "const minimalFoundation = createMinimalFoundation();"
//!     }
//!   ],
//!   "renames": [
//!     { "from": "whatWeAreBuilding", "to": "solutionSpace" }
//!   ]
//! }
//! ```
//!
//! `guard` is optional and `terminator` defaults to `};`. Loaded rules go
//! through the same validation as rules built in code.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{RenameRule, RuleError, RuleSet, StructuralRule};

/// Errors from loading a rule file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read rule file {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The file is not a valid rule document.
    #[error("invalid rule file JSON: {message}")]
    InvalidJson { message: String },

    /// The rules parsed but failed validation.
    #[error("invalid rule configuration: {0}")]
    Rules(#[from] RuleError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Serialized form of a [`RuleSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default)]
    pub structural: Vec<StructuralRule>,
    #[serde(default)]
    pub renames: Vec<RenameRule>,
}

impl RulesConfig {
    /// Parse a rule document from JSON text.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidJson {
            message: e.to_string(),
        })
    }

    /// Read and parse a rule document.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Validate into a rule set.
    pub fn into_rule_set(self) -> ConfigResult<RuleSet> {
        Ok(RuleSet::new(self.structural, self.renames)?)
    }

    /// Pretty JSON form of this document.
    pub fn to_json_pretty(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidJson {
            message: e.to_string(),
        })
    }
}

impl From<&RuleSet> for RulesConfig {
    /// Renames come out in application order, not declaration order.
    fn from(rules: &RuleSet) -> Self {
        RulesConfig {
            structural: rules.structural_rules().cloned().collect(),
            renames: rules.renames().to_vec(),
        }
    }
}

/// Load a rule set from a file, or fall back to the built-in rules.
pub fn load_rule_set(path: Option<&Path>) -> ConfigResult<RuleSet> {
    match path {
        Some(path) => RulesConfig::load(path)?.into_rule_set(),
        None => Ok(RuleSet::foundation_v2()?),
    }
}

// ============================================================================
// Tests
// ============================================================================
