//! Rewrite rules and validated rule sets.
//!
//! Two kinds of rules drive a migration:
//!
//! - [`StructuralRule`] replaces a whole multi-line object literal. The
//!   literal is bounded by literal anchors only: a `start` token, an
//!   optional `guard` that must appear before the first closing brace, a
//!   distinctive `end` field assignment, and a `terminator`. Matching is
//!   non-greedy from `start` to the first `end` + `terminator` pair. There
//!   is no brace counting, so anchors must be unique enough to never cross
//!   into an adjacent literal.
//! - [`RenameRule`] replaces a literal substring everywhere.
//!
//! A [`RuleSet`] validates rules once, at construction. Ambiguous or
//! non-idempotent rules are rejected there rather than discovered while
//! rewriting files.

use std::cmp::Reverse;

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Terminator used when a structural rule does not name one.
pub const DEFAULT_TERMINATOR: &str = "};";

// ============================================================================
// Error Types
// ============================================================================

/// Rule validation errors, raised when a rule set is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A required anchor is empty.
    #[error("rule '{rule}' has an empty {anchor} anchor")]
    EmptyAnchor { rule: String, anchor: &'static str },

    /// Two structural rules share a start anchor.
    #[error("rules '{rule}' and '{other}' share the start anchor '{start}'")]
    DuplicateStart {
        rule: String,
        other: String,
        start: String,
    },

    /// Start and end anchors contain one another.
    #[error("rule '{rule}' has start and end anchors that contain one another")]
    OverlappingAnchors { rule: String },

    /// The replacement would start a structural match on a second run.
    #[error("replacement of rule '{rule}' contains the start anchor of rule '{other}'")]
    ReplacementMatchesStart { rule: String, other: String },

    /// A rename has an empty `from` string.
    #[error("rename rule has an empty source string")]
    EmptyRenameKey,

    /// Two renames share a `from` string.
    #[error("duplicate rename for '{from}'")]
    DuplicateRename { from: String },

    /// A rename's output contains, or joins with surrounding text into, a
    /// rename key, so re-running would rewrite again.
    #[error("rename '{from}' -> '{to}' can produce text containing rename key '{key}'")]
    RenameNotIdempotent {
        from: String,
        to: String,
        key: String,
    },

    /// A rename's output contains an anchor of a structural rule.
    #[error("rename '{from}' -> '{to}' produces an anchor of rule '{rule}'")]
    RenameCreatesAnchor {
        from: String,
        to: String,
        rule: String,
    },

    /// The compiled matcher was rejected by the regex engine.
    #[error("rule '{rule}' failed to compile: {message}")]
    InvalidPattern { rule: String, message: String },
}

/// Result type for rule operations.
pub type RuleResult<T> = Result<T, RuleError>;

// ============================================================================
// Rule Types
// ============================================================================

fn default_terminator() -> String {
    DEFAULT_TERMINATOR.to_string()
}

/// Replaces an entire object literal bounded by literal anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralRule {
    /// Name used in diagnostics and logs.
    pub name: String,
    /// Opening text of the construct, e.g. `const minimalFoundation = {`.
    pub start: String,
    /// Literal that must appear before the first `}` after `start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    /// Terminal field assignment inside the construct.
    pub end: String,
    /// Closing text, separated from `end` by optional whitespace.
    #[serde(default = "default_terminator")]
    pub terminator: String,
    /// Fixed text substituted for every match.
    pub replacement: String,
}

impl StructuralRule {
    /// Create a rule with no guard and the default terminator.
    pub fn new(
        name: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        StructuralRule {
            name: name.into(),
            start: start.into(),
            guard: None,
            end: end.into(),
            terminator: default_terminator(),
            replacement: replacement.into(),
        }
    }

    /// Require `guard` to appear before the first closing brace.
    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Override the closing text.
    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    /// Regex source for this rule. Built only from escaped literals.
    pub fn pattern(&self) -> String {
        let mut pattern = String::from("(?s)");
        pattern.push_str(&regex::escape(&self.start));
        if let Some(guard) = &self.guard {
            pattern.push_str("[^}]*?");
            pattern.push_str(&regex::escape(guard));
        }
        pattern.push_str(".*?");
        pattern.push_str(&regex::escape(&self.end));
        pattern.push_str(r"\s*");
        pattern.push_str(&regex::escape(&self.terminator));
        pattern
    }

    fn validate(&self) -> RuleResult<()> {
        let empty = |anchor: &'static str| RuleError::EmptyAnchor {
            rule: self.name.clone(),
            anchor,
        };
        if self.start.is_empty() {
            return Err(empty("start"));
        }
        if self.end.is_empty() {
            return Err(empty("end"));
        }
        if self.terminator.is_empty() {
            return Err(empty("terminator"));
        }
        if self.guard.as_deref() == Some("") {
            return Err(empty("guard"));
        }
        if self.start.contains(&self.end) || self.end.contains(&self.start) {
            return Err(RuleError::OverlappingAnchors {
                rule: self.name.clone(),
            });
        }
        Ok(())
    }

    fn anchors(&self) -> impl Iterator<Item = &str> {
        [Some(self.start.as_str()), self.guard.as_deref(), Some(self.end.as_str())]
            .into_iter()
            .flatten()
    }
}

/// Replaces a literal substring everywhere it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRule {
    pub from: String,
    pub to: String,
}

impl RenameRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        RenameRule {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// A structural rule with its compiled matcher.
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: StructuralRule,
    matcher: Regex,
}

// ============================================================================
// Rule Set
// ============================================================================

/// Ordered, validated rule configuration for a migration run.
///
/// Structural rules keep their declared order. Renames are sorted
/// most-specific-first (longest `from` first, ties in declared order) so a
/// general rename never pre-empts a more specific one sharing its prefix.
#[derive(Debug, Clone)]
pub struct RuleSet {
    structural: Vec<CompiledRule>,
    renames: Vec<RenameRule>,
}

/// Text produced by applying a rule set, with replacement counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    /// Structural matches replaced, across all structural rules.
    pub structural_matches: usize,
    /// Rename occurrences replaced, across all renames.
    pub renames_applied: usize,
}

impl RuleSet {
    /// Validate and compile a rule set.
    pub fn new(structural: Vec<StructuralRule>, renames: Vec<RenameRule>) -> RuleResult<Self> {
        let mut compiled: Vec<CompiledRule> = Vec::with_capacity(structural.len());
        for rule in structural {
            rule.validate()?;
            if let Some(existing) = compiled.iter().find(|c| c.rule.start == rule.start) {
                return Err(RuleError::DuplicateStart {
                    rule: rule.name.clone(),
                    other: existing.rule.name.clone(),
                    start: rule.start.clone(),
                });
            }
            let matcher = Regex::new(&rule.pattern()).map_err(|e| RuleError::InvalidPattern {
                rule: rule.name.clone(),
                message: e.to_string(),
            })?;
            compiled.push(CompiledRule { rule, matcher });
        }

        // No replacement may contain any rule's start, earlier or later.
        for compiled_rule in &compiled {
            let rule = &compiled_rule.rule;
            if let Some(other) = compiled
                .iter()
                .find(|c| rule.replacement.contains(&c.rule.start))
            {
                return Err(RuleError::ReplacementMatchesStart {
                    rule: rule.name.clone(),
                    other: other.rule.name.clone(),
                });
            }
        }

        let renames = order_renames(renames)?;
        for rename in &renames {
            if let Some(rule) = compiled
                .iter()
                .find(|c| c.rule.anchors().any(|anchor| rename.to.contains(anchor)))
            {
                return Err(RuleError::RenameCreatesAnchor {
                    from: rename.from.clone(),
                    to: rename.to.clone(),
                    rule: rule.rule.name.clone(),
                });
            }
        }

        Ok(RuleSet {
            structural: compiled,
            renames,
        })
    }

    /// A rule set that changes nothing.
    pub fn empty() -> Self {
        RuleSet {
            structural: Vec::new(),
            renames: Vec::new(),
        }
    }

    /// Built-in rules for the foundation schema v2 migration.
    ///
    /// Old foundation fixtures become calls to `createMinimalFoundation()`,
    /// and `whatWeAreBuilding` / `whyWeAreBuildingIt` field paths move to
    /// `solutionSpace` / `problemSpace`.
    pub fn foundation_v2() -> RuleResult<Self> {
        const SCHEMA_GUARD: &str = "$schema:";
        const NOTES_END: &str = "notes: { developmentStatus: [] },";

        RuleSet::new(
            vec![
                StructuralRule::new(
                    "minimal-foundation",
                    "const minimalFoundation = {",
                    NOTES_END,
                    "const minimalFoundation = createMinimalFoundation();",
                )
                .with_guard(SCHEMA_GUARD),
                StructuralRule::new(
                    "foundation-data",
                    "const foundationData = {",
                    NOTES_END,
                    "const foundationData = createMinimalFoundation();",
                )
                .with_guard(SCHEMA_GUARD),
            ],
            vec![
                RenameRule::new("whatWeAreBuilding.projectOverview", "solutionSpace.overview"),
                RenameRule::new(
                    "whyWeAreBuildingIt.problemDefinition.primary.description",
                    "problemSpace.primaryProblem.description",
                ),
                RenameRule::new("whatWeAreBuilding", "solutionSpace"),
                RenameRule::new("whyWeAreBuildingIt", "problemSpace"),
            ],
        )
    }

    /// Structural rules in application order.
    pub fn structural_rules(&self) -> impl Iterator<Item = &StructuralRule> {
        self.structural.iter().map(|c| &c.rule)
    }

    /// Renames in application order (most specific first).
    pub fn renames(&self) -> &[RenameRule] {
        &self.renames
    }

    pub fn is_empty(&self) -> bool {
        self.structural.is_empty() && self.renames.is_empty()
    }

    /// Apply every structural rule, then every rename, to `text`.
    pub fn apply(&self, text: &str) -> Rewrite {
        let mut current = text.to_string();
        let mut structural_matches = 0;

        for compiled in &self.structural {
            let count = compiled.matcher.find_iter(&current).count();
            debug!(rule = %compiled.rule.name, matches = count, "structural rule applied");
            if count > 0 {
                current = compiled
                    .matcher
                    .replace_all(&current, NoExpand(&compiled.rule.replacement))
                    .into_owned();
                structural_matches += count;
            }
        }

        let mut renames_applied = 0;
        for rename in &self.renames {
            let count = current.matches(rename.from.as_str()).count();
            if count > 0 {
                debug!(from = %rename.from, to = %rename.to, occurrences = count, "rename applied");
                current = current.replace(&rename.from, &rename.to);
                renames_applied += count;
            }
        }

        Rewrite {
            text: current,
            structural_matches,
            renames_applied,
        }
    }
}

/// Validate renames and sort them longest-key-first.
fn order_renames(mut renames: Vec<RenameRule>) -> RuleResult<Vec<RenameRule>> {
    for (i, rename) in renames.iter().enumerate() {
        if rename.from.is_empty() {
            return Err(RuleError::EmptyRenameKey);
        }
        if renames[..i].iter().any(|r| r.from == rename.from) {
            return Err(RuleError::DuplicateRename {
                from: rename.from.clone(),
            });
        }
    }

    for rename in &renames {
        if let Some(key) = renames.iter().find(|r| rename.to.contains(r.from.as_str())) {
            return Err(RuleError::RenameNotIdempotent {
                from: rename.from.clone(),
                to: rename.to.clone(),
                key: key.from.clone(),
            });
        }
    }

    // Stable sort: equal lengths keep declared order.
    renames.sort_by_key(|r| Reverse(r.from.len()));

    for rename in &renames {
        for key in &renames {
            for input in join_inputs(rename, &key.from) {
                let once = rename_pass(&renames, &input);
                if rename_pass(&renames, &once) != once {
                    return Err(RuleError::RenameNotIdempotent {
                        from: rename.from.clone(),
                        to: rename.to.clone(),
                        key: key.from.clone(),
                    });
                }
            }
        }
    }

    Ok(renames)
}

/// Inputs in which `rename`'s output lands next to, or inside, text that
/// completes `key`.
///
/// Covers the output sitting in the middle of the key, a suffix of the
/// output starting the key, and a prefix of the output ending it.
fn join_inputs(rename: &RenameRule, key: &str) -> Vec<String> {
    let to = rename.to.as_str();
    let mut inputs: Vec<String> = key
        .match_indices(to)
        .map(|(pos, _)| format!("{}{}{}", &key[..pos], rename.from, &key[pos + to.len()..]))
        .collect();

    for split in (1..key.len()).filter(|&i| key.is_char_boundary(i)) {
        let (head, tail) = key.split_at(split);
        if to.ends_with(head) {
            inputs.push(format!("{}{}", rename.from, tail));
        }
        if to.starts_with(tail) {
            inputs.push(format!("{}{}", head, rename.from));
        }
    }
    inputs
}

/// One rename pass in application order, without bookkeeping.
fn rename_pass(renames: &[RenameRule], text: &str) -> String {
    renames
        .iter()
        .fold(text.to_string(), |acc, r| acc.replace(&r.from, &r.to))
}

// ============================================================================
// Tests
// ============================================================================
