//! Work-unit test dispatch for `run-unit-tests`.
//!
//! The hook receives a JSON context on stdin, takes its `workUnitId`, finds
//! the matching test file and runs the test runner on it.
//!
//! ## Test File Lookup
//!
//! `AUTH-001` becomes the pattern `auth-001` (lowercased, hyphens kept) and
//! is looked up as `<test-dir>/**/__tests__/*auth-001*.test.ts` under the
//! workspace root. Matches are sorted by path and the first one runs.
//!
//! ## Test Command Format
//!
//! Test commands are JSON arrays with template variables:
//! ```json
//! ["npm", "test", "--", "{test_file}"]
//! ```
//!
//! - `{test_file}` - Matched test file, relative to the workspace root
//! - `{work_unit}` - The work unit id as given
//! - `{root}` - Workspace root path
//!
//! ## Exit Codes
//!
//! - Malformed context or missing `workUnitId`: 1
//! - No test file found: 0
//! - Otherwise: the runner's exit code (1 if it was killed by a signal)

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use globset::{GlobBuilder, GlobMatcher};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Directory searched for tests, relative to the workspace root.
pub const DEFAULT_TEST_DIR: &str = "src";

/// Test command used when none is given.
pub const DEFAULT_TEST_COMMAND: &[&str] = &["npm", "test", "--", "{test_file}"];

/// Errors from the test dispatch hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// Stdin was not a JSON object.
    #[error("Failed to parse JSON context: {message}")]
    InvalidContext { message: String },

    /// The context has no usable `workUnitId`.
    #[error("No workUnitId in context")]
    MissingWorkUnit,

    /// Invalid `--test-command` JSON.
    #[error("invalid test command JSON: {message}")]
    InvalidTestCommand { message: String },

    /// The derived glob did not compile.
    #[error("invalid test file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The test runner is not on PATH.
    #[error("test runner '{program}' not found: {message}")]
    RunnerNotFound { program: String, message: String },

    /// The test runner could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    /// IO error writing output.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;

// ============================================================================
// Context
// ============================================================================

/// The work unit named in a hook context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub id: String,
}

impl WorkUnit {
    /// File name fragment for this work unit: lowercased, hyphens kept.
    pub fn test_pattern(&self) -> String {
        self.id.to_lowercase()
    }
}

/// Parse the hook context JSON and extract the work unit.
///
/// Extra fields are ignored.
pub fn parse_context(input: &str) -> HookResult<WorkUnit> {
    let context: Value = serde_json::from_str(input).map_err(|e| HookError::InvalidContext {
        message: e.to_string(),
    })?;
    let object = context
        .as_object()
        .ok_or_else(|| HookError::InvalidContext {
            message: "expected a JSON object".to_string(),
        })?;

    match object.get("workUnitId").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(WorkUnit { id: id.to_string() }),
        _ => Err(HookError::MissingWorkUnit),
    }
}

// ============================================================================
// Test File Lookup
// ============================================================================

/// Escape glob metacharacters so `fragment` matches literally.
fn escape_glob(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        match c {
            '*' | '?' | '[' | ']' | '{' | '}' | '\\' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Glob (relative to the test directory) for a work unit's test files.
pub fn test_file_glob(pattern: &str) -> String {
    format!("**/__tests__/*{}*.test.ts", escape_glob(pattern))
}

fn compile_glob(pattern: &str) -> HookResult<GlobMatcher> {
    let glob = test_file_glob(pattern);
    GlobBuilder::new(&glob)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| HookError::InvalidPattern {
            pattern: glob,
            message: e.to_string(),
        })
}

/// Find test files for `pattern` under `root/test_dir`.
///
/// Returned paths are relative to `root`, sorted. A missing test directory
/// yields no matches.
pub fn find_test_files(root: &Path, test_dir: &Path, pattern: &str) -> HookResult<Vec<PathBuf>> {
    let matcher = compile_glob(pattern)?;
    let search_root = root.join(test_dir);
    if !search_root.is_dir() {
        debug!(dir = %search_root.display(), "test directory does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&search_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Ok(in_test_dir) = path.strip_prefix(&search_root) else {
            continue;
        };
        if matcher.is_match(in_test_dir) {
            files.push(test_dir.join(in_test_dir));
        }
    }

    files.sort();
    Ok(files)
}

// ============================================================================
// Test Command
// ============================================================================

/// Template variables for test command expansion.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub test_file: String,
    pub work_unit: String,
    pub root: String,
}

/// Parse a test command from a JSON array string.
pub fn parse_test_command(json_str: &str) -> HookResult<Vec<String>> {
    let args: Vec<String> =
        serde_json::from_str(json_str).map_err(|e| HookError::InvalidTestCommand {
            message: format!("expected JSON array of strings: {}", e),
        })?;

    if args.is_empty() {
        return Err(HookError::InvalidTestCommand {
            message: "test command array cannot be empty".to_string(),
        });
    }

    Ok(args)
}

/// Expand template variables in a test command.
pub fn expand_template_vars(args: &[String], vars: &TemplateVars) -> Vec<String> {
    args.iter()
        .map(|arg| {
            arg.replace("{test_file}", &vars.test_file)
                .replace("{work_unit}", &vars.work_unit)
                .replace("{root}", &vars.root)
        })
        .collect()
}

/// Resolve the test command from the `--test-command` flag or the default.
pub fn resolve_test_command(cli_test_command: Option<&str>) -> HookResult<Vec<String>> {
    match cli_test_command {
        Some(json_str) => parse_test_command(json_str),
        None => Ok(DEFAULT_TEST_COMMAND.iter().map(|s| s.to_string()).collect()),
    }
}

/// Captured result of a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run an expanded test command in `cwd`, capturing its output.
pub fn run_test_command(args: &[String], cwd: &Path) -> HookResult<RunOutput> {
    let Some((program, rest)) = args.split_first() else {
        return Err(HookError::InvalidTestCommand {
            message: "test command array cannot be empty".to_string(),
        });
    };

    let resolved = which::which(program).map_err(|e| HookError::RunnerNotFound {
        program: program.clone(),
        message: e.to_string(),
    })?;
    debug!(program = %resolved.display(), args = ?rest, "running test command");

    let output = Command::new(&resolved)
        .args(rest)
        .current_dir(cwd)
        .output()
        .map_err(|source| HookError::Spawn {
            program: program.clone(),
            source,
        })?;

    Ok(RunOutput {
        exit_code: output.status.code().unwrap_or(1),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

// ============================================================================
// Hook Entry Point
// ============================================================================

/// Hook settings.
#[derive(Debug, Clone)]
pub struct HookOptions {
    /// Workspace root; test paths and the runner are relative to it.
    pub root: PathBuf,
    /// Test directory under the root.
    pub test_dir: PathBuf,
    /// `--test-command` JSON, if given.
    pub test_command: Option<String>,
}

impl Default for HookOptions {
    fn default() -> Self {
        HookOptions {
            root: PathBuf::from("."),
            test_dir: PathBuf::from(DEFAULT_TEST_DIR),
            test_command: None,
        }
    }
}

/// Run the hook on a context payload. Returns the process exit code.
pub fn run_hook(
    input: &str,
    options: &HookOptions,
    out: &mut impl Write,
    err: &mut impl Write,
) -> HookResult<i32> {
    let unit = parse_context(input)?;
    // Validate the command before searching so a bad flag fails every time.
    let command = resolve_test_command(options.test_command.as_deref())?;

    let files = find_test_files(&options.root, &options.test_dir, &unit.test_pattern())?;
    let Some(test_file) = files.first() else {
        writeln!(out, "No test files found for {}", unit.id)?;
        return Ok(0);
    };
    info!(
        work_unit = %unit.id,
        test_file = %test_file.display(),
        candidates = files.len(),
        "test file selected"
    );

    writeln!(out, "Running tests for {}...", unit.id)?;
    out.flush()?;

    let vars = TemplateVars {
        test_file: test_file.display().to_string(),
        work_unit: unit.id.clone(),
        root: options.root.display().to_string(),
    };
    let args = expand_template_vars(&command, &vars);
    let run = run_test_command(&args, &options.root)?;

    out.write_all(&run.stdout)?;
    out.flush()?;
    err.write_all(&run.stderr)?;
    err.flush()?;

    info!(work_unit = %unit.id, exit_code = run.exit_code, "test run finished");
    Ok(run.exit_code)
}

// ============================================================================
// Tests
// ============================================================================
