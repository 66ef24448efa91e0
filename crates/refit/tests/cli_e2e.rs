//! CLI end-to-end tests.
//!
//! These tests spawn the actual binaries and validate stdout, stderr and
//! exit codes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

const OLD_FIXTURE: &str = "const foundationData = { $schema: 'x', notes: { developmentStatus: [] }, };\nexpect(r.whyWeAreBuildingIt.problemDefinition.primary.description).toBe('d');";
const NEW_FIXTURE: &str = "const foundationData = createMinimalFoundation();\nexpect(r.problemSpace.primaryProblem.description).toBe('d');";

/// Run migrate-fixtures with given arguments and return (stdout, stderr, exit_code).
fn run_migrate(args: &[&str], cwd: &Path) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_migrate-fixtures"))
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to execute migrate-fixtures");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run run-unit-tests with `input` on stdin.
fn run_hook(args: &[&str], input: &str, cwd: &Path) -> (String, String, i32) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_run-unit-tests"))
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute run-unit-tests");

    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(input.as_bytes())
        .expect("write context");
    let output = child.wait_with_output().expect("wait for run-unit-tests");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn write_fixture(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, OLD_FIXTURE).unwrap();
    path
}

// ============================================================================
// migrate-fixtures
// ============================================================================

#[test]
fn no_arguments_prints_usage_and_exits_1() {
    let dir = TempDir::new().unwrap();
    let (stdout, stderr, code) = run_migrate(&[], dir.path());

    assert_eq!(code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Usage: migrate-fixtures <file1> [file2] [file3] ..."));
}

#[test]
fn migrates_files_and_prints_fixed() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir, "a.test.ts");
    write_fixture(&dir, "b.test.ts");

    let (stdout, _stderr, code) = run_migrate(&["a.test.ts", "b.test.ts"], dir.path());

    assert_eq!(code, 0);
    assert_eq!(stdout, "Fixed a.test.ts\nFixed b.test.ts\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("a.test.ts")).unwrap(),
        NEW_FIXTURE
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("b.test.ts")).unwrap(),
        NEW_FIXTURE
    );
}

#[test]
fn first_failure_stops_the_run() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir, "a.test.ts");
    write_fixture(&dir, "c.test.ts");

    let (stdout, stderr, code) =
        run_migrate(&["a.test.ts", "missing.test.ts", "c.test.ts"], dir.path());

    assert_eq!(code, 1);
    assert_eq!(stdout, "Fixed a.test.ts\n");
    assert!(stderr.contains("Error fixing missing.test.ts: "));
    assert_eq!(
        fs::read_to_string(dir.path().join("c.test.ts")).unwrap(),
        OLD_FIXTURE
    );
}

#[test]
fn collect_all_finishes_the_batch() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir, "a.test.ts");
    write_fixture(&dir, "c.test.ts");

    let (stdout, stderr, code) = run_migrate(
        &[
            "--on-error",
            "collect-all",
            "a.test.ts",
            "missing.test.ts",
            "c.test.ts",
        ],
        dir.path(),
    );

    assert_eq!(code, 1);
    assert_eq!(stdout, "Fixed a.test.ts\nFixed c.test.ts\n");
    assert!(stderr.contains("Error fixing missing.test.ts: "));
    assert_eq!(
        fs::read_to_string(dir.path().join("c.test.ts")).unwrap(),
        NEW_FIXTURE
    );
}

#[test]
fn rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(&dir, "a.test.ts");

    run_migrate(&["a.test.ts"], dir.path());
    let once = fs::read(&path).unwrap();
    let (_, _, code) = run_migrate(&["a.test.ts"], dir.path());

    assert_eq!(code, 0);
    assert_eq!(fs::read(&path).unwrap(), once);
}

#[test]
fn json_report_with_dry_run() {
    let dir = TempDir::new().unwrap();
    write_fixture(&dir, "a.test.ts");

    let (stdout, _stderr, code) =
        run_migrate(&["--format", "json", "--dry-run", "a.test.ts"], dir.path());

    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(json["status"], "ok");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["results"][0]["changed"], true);
    assert_eq!(json["results"][0]["written"], false);
    assert_eq!(json["results"][0]["structural_matches"], 1);
    assert_eq!(
        fs::read_to_string(dir.path().join("a.test.ts")).unwrap(),
        OLD_FIXTURE
    );
}

#[test]
fn custom_rule_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("rules.json"),
        r#"{"renames": [{"from": "legacyName", "to": "modernName"}]}"#,
    )
    .unwrap();
    fs::write(dir.path().join("a.test.ts"), "expect(x.legacyName).toBe(1);").unwrap();

    let (stdout, _stderr, code) = run_migrate(&["--rules", "rules.json", "a.test.ts"], dir.path());

    assert_eq!(code, 0);
    assert_eq!(stdout, "Fixed a.test.ts\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("a.test.ts")).unwrap(),
        "expect(x.modernName).toBe(1);"
    );
}

#[test]
fn invalid_rule_file_exits_1_without_touching_files() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("rules.json"),
        r#"{"renames": [{"from": "a", "to": "ab"}]}"#,
    )
    .unwrap();
    write_fixture(&dir, "a.test.ts");

    let (_stdout, stderr, code) = run_migrate(&["--rules", "rules.json", "a.test.ts"], dir.path());

    assert_eq!(code, 1);
    assert!(stderr.contains("invalid rule configuration"));
    assert_eq!(
        fs::read_to_string(dir.path().join("a.test.ts")).unwrap(),
        OLD_FIXTURE
    );
}

#[test]
fn print_rules_emits_rule_document() {
    let dir = TempDir::new().unwrap();
    let (stdout, _stderr, code) = run_migrate(&["--print-rules"], dir.path());

    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(json["structural"][0]["name"], "minimal-foundation");
    assert_eq!(json["renames"].as_array().map(Vec::len), Some(4));
}

// ============================================================================
// run-unit-tests
// ============================================================================

#[test]
fn hook_rejects_malformed_context() {
    let dir = TempDir::new().unwrap();
    let (_stdout, stderr, code) = run_hook(&[], "{not json", dir.path());

    assert_eq!(code, 1);
    assert!(stderr.contains("Failed to parse JSON context"));
}

#[test]
fn hook_rejects_missing_work_unit() {
    let dir = TempDir::new().unwrap();
    let (_stdout, stderr, code) = run_hook(&[], r#"{"event": "done"}"#, dir.path());

    assert_eq!(code, 1);
    assert!(stderr.contains("No workUnitId in context"));
}

#[test]
fn hook_without_matching_tests_exits_0() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/__tests__")).unwrap();
    fs::write(dir.path().join("src/__tests__/other.test.ts"), "").unwrap();

    let (stdout, _stderr, code) = run_hook(&[], r#"{"workUnitId": "AUTH-001"}"#, dir.path());

    assert_eq!(code, 0);
    assert_eq!(stdout, "No test files found for AUTH-001\n");
}

#[cfg(unix)]
#[test]
fn hook_relays_runner_exit_code() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("src/auth/__tests__")).unwrap();
    fs::write(dir.path().join("src/auth/__tests__/auth-001.test.ts"), "").unwrap();

    let (stdout, stderr, code) = run_hook(
        &[
            "--test-command",
            r#"["sh", "-c", "echo testing $0; echo warn >&2; exit 7", "{test_file}"]"#,
        ],
        r#"{"workUnitId": "AUTH-001"}"#,
        dir.path(),
    );

    assert_eq!(code, 7);
    assert_eq!(
        stdout,
        "Running tests for AUTH-001...\ntesting src/auth/__tests__/auth-001.test.ts\n"
    );
    assert!(stderr.contains("warn"));
}
