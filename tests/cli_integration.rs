//! Integration tests for the CLI
//!
//! Tests the command-line interface for apply, status, verify and list

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG_JS: &str = "const config = {\n  retries: 3,\n  telemetry: true,\n};\n";

/// Helper to create a test workspace with patches
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::write(dir.path().join("config.js"), CONFIG_JS).unwrap();

    let patches_dir = dir.path().join("patches");
    fs::create_dir(&patches_dir).unwrap();

    fs::write(
        patches_dir.join("telemetry.toml"),
        r#"[meta]
name = "telemetry-patches"
description = "Turn telemetry off"
workspace_relative = true

[[patches]]
id = "disable-telemetry"
file = "config.js"

[patches.query]
type = "exact"
search = "telemetry: true"

[patches.operation]
type = "replace"
text = "telemetry: false"
"#,
    )
    .unwrap();

    dir
}

fn run(workspace: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_text-patcher"))
        .args(args)
        .arg("--workspace")
        .arg(workspace)
        .current_dir(workspace)
        .env_remove("TEXT_PATCHER_WORKSPACE")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_apply_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_text-patcher"))
        .args(["apply", "--help"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("--dry-run"));
    assert!(out.contains("--fail-fast"));
    assert!(out.contains("--workspace"));
}

#[test]
fn test_apply_basic() {
    let workspace = setup_test_workspace();
    let output = run(workspace.path(), &["apply"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("disable-telemetry: Applied"));
    assert!(out.contains("1 applied"));

    let content = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert_eq!(content, CONFIG_JS.replace("telemetry: true", "telemetry: false"));
}

#[test]
fn test_apply_second_run_reports_not_found() {
    let workspace = setup_test_workspace();
    assert!(run(workspace.path(), &["apply"]).status.success());
    let after_first = fs::read_to_string(workspace.path().join("config.js")).unwrap();

    let output = run(workspace.path(), &["apply"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("disable-telemetry: NOT FOUND"));
    assert!(!stderr(&output).contains("disable-telemetry: NOT FOUND"));
    assert!(stdout(&output).contains("1 not found"));

    let after_second = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert_eq!(after_first, after_second);
}

#[test]
fn test_apply_dry_run() {
    let workspace = setup_test_workspace();
    let output = run(workspace.path(), &["apply", "--dry-run"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("DRY RUN"));
    assert!(out.contains("Would apply"));

    let content = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert_eq!(content, CONFIG_JS);
}

#[test]
fn test_apply_with_diff() {
    let workspace = setup_test_workspace();
    let output = run(workspace.path(), &["apply", "--dry-run", "--diff"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("(original)"));
    assert!(out.contains("-  telemetry: true,"));
    assert!(out.contains("+  telemetry: false,"));
}

#[test]
fn test_apply_explicit_patch_file() {
    let workspace = setup_test_workspace();
    let extra = workspace.path().join("extra.toml");
    fs::write(
        &extra,
        r#"[meta]
workspace_relative = true

[[patches]]
id = "more-retries"
file = "config.js"
query = { type = "exact", search = "retries: 3" }
operation = { type = "replace", text = "retries: 5" }
"#,
    )
    .unwrap();

    let output = run(
        workspace.path(),
        &["apply", "--patches", extra.to_str().unwrap()],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let content = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert!(content.contains("retries: 5"));
    assert!(content.contains("telemetry: true"));
}

#[test]
fn test_near_miss_reported() {
    let workspace = setup_test_workspace();
    fs::write(
        workspace.path().join("config.js"),
        "const config = {\n  retries: 3,\n  telemetry:  true,\n};\n",
    )
    .unwrap();

    let output = run(workspace.path(), &["apply"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("disable-telemetry: NOT FOUND"));
    let err = stderr(&output);
    assert!(err.contains("Closest match at line 3"));
    // the miss is reported once, not echoed as a log event
    assert!(!err.contains("WARN"));
}

#[test]
fn test_missing_target_is_fatal() {
    let workspace = setup_test_workspace();
    fs::remove_file(workspace.path().join("config.js")).unwrap();

    let output = run(workspace.path(), &["apply"]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("disable-telemetry: ERROR"));
}

#[test]
fn test_unresolved_target_reports_every_patch() {
    let workspace = setup_test_workspace();
    fs::write(
        workspace.path().join("patches/zz-missing.toml"),
        r#"[meta]
workspace_relative = true

[[patches]]
id = "more-retries"
file = "config.js"
query = { type = "exact", search = "retries: 3" }
operation = { type = "replace", text = "retries: 5" }

[[patches]]
id = "gone"
file = "missing.js"
query = { type = "exact", search = "x" }
operation = { type = "replace", text = "y" }
"#,
    )
    .unwrap();

    let output = run(workspace.path(), &["apply", "--patches", "patches/zz-missing.toml"]);
    assert!(!output.status.success());
    let out = stdout(&output);
    assert!(out.contains("more-retries: ERROR"));
    assert!(out.contains("run aborted"));
    assert!(out.contains("gone: ERROR"));
    assert!(out.contains("2 failed"));

    let content = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert_eq!(content, CONFIG_JS);
}

#[test]
fn test_line_range_count_reapply_is_stable() {
    let workspace = setup_test_workspace();
    fs::write(
        workspace.path().join("patches/telemetry.toml"),
        r#"[meta]
workspace_relative = true

[[patches]]
id = "expand-retries"
file = "config.js"

[patches.query]
type = "line-range"
trigger = "const config = {"
count = 2

[patches.operation]
type = "replace"
text = """
  retries: 5,
  backoff: 2,
  telemetry: false,
"""
"#,
    )
    .unwrap();

    let first = run(workspace.path(), &["apply"]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let after_first = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert_eq!(
        after_first,
        "const config = {\n  retries: 5,\n  backoff: 2,\n  telemetry: false,\n};\n"
    );

    let second = run(workspace.path(), &["apply"]);
    assert!(second.status.success(), "stderr: {}", stderr(&second));
    assert!(stdout(&second).contains("expand-retries: Unchanged"));
    let after_second = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert_eq!(after_first, after_second);
}

#[test]
fn test_invalid_patch_file() {
    let workspace = setup_test_workspace();
    fs::write(
        workspace.path().join("patches/telemetry.toml"),
        "[[patches]]\nid = \"broken\"\n",
    )
    .unwrap();

    let output = run(workspace.path(), &["apply"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("telemetry.toml"));
}

#[test]
fn test_status_command() {
    let workspace = setup_test_workspace();

    let before = run(workspace.path(), &["status"]);
    assert!(before.status.success());
    assert!(stdout(&before).contains("PENDING"));

    assert!(run(workspace.path(), &["apply"]).status.success());

    let after = run(workspace.path(), &["status"]);
    assert!(after.status.success());
    let out = stdout(&after);
    assert!(out.contains("APPLIED"));
    assert!(out.contains("disable-telemetry"));
    assert!(!out.contains("PENDING"));
}

#[test]
fn test_verify_command() {
    let workspace = setup_test_workspace();

    let before = run(workspace.path(), &["verify"]);
    assert_eq!(before.status.code(), Some(1));
    assert!(stderr(&before).contains("MISMATCH"));

    assert!(run(workspace.path(), &["apply"]).status.success());

    let after = run(workspace.path(), &["verify"]);
    assert!(after.status.success());
    assert!(stdout(&after).contains("Verified"));
}

#[test]
fn test_list_command() {
    let workspace = setup_test_workspace();
    let output = run(workspace.path(), &["list"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("telemetry-patches"));
    assert!(out.contains("disable-telemetry [exact / replace]"));
    assert!(out.contains("telemetry: true"));
}

#[test]
fn test_workspace_from_environment() {
    let workspace = setup_test_workspace();
    let elsewhere = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_text-patcher"))
        .arg("apply")
        .current_dir(elsewhere.path())
        .env("TEXT_PATCHER_WORKSPACE", workspace.path())
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let content = fs::read_to_string(workspace.path().join("config.js")).unwrap();
    assert!(content.contains("telemetry: false"));
}
