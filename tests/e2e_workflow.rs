//! End-to-end workflow test
//!
//! Tests the complete workflow:
//! 1. Discover patches
//! 2. Apply patches
//! 3. Verify patches
//! 4. Check idempotency

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Bundled web asset with Windows line endings.
const BUNDLE: &str = concat!(
    "function diagnostics(rawBaseUrl) {\r\n",
    "  let log = \"\";\r\n",
    "  log += `Raw Base URL: ${rawBaseUrl}\\n`;\r\n",
    "  return log;\r\n",
    "}\r\n",
);

const SETTINGS: &str = "[server]\n\
port = 8080\n\
# BEGIN generated\n\
old_a = 1\n\
old_b = 2\n\
# END generated\n\
\n\
[client]\n\
retries = 1 # tune\n\
timeout = 5 # tune\n";

/// Create a workspace with two targets and one patch file touching both
fn setup_e2e_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("web")).unwrap();
    fs::create_dir_all(root.join("patches")).unwrap();
    fs::write(root.join("web/bundle.js"), BUNDLE).unwrap();
    fs::write(root.join("settings.toml"), SETTINGS).unwrap();

    fs::write(
        root.join("patches/workspace.toml"),
        r##"[meta]
name = "workspace"
workspace_relative = true

# LF anchor, CRLF file
[[patches]]
id = "hide-raw-base-url"
file = "web/bundle.js"

[patches.query]
type = "escaped"
search = """
  log += `Raw Base URL: ${rawBaseUrl}\\n`;
"""

[patches.operation]
type = "replace"
text = ""

# Replace the generated block whatever its length
[[patches]]
id = "regenerate-block"
file = "settings.toml"

[patches.query]
type = "line-range"
trigger = "# BEGIN generated"
until = "# END generated"

[patches.operation]
type = "replace"
text = "new_a = 10\n"

[[patches]]
id = "tag-tunables"
file = "settings.toml"

[patches.query]
type = "marker"
marker = "# tune"
occurrences = "all"

[patches.operation]
type = "insert-before"
text = "# tunable"
"##,
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

#[test]
fn test_e2e_workflow() {
    let workspace = setup_e2e_workspace();
    let root = workspace.path();

    // Step 1: Apply patches
    let output = run(root, &["apply"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "apply failed:\n{}\n{}",
        stdout,
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("3 applied"));

    let bundle = fs::read_to_string(root.join("web/bundle.js")).unwrap();
    assert_eq!(
        bundle,
        "function diagnostics(rawBaseUrl) {\r\n  let log = \"\";\r\n  return log;\r\n}\r\n"
    );

    let settings = fs::read_to_string(root.join("settings.toml")).unwrap();
    assert_eq!(
        settings,
        "[server]\nport = 8080\n# BEGIN generated\nnew_a = 10\n# END generated\n\n\
         [client]\n# tunable\nretries = 1 # tune\n# tunable\ntimeout = 5 # tune\n"
    );

    // Step 2: Verify patches
    let output = run(root, &["verify"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("regenerate-block: Verified"));
    assert!(stdout.contains("tag-tunables: Verified"));
    // A deletion leaves nothing behind to recognise
    assert!(String::from_utf8_lossy(&output.stderr).contains("hide-raw-base-url: MISMATCH"));

    // Step 3: Status check
    let output = run(root, &["status"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Patch Status Report"));

    // Step 4: Re-apply leaves every byte in place
    let output = run(root, &["apply"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0 applied"));
    assert_eq!(fs::read_to_string(root.join("web/bundle.js")).unwrap(), bundle);
    assert_eq!(
        fs::read_to_string(root.join("settings.toml")).unwrap(),
        settings
    );
}

#[test]
fn test_e2e_fail_fast_leaves_file_untouched() {
    let workspace = setup_e2e_workspace();
    let root = workspace.path();

    // Drift the CRLF bundle so its patch misses
    fs::write(root.join("web/bundle.js"), "function diagnostics() {}\r\n").unwrap();

    let output = run(root, &["apply", "--fail-fast"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("hide-raw-base-url: NOT FOUND"));

    // settings.toml comes after the failing file and is never reached
    assert_eq!(
        fs::read_to_string(root.join("settings.toml")).unwrap(),
        SETTINGS
    );
}
