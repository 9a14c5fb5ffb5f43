//! Integration tests for the command-line interface
//!
//! Runs the built binary against scratch files for the apply and check
//! commands, inline and with patch spec files.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const FIVE: &str = "A\nB\nC\nD\nE\n";

fn line_patcher(args: &[&str]) -> Output {
    run_in(None, args)
}

/// Run from `dir` so relative paths resolve against it
fn line_patcher_in(dir: &Path, args: &[&str]) -> Output {
    run_in(Some(dir), args)
}

fn run_in(dir: Option<&Path>, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_line-patcher"));
    command.args(args).env("NO_COLOR", "1").env_remove("RUST_LOG");
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    command.output().unwrap()
}

/// Helper to create a scratch dir holding the five-line file
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("five.txt"), FIVE).unwrap();
    dir
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_apply_help() {
    let output = line_patcher(&["apply", "--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Replace a line range and rewrite the file"));
    assert!(stdout.contains("--start-marker"));
}

#[test]
fn test_apply_inline_success() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "apply",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "B",
        "--end-marker",
        "D",
        "--replacement",
        "X\nY\n",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Success"));
    assert_eq!(fs::read_to_string(&file).unwrap(), "A\nX\nY\nE\n");
}

#[test]
fn test_apply_start_mismatch_exits_nonzero() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "apply",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "C",
        "--end-marker",
        "D",
        "--replacement",
        "X\n",
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Mismatch at 2: B"));
    assert!(stderr.contains("Marker found nearby at line 3"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Success"));
    assert_eq!(fs::read_to_string(&file).unwrap(), FIVE);
}

#[test]
fn test_apply_end_mismatch_warns_but_succeeds() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "apply",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "B",
        "--end-marker",
        "</div>",
        "--replacement",
        "X\n",
    ]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Mismatch at 4: D"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Success"));
    assert_eq!(fs::read_to_string(&file).unwrap(), "A\nX\nE\n");
}

#[test]
fn test_end_mismatch_warning_printed_once() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");
    let args = [
        "apply",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "B",
        "--end-marker",
        "</div>",
        "--replacement",
        "B\nC\nD\n",
    ];

    let output = line_patcher(&args);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Mismatch at 4: D").count(), 1);
    assert!(!stderr.contains("end marker not found"));

    let mut verbose = args.to_vec();
    verbose.push("-v");
    let output = line_patcher(&verbose);
    assert!(String::from_utf8_lossy(&output.stderr).contains("end marker not found"));
}

#[test]
fn test_apply_relative_workspace_and_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("ws")).unwrap();
    fs::write(dir.path().join("ws/page.txt"), "A\nB\nC\n").unwrap();

    let output = line_patcher_in(
        dir.path(),
        &[
            "apply",
            "--workspace",
            "ws",
            "--file",
            "ws/page.txt",
            "--start",
            "2",
            "--end",
            "2",
            "--start-marker",
            "B",
            "--end-marker",
            "B",
            "--replacement",
            "X\n",
        ],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("ws/page.txt")).unwrap(),
        "A\nX\nC\n"
    );
}

#[test]
fn test_apply_relative_patch_spec_shows_diff() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("ws")).unwrap();
    fs::write(dir.path().join("ws/page.txt"), "A\nB\nC\n").unwrap();
    fs::write(
        dir.path().join("ws/swap.toml"),
        r#"
[patch]
file = "page.txt"
start_line = 2
end_line = 2
start_marker = "B"
end_marker = "B"
replacement = "X\n"
"#,
    )
    .unwrap();

    let output = line_patcher_in(
        dir.path(),
        &["apply", "--patch", "ws/swap.toml", "--workspace", "ws", "--diff"],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-B"));
    assert!(stdout.contains("+X"));
    assert_eq!(
        fs::read_to_string(dir.path().join("ws/page.txt")).unwrap(),
        "A\nX\nC\n"
    );
}

#[test]
fn test_apply_end_mismatch_strict_aborts() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "apply",
        "--strict",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "B",
        "--end-marker",
        "</div>",
        "--replacement",
        "X\n",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Mismatch at 4: D"));
    assert_eq!(fs::read_to_string(&file).unwrap(), FIVE);
}

#[test]
fn test_apply_patch_spec_with_replacement_file() {
    let workspace = setup_test_workspace();
    fs::write(workspace.path().join("block.txt"), "middle\n").unwrap();
    let spec = workspace.path().join("collapse.toml");
    fs::write(
        &spec,
        r#"[meta]
name = "collapse-middle"

[patch]
file = "five.txt"
start_line = 2
end_line = 4
start_marker = "B"
end_marker = "D"
policy = "strict"
replacement_file = "block.txt"
"#,
    )
    .unwrap();

    let output = line_patcher(&["apply", "--diff", "--patch", path_str(&spec)]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("+middle"));
    assert!(stdout.contains("-C"));
    assert!(stdout.contains("Success"));
    assert_eq!(
        fs::read_to_string(workspace.path().join("five.txt")).unwrap(),
        "A\nmiddle\nE\n"
    );
}

#[test]
fn test_apply_outside_workspace_fails() {
    let outer = setup_test_workspace();
    let root = outer.path().join("root");
    fs::create_dir_all(&root).unwrap();
    let file = outer.path().join("five.txt");

    let output = line_patcher(&[
        "apply",
        "--workspace",
        path_str(&root),
        "--file",
        path_str(&file),
        "--start",
        "1",
        "--end",
        "1",
        "--start-marker",
        "A",
        "--end-marker",
        "A",
        "--replacement",
        "Z\n",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("outside workspace"));
    assert_eq!(fs::read_to_string(&file).unwrap(), FIVE);
}

#[test]
fn test_apply_requires_replacement() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "apply",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "B",
        "--end-marker",
        "D",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("'replacement'"));
    assert_eq!(fs::read_to_string(&file).unwrap(), FIVE);
}

#[test]
fn test_check_prints_hash_without_writing() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "check",
        "--file",
        path_str(&file),
        "--start",
        "2",
        "--end",
        "4",
        "--start-marker",
        "B",
        "--end-marker",
        "D",
        "--replacement",
        "X\n",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Lines 2-4 of 5"));
    assert!(stdout.contains(&format!(
        "{:016x}",
        xxhash_rust::xxh3::xxh3_64(b"B\nC\nD\n")
    )));
    assert_eq!(fs::read_to_string(&file).unwrap(), FIVE);
}

#[test]
fn test_check_start_mismatch_exits_nonzero() {
    let workspace = setup_test_workspace();
    let file = workspace.path().join("five.txt");

    let output = line_patcher(&[
        "check",
        "--file",
        path_str(&file),
        "--start",
        "1",
        "--end",
        "2",
        "--start-marker",
        "nope",
        "--end-marker",
        "B",
        "--replacement",
        "X\n",
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Mismatch at 1: A"));
}
