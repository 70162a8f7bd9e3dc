//! Smoke tests for the Waymark CLI.
//!
//! These tests verify basic CLI functionality:
//! - `wm --version` outputs version info
//! - `wm --help` outputs help text
//! - `wm` without a command fails with usage

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the wm binary.
fn wm() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wm"))
}

#[test]
fn test_version_flag() {
    wm().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wm"))
        .stdout(predicate::str::contains("0.1.0"))
        .stdout(predicate::str::contains("commit"));
}

#[test]
fn test_help_flag() {
    wm().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("graph"))
        .stdout(predicate::str::contains("story"));
}

#[test]
fn test_story_help_lists_mutations() {
    wm().args(["story", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("toggle"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("edit"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn test_no_command_fails() {
    wm().assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
