//! Behavioral specs for the bare CLI surface: invocation and argument
//! validation errors that never reach the graph or scheduler.

use crate::prelude::*;

#[test]
fn bare_invocation_shows_help() {
    let dir = TempDir::new().unwrap();
    forge_cmd(dir.path())
        .assert()
        .failure()
        .stderr(contains("Usage:"));
}

#[test]
fn unknown_target_reports_usage_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "forge.toml", "version = 1\n");

    forge_cmd(dir.path())
        .args(["build", "//:missing"])
        .assert()
        .failure()
        .code(2);
}
