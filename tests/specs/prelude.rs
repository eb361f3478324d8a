//! Test helpers for black-box behavioral specifications.
//!
//! Each test builds a small temporary workspace (a `forge.toml` plus shell
//! scripts standing in for real toolchains) and drives the compiled binary
//! against it, asserting on stdout/stderr and exit codes rather than on the
//! library's internal types.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::path::Path;

pub use assert_cmd::Command;
pub use predicates::prelude::*;
pub use predicates::str::contains;
pub use tempfile::TempDir;

pub fn forge_cmd(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("forge").unwrap();
    cmd.current_dir(workspace);
    cmd
}

pub fn write(workspace: &Path, relative: &str, content: &str) {
    let path = workspace.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A shell script target that copies its single input to its declared
/// output, appending a line to `runs.log` each time it runs so tests can
/// assert on execution counts.
///
/// When `deps` is empty, `src` names a real file under the package root and
/// is declared as a glob-matched `srcs` entry. When `deps` is non-empty,
/// `src` instead names the upstream target's declared `output` — that file
/// does not exist at graph-build time, so it is NOT globbed; it reaches this
/// target purely through the dependency edge, materialized by the sandbox
/// from the dependency's build output.
pub fn copy_target(name: &str, src: &str, out: &str, deps: &[&str]) -> String {
    let deps_toml = deps
        .iter()
        .map(|d| format!("\"{d}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let srcs_toml = if deps.is_empty() {
        format!("[\"{src}\"]")
    } else {
        "[]".to_string()
    };
    format!(
        r#"
[[targets]]
name = "{name}"
kind = "custom"
srcs = {srcs_toml}
deps = [{deps_toml}]
output = "{out}"
command = ["sh", "-c", "cat {src} > {out} && echo ran >> runs.log"]
"#
    )
}
