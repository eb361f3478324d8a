// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Hermetic execution sandbox (§4.F).
//!
//! A [`SandboxSpec`] is a set-theoretic description of an action's execution
//! environment — declared inputs (read-only), declared outputs
//! (read-write), a scratch directory, a network policy, and resource
//! limits. [`Sandbox`] is the platform-abstracted contract; [`FallbackSandbox`]
//! is the one strategy this crate ships: a scratch workspace populated with
//! only the declared I/O via hardlink/copy, plus a process-group kill on
//! timeout. It does not use namespaces or cgroups, so it is documented as a
//! reduced guarantee (§9 Open Questions) — the verification certificate
//! (§4.L) records this as `hermeticity: degraded`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::action::{ActionSpec, InputKind, NetworkPolicy};
use crate::error::{Error, Result};
use crate::graph::TargetId;

/// Resource usage observed for one action execution. Best-effort: fields
/// the platform cannot report stay at their default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceUsage {
    pub max_rss_bytes: Option<u64>,
    pub user_cpu: Option<Duration>,
    pub system_cpu: Option<Duration>,
}

/// The result of running one action inside a sandbox.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub exit_code: Option<i32>,
    pub duration: Duration,
    pub resources: ResourceUsage,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Whether the sandbox that ran an action could enforce full isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hermeticity {
    Enforced,
    Degraded,
}

/// Platform-abstracted sandbox contract. One [`Sandbox`] implementation is
/// shared across all actions in a build; it hands out one [`Environment`]
/// per action via [`Sandbox::prepare`].
pub trait Sandbox: Send + Sync {
    fn prepare(&self, spec: &ActionSpec) -> Result<Box<dyn Environment>>;

    /// Whether this strategy can fully enforce §4.F's invariants.
    fn hermeticity(&self) -> Hermeticity;
}

/// A materialized sandbox for exactly one action. Consumed once via
/// [`Environment::execute`]; [`Environment::teardown`] is the explicit fast
/// path, `Drop` is the backstop so a panicking caller still cleans up.
pub trait Environment: Send {
    fn execute(&mut self, spec: &ActionSpec) -> Result<Outcome>;
    fn teardown(&mut self) -> Result<()>;

    /// Resolve a declared output's relative path to where it actually landed
    /// inside this environment, so the executor can read it back after a
    /// successful run (§4.G).
    fn output_path(&self, relative: &Path) -> PathBuf;
}

/// Scratch-workspace sandbox: declared inputs are hardlinked (falling back
/// to copy) into a private temp directory, declared outputs are left
/// writable there, and nothing else from the real workspace is visible
/// inside it. Network isolation and resource limits are **not** enforced
/// on this fallback strategy — see module docs.
pub struct FallbackSandbox {
    workspace_root: PathBuf,
    output_dir: PathBuf,
    scratch_root: PathBuf,
}

impl FallbackSandbox {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            output_dir: output_dir.into(),
            scratch_root: scratch_root.into(),
        }
    }
}

impl Sandbox for FallbackSandbox {
    fn prepare(&self, spec: &ActionSpec) -> Result<Box<dyn Environment>> {
        let dir = self.scratch_root.join(sanitize(spec.target.as_str()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|source| Error::Io {
                path: dir.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&dir).map_err(|source| Error::Io {
            path: dir.clone(),
            source,
        })?;

        for input in &spec.inputs {
            let src = match input.kind {
                InputKind::Source | InputKind::Tool => self.workspace_root.join(&input.path),
                InputKind::DependencyOutput => self.output_dir.join(&input.path),
            };
            let dest = dir.join(&input.path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            if src.is_file() {
                link_or_copy(&src, &dest)?;
            }
        }

        for output in &spec.outputs {
            if let Some(parent) = dir.join(&output.path).parent() {
                std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        Ok(Box::new(FallbackEnvironment {
            target: spec.target.clone(),
            dir,
            torn_down: false,
        }))
    }

    fn hermeticity(&self) -> Hermeticity {
        Hermeticity::Degraded
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn link_or_copy(src: &Path, dest: &Path) -> Result<()> {
    match std::fs::hard_link(src, dest) {
        Ok(()) => Ok(()),
        Err(_) => std::fs::copy(src, dest).map(|_| ()).map_err(|source| Error::Io {
            path: dest.to_path_buf(),
            source,
        }),
    }
}

struct FallbackEnvironment {
    target: TargetId,
    dir: PathBuf,
    torn_down: bool,
}

impl Environment for FallbackEnvironment {
    fn execute(&mut self, spec: &ActionSpec) -> Result<Outcome> {
        if spec.network == NetworkPolicy::Isolated {
            tracing::debug!(target = %self.target, "network policy is isolated (not enforced by fallback sandbox)");
        }

        let mut env: BTreeMap<String, String> = BTreeMap::new();
        for name in &spec.env_allowlist {
            if let Ok(value) = std::env::var(name) {
                env.insert(name.clone(), value);
            }
        }
        for (k, v) in &spec.env {
            env.insert(k.clone(), v.clone());
        }

        let Some(program) = spec.command.first() else {
            return Err(Error::ProcessSpawnFailed {
                target: self.target.clone(),
                source: std::io::Error::other("empty command vector"),
            });
        };

        let mut command = Command::new(program);
        command
            .args(&spec.command[1..])
            .current_dir(&self.dir)
            .env_clear()
            .envs(&env)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Put the child in its own process group so a timeout kill can take
        // out every descendant it forked, not just the direct child.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let start = Instant::now();
        let child = command.spawn().map_err(|source| Error::ProcessSpawnFailed {
            target: self.target.clone(),
            source,
        })?;

        let outcome = wait_with_timeout(child, spec.timeout, &self.target)?;

        check_for_escapes(&self.dir, &self.target)?;

        for output in &spec.outputs {
            let produced = self.dir.join(&output.path);
            if output.required && outcome.succeeded() && !produced.exists() {
                return Err(Error::ActionFailed {
                    target: self.target.clone(),
                    code: outcome.exit_code,
                });
            }
        }

        Ok(Outcome {
            duration: start.elapsed(),
            ..outcome
        })
    }

    fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|source| Error::Io {
                path: self.dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn output_path(&self, relative: &Path) -> PathBuf {
        self.dir.join(relative)
    }
}

impl Drop for FallbackEnvironment {
    fn drop(&mut self) {
        let _ = self.teardown();
    }
}

/// Walk every entry under `dir` and fail the moment a symlink resolves
/// outside it. A declared input is hardlinked or copied in, never symlinked
/// by `prepare`, so any symlink found here was created by the action itself
/// — the one way it could otherwise make an arbitrary host path visible to
/// itself or a later reader despite never declaring it as an input.
fn check_for_escapes(dir: &Path, target: &TargetId) -> Result<()> {
    let Ok(root) = dir.canonicalize() else {
        return Ok(());
    };

    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                if let Ok(resolved) = path.canonicalize() {
                    if !resolved.starts_with(&root) {
                        return Err(Error::SandboxEscape {
                            target: target.clone(),
                            path,
                        });
                    }
                }
            } else if file_type.is_dir() {
                stack.push(path);
            }
        }
    }
    Ok(())
}

fn wait_with_timeout(mut child: Child, timeout: Duration, target: &TargetId) -> Result<Outcome> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                use std::io::Read;
                let mut stdout = Vec::new();
                let mut stderr = Vec::new();
                if let Some(mut out) = child.stdout.take() {
                    let _ = out.read_to_end(&mut stdout);
                }
                if let Some(mut err) = child.stderr.take() {
                    let _ = err.read_to_end(&mut stderr);
                }
                return Ok(Outcome {
                    exit_code: status.code(),
                    duration: start.elapsed(),
                    resources: ResourceUsage::default(),
                    stdout,
                    stderr,
                    timed_out: false,
                });
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    kill_process_tree(&mut child);
                    let _ = child.wait();
                    return Ok(Outcome {
                        exit_code: None,
                        duration: start.elapsed(),
                        resources: ResourceUsage::default(),
                        stdout: Vec::new(),
                        stderr: Vec::new(),
                        timed_out: true,
                    });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(source) => {
                return Err(Error::ProcessSpawnFailed {
                    target: target.clone(),
                    source,
                });
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    // The child was spawned into its own process group (pgid == its own
    // pid), so a negative pid targets the whole group: the child and any
    // descendants it forked before the timeout fired.
    #[allow(unsafe_code)]
    unsafe {
        libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
