// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Action executor (§4.G).
//!
//! Turns one [`ActionSpec`] into a finished result: fingerprint it, consult
//! the cache, and only fall through to a real sandboxed run on a miss. A
//! successful run's outputs are hashed into the [`Store`] and recorded in
//! the [`ActionCache`] before being materialized into the workspace's output
//! directory, so the next build (or another target depending on this one)
//! never re-executes it. The sandbox environment is always torn down,
//! success or failure, via the `Environment`'s own `Drop` backstop.

use std::path::PathBuf;
use std::sync::Arc;

use crate::action::{ActionSpec, InputKind};
use crate::cache::{ActionCache, CacheEntry, CacheMetadata, CacheResult, CacheTier};
use crate::config::DeterminismMode;
use crate::determinism::DeterminismLog;
use crate::error::{Error, Result};
use crate::fingerprint::{self, Fingerprint};
use crate::sandbox::Sandbox;
use crate::store::Store;

/// How an action's result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionSource {
    Cached(CacheTier),
    Ran,
}

/// The outcome of executing one action to completion.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub source: ExecutionSource,
    pub exit_code: i32,
    pub fingerprint: Fingerprint,
}

/// Runs actions against a cache, a store, and a sandbox strategy.
pub struct Executor {
    store: Arc<Store>,
    cache: Arc<ActionCache>,
    sandbox: Arc<dyn Sandbox>,
    workspace_root: PathBuf,
    output_dir: PathBuf,
    determinism: DeterminismMode,
    violations: DeterminismLog,
}

impl Executor {
    pub fn new(
        store: Arc<Store>,
        cache: Arc<ActionCache>,
        sandbox: Arc<dyn Sandbox>,
        workspace_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        determinism: DeterminismMode,
    ) -> Self {
        Self {
            store,
            cache,
            sandbox,
            workspace_root: workspace_root.into(),
            output_dir: output_dir.into(),
            determinism,
            violations: DeterminismLog::new(),
        }
    }

    /// Share this executor's violation log so a caller can persist it (or
    /// inspect it) after the build finishes, without needing to thread it
    /// through every constructor call site.
    pub fn violations_handle(&self) -> DeterminismLog {
        self.violations.clone()
    }

    /// Execute one action to completion, consulting the cache first.
    pub fn execute(&self, spec: &ActionSpec) -> Result<ExecutionOutcome> {
        let input_hashes = self.hash_inputs(spec)?;
        let fp = fingerprint::fingerprint_action(spec, &input_hashes)?;

        if let CacheResult::Hit(entry, tier) = self.cache.lookup(&fp, &spec.tool_version)? {
            if self.materialize_entry(&entry).is_ok() {
                return Ok(ExecutionOutcome {
                    source: ExecutionSource::Cached(tier),
                    exit_code: entry.exit_code,
                    fingerprint: fp,
                });
            }
            // A cache entry whose blobs no longer verify is treated as a
            // miss: invalidate and fall through to a real run.
            self.cache.invalidate(&fp);
        }

        let entry = self.run_once(spec)?;

        if self.determinism != DeterminismMode::Off && spec.has_outputs() {
            self.check_determinism(spec, &entry)?;
        }

        let exit_code = entry.exit_code;
        self.materialize_entry(&entry)?;
        self.cache.insert(fp, entry);

        Ok(ExecutionOutcome {
            source: ExecutionSource::Ran,
            exit_code,
            fingerprint: fp,
        })
    }

    /// Hash every declared input. Source inputs read straight from the
    /// workspace; dependency-output inputs read from this build's already
    /// materialized output directory, since by construction (§4.D) a
    /// dependency has already reached `Success`/`Cached` before this action
    /// becomes ready.
    fn hash_inputs(&self, spec: &ActionSpec) -> Result<Vec<Fingerprint>> {
        let mut hashes = Vec::with_capacity(spec.inputs.len());
        for input in &spec.inputs {
            let path = match input.kind {
                InputKind::Source | InputKind::Tool => self.workspace_root.join(&input.path),
                InputKind::DependencyOutput => self.output_dir.join(&input.path),
            };
            hashes.push(fingerprint::hash_file(&path)?);
        }
        Ok(hashes)
    }

    /// Run the action once inside a fresh sandbox environment and turn a
    /// successful exit into a [`CacheEntry`] with hashed, stored outputs.
    fn run_once(&self, spec: &ActionSpec) -> Result<CacheEntry> {
        let mut env = self.sandbox.prepare(spec)?;
        let outcome = env.execute(spec);
        let result = outcome.and_then(|outcome| {
            if outcome.timed_out {
                return Err(Error::ProcessTimeout {
                    target: spec.target.clone(),
                    elapsed_ms: outcome.duration.as_millis() as u64,
                });
            }
            if !outcome.succeeded() {
                return Err(Error::ActionFailed {
                    target: spec.target.clone(),
                    code: outcome.exit_code,
                });
            }

            let mut outputs = Vec::with_capacity(spec.outputs.len());
            for output in &spec.outputs {
                let produced = env.output_path(&output.path);
                let bytes = std::fs::read(&produced).map_err(|source| Error::Io {
                    path: produced.clone(),
                    source,
                })?;
                let hash = self.store.put(&bytes)?;
                outputs.push((output.path.clone(), hash));
            }

            Ok(CacheEntry::new(
                outputs,
                outcome.exit_code.unwrap_or(0),
                CacheMetadata::current(spec.tool_version.clone()),
            ))
        });

        let _ = env.teardown();
        result
    }

    /// Re-run the action a second time in a fresh sandbox and compare output
    /// hashes against the first run. A mismatch is a determinism violation;
    /// in [`DeterminismMode::Warn`] it is only logged.
    fn check_determinism(&self, spec: &ActionSpec, first: &CacheEntry) -> Result<()> {
        let second = self.run_once(spec)?;

        let mut diffs = Vec::new();
        for (path, first_hash) in &first.outputs {
            match second.outputs.iter().find(|(p, _)| p == path) {
                Some((_, second_hash)) if second_hash == first_hash => {}
                Some(_) => diffs.push(format!("{} hash changed between runs", path.display())),
                None => diffs.push(format!("{} missing on second run", path.display())),
            }
        }

        if diffs.is_empty() {
            return Ok(());
        }

        let diff = diffs.join("; ");
        match self.determinism {
            DeterminismMode::Strict => {
                self.violations.record(spec.target.clone());
                Err(Error::DeterminismViolation {
                    target: spec.target.clone(),
                    diff,
                })
            }
            DeterminismMode::Warn => {
                tracing::warn!(target = %spec.target, diff, "determinism check failed");
                self.violations.record(spec.target.clone());
                Ok(())
            }
            DeterminismMode::Off => Ok(()),
        }
    }

    /// Copy a cache entry's blobs out of the store and into the workspace's
    /// output directory under their declared relative paths.
    fn materialize_entry(&self, entry: &CacheEntry) -> Result<()> {
        for (path, hash) in &entry.outputs {
            if !self.store.has(hash) {
                return Err(Error::Corrupted {
                    hash: hash.to_hex(),
                });
            }
            self.store.materialize(hash, &self.output_dir.join(path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
