// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Persisted record of determinism violations (§4.G, §4.L).
//!
//! Under [`crate::config::DeterminismMode::Warn`], a re-run mismatch is not
//! fatal — the build keeps going and the mismatch is only logged. That log
//! line is useless to a verification pass that runs later, possibly in a
//! different process entirely (`forge verify` after `forge build` has
//! already exited), so every such violation is also recorded here and
//! persisted to disk alongside the rest of the cache state. [`crate::verify`]
//! loads it back and folds it into the certificate instead of assuming a
//! clean run just because no `Strict`-mode error was raised.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::TargetId;

pub const STATE_FILE_NAME: &str = "determinism-violations.postcard";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedViolations {
    targets: Vec<TargetId>,
}

/// Thread-safe, shareable set of targets whose `Warn`-mode determinism
/// check failed during the current (or a past, once reopened) build.
#[derive(Clone, Default)]
pub struct DeterminismLog(Arc<DashSet<TargetId>>);

impl DeterminismLog {
    pub fn new() -> Self {
        Self(Arc::new(DashSet::new()))
    }

    /// Open a previously persisted log, or start a fresh empty one if none
    /// exists yet or the file can't be parsed.
    pub fn open(path: impl AsRef<Path>) -> Self {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => match postcard::from_bytes::<PersistedViolations>(&bytes) {
                Ok(persisted) => {
                    let set = DashSet::new();
                    for target in persisted.targets {
                        set.insert(target);
                    }
                    Self(Arc::new(set))
                }
                Err(_) => Self::new(),
            },
            Err(_) => Self::new(),
        }
    }

    pub fn record(&self, target: TargetId) {
        self.0.insert(target);
    }

    pub fn contains(&self, target: &TargetId) -> bool {
        self.0.contains(target)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_set(&self) -> HashSet<TargetId> {
        self.0.iter().map(|entry| entry.clone()).collect()
    }

    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let targets: Vec<TargetId> = self.0.iter().map(|entry| entry.clone()).collect();
        let payload = postcard::to_allocvec(&PersistedViolations { targets })?;
        std::fs::write(path.as_ref(), payload).map_err(|source| Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "determinism_tests.rs"]
mod tests;
