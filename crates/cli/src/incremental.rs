// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Incremental change detection (§4.K).
//!
//! Between builds, forge remembers a [`MetadataSignature`] and content
//! [`Fingerprint`] for every source file it has ever hashed. On the next
//! build, a source is considered unchanged (and skipped from re-hashing)
//! the moment its metadata signature matches — only a metadata mismatch
//! triggers the more expensive content hash, and only a content mismatch
//! marks the source dirty. Dirty sources are propagated to the targets that
//! declare them, and from there outward through the dependency graph
//! according to an [`InvalidationStrategy`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fingerprint::{self, Fingerprint, MetadataSignature};
use crate::graph::{Graph, TargetId};

pub const STATE_FILE_NAME: &str = "incremental-state.postcard";

/// How a set of changed source files is turned into a set of targets to
/// rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationStrategy {
    /// Ignore change detection entirely; every target is rebuilt.
    Full,
    /// The safe default: a changed source dirties its owning target, and
    /// dirtying propagates transitively to every dependent, since any of
    /// them could read the owning target's output.
    Incremental,
    /// Dirties only the targets that directly declare a changed source.
    /// Dependents are left alone on the assumption that the action cache's
    /// own fingerprinting (keyed on a dependency's actual output hash, not
    /// its build status) will still catch a dependent that truly needs to
    /// re-run. Cheaper, and sound as long as every dependent is otherwise
    /// reachable through a normal build — it must not be combined with
    /// skipping dependents from the graph entirely.
    Minimal,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    entries: Vec<(PathBuf, MetadataSignature, Fingerprint)>,
}

/// Persistent per-source change-detection state.
pub struct IncrementalState {
    path: PathBuf,
    entries: HashMap<PathBuf, (MetadataSignature, Fingerprint)>,
}

impl IncrementalState {
    /// Open (or start a fresh, empty) state rooted at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => match postcard::from_bytes::<PersistedState>(&bytes) {
                Ok(state) => state
                    .entries
                    .into_iter()
                    .map(|(path, sig, fp)| (path, (sig, fp)))
                    .collect(),
                Err(_) => HashMap::new(),
            },
            Err(_) => HashMap::new(),
        };
        Ok(Self { path, entries })
    }

    /// True if `source` has changed since it was last recorded (or was
    /// never recorded at all). Uses the cheap metadata signature first,
    /// only falling through to a content hash on a metadata mismatch.
    pub fn has_changed(&self, source: &Path) -> Result<bool> {
        let Some((recorded_sig, recorded_fp)) = self.entries.get(source) else {
            return Ok(true);
        };

        let current_sig = MetadataSignature::read(source)?;
        if current_sig == *recorded_sig {
            return Ok(false);
        }

        let current_fp = fingerprint::hash_file(source)?;
        Ok(current_fp != *recorded_fp)
    }

    /// Record the current metadata and content hash of `source`.
    pub fn record(&mut self, source: &Path) -> Result<()> {
        let sig = MetadataSignature::read(source)?;
        let fp = fingerprint::hash_file(source)?;
        self.entries.insert(source.to_path_buf(), (sig, fp));
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        let state = PersistedState {
            entries: self
                .entries
                .iter()
                .map(|(path, (sig, fp))| (path.clone(), *sig, *fp))
                .collect(),
        };
        let bytes = postcard::to_allocvec(&state)?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes).map_err(|source| Error::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Determine which targets need rebuilding given a set of changed source
/// files, per `strategy`. `changed` paths are matched against each target's
/// declared `sources` list exactly, so a target must declare a source to be
/// invalidated by it.
pub fn affected_targets(
    graph: &Graph,
    changed: &HashSet<PathBuf>,
    strategy: InvalidationStrategy,
) -> HashSet<TargetId> {
    if strategy == InvalidationStrategy::Full {
        return graph
            .all_indices()
            .map(|idx| graph.node_at(idx).target.id.clone())
            .collect();
    }

    let directly_affected: HashSet<TargetId> = graph
        .all_indices()
        .filter(|&idx| {
            graph
                .node_at(idx)
                .target
                .sources
                .iter()
                .any(|src| changed.contains(src))
        })
        .map(|idx| graph.node_at(idx).target.id.clone())
        .collect();

    if strategy == InvalidationStrategy::Minimal {
        return directly_affected;
    }

    let mut affected = directly_affected.clone();
    let mut queue: VecDeque<TargetId> = directly_affected.into_iter().collect();
    while let Some(id) = queue.pop_front() {
        let Some(idx) = graph.index_of(&id) else {
            continue;
        };
        for dependent in graph.dependents(idx) {
            let dep_id = graph.node_at(dependent).target.id.clone();
            if affected.insert(dep_id.clone()) {
                queue.push_back(dep_id);
            }
        }
    }
    affected
}

#[cfg(test)]
#[path = "incremental_tests.rs"]
mod tests;
