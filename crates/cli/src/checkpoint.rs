// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Build checkpoint persistence and resume (§4.J).
//!
//! A checkpoint is a snapshot of every node's terminal status (`Success`,
//! `Cached`, or `Failed`) at the moment a build was interrupted, plus the
//! cached output fingerprint each successful target produced. `forge resume`
//! reads the most recent checkpoint and replays it onto a freshly
//! constructed [`Graph`] according to a [`ResumeStrategy`], so an
//! interrupted multi-hour build doesn't have to restart from zero.
//!
//! On-disk format: a 4-byte magic (`CKPT`), a version byte, then a
//! postcard-serialized [`CheckpointBody`]. The magic and version are kept
//! outside the postcard payload so a format change is detectable without
//! first attempting (and potentially panicking) a deserialization.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::graph::{Graph, Status, TargetId};

const MAGIC: &[u8; 4] = b"CKPT";
const FORMAT_VERSION: u8 = 1;

/// One target's recorded terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub target: TargetId,
    pub status: Status,
    pub output_fingerprint: Option<Fingerprint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointBody {
    created_at_secs: u64,
    records: Vec<CheckpointRecord>,
}

/// A persisted build checkpoint.
#[derive(Debug)]
pub struct Checkpoint {
    created_at: SystemTime,
    records: Vec<CheckpointRecord>,
}

impl Checkpoint {
    /// Capture the current terminal status of every node in `graph`. Nodes
    /// still `Pending`, `Ready`, or `Building` are omitted — a checkpoint
    /// only ever records finished work.
    pub fn capture(graph: &Graph) -> Self {
        let records = graph
            .all_indices()
            .filter_map(|idx| {
                let node = graph.node_at(idx);
                match node.status() {
                    Status::Success | Status::Cached | Status::Failed => Some(CheckpointRecord {
                        target: node.target.id.clone(),
                        status: node.status(),
                        output_fingerprint: node.cached_output_hash().map(Fingerprint::from_bytes),
                    }),
                    Status::Pending | Status::Ready | Status::Building => None,
                }
            })
            .collect();

        Self {
            created_at: SystemTime::now(),
            records,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = CheckpointBody {
            created_at_secs: self
                .created_at
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            records: self.records.clone(),
        };
        let payload = postcard::to_allocvec(&body)?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + 1 + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&payload);

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes).map_err(|source| Error::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if bytes.len() < 5 || &bytes[0..4] != MAGIC {
            return Err(Error::Internal(format!(
                "{}: not a forge checkpoint file",
                path.display()
            )));
        }
        let version = bytes[4];
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion {
                path: path.to_path_buf(),
                found: version,
                expected: FORMAT_VERSION,
            });
        }

        let body: CheckpointBody = postcard::from_bytes(&bytes[5..])?;
        Ok(Self {
            created_at: UNIX_EPOCH + Duration::from_secs(body.created_at_secs),
            records: body.records,
        })
    }

    /// Whether this checkpoint is still within `max_age` of now. An expired
    /// checkpoint is ignored on resume and treated as if it didn't exist.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.created_at)
            .map(|age| age <= max_age)
            .unwrap_or(true)
    }

    pub fn records(&self) -> &[CheckpointRecord] {
        &self.records
    }

    /// Validity check: every recorded target still exists in `graph`. A
    /// checkpoint from a declaration set that has since changed shape
    /// (targets added, removed, or renamed) is not safe to replay.
    pub fn is_valid_for(&self, graph: &Graph) -> bool {
        self.records
            .iter()
            .all(|record| graph.index_of(&record.target).is_some())
    }

    /// Replay this checkpoint onto a freshly constructed `graph` according
    /// to `strategy`. Every node not explicitly restored is left `Pending`
    /// so [`Graph::mark_all_ready`] picks it up as fresh work.
    pub fn apply(&self, graph: &Graph, strategy: ResumeStrategy) -> Result<()> {
        if strategy == ResumeStrategy::RebuildAll {
            return Ok(());
        }

        for record in &self.records {
            let Some(idx) = graph.index_of(&record.target) else {
                continue;
            };

            match (record.status, strategy) {
                (Status::Success, _) | (Status::Cached, _) => {
                    graph.mark(idx, Status::Ready)?;
                    graph.mark(idx, Status::Building)?;
                    graph.mark(idx, record.status)?;
                }
                (Status::Failed, ResumeStrategy::SkipFailed) => {
                    graph.mark(idx, Status::Ready)?;
                    graph.mark(idx, Status::Building)?;
                    graph.mark(idx, Status::Failed)?;
                }
                (Status::Failed, ResumeStrategy::Smart | ResumeStrategy::RetryFailed) => {
                    // Leave `Pending`; `mark_all_ready` below re-queues it.
                }
                (Status::Failed, ResumeStrategy::RebuildAll) => unreachable!("handled above"),
                (Status::Pending | Status::Ready | Status::Building, _) => {}
            }
        }

        Ok(())
    }
}

/// How a resumed build treats previously recorded progress (§4.J, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStrategy {
    /// Restore successes, re-queue anything that previously failed. The
    /// default.
    Smart,
    /// Identical to `Smart` today; kept distinct so a future retry-budget
    /// policy can apply only on an explicit resume rather than every build.
    RetryFailed,
    /// Restore successes, leave previously failed targets (and anything
    /// that only depends on them) untouched.
    SkipFailed,
    /// Ignore the checkpoint entirely and rebuild everything.
    RebuildAll,
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
