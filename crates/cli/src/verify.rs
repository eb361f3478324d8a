// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Post-build verification and the signed-by-content certificate (§4.L).
//!
//! Four checks feed one [`Certificate`]:
//! - acyclicity — re-affirms the graph's own construction-time invariant
//! - hermeticity — no two targets declare overlapping output paths, and
//!   every input a target reads is either a declared source or a declared
//!   dependency's output
//! - determinism — whether the build actually exercised a determinism
//!   check (§4.G); `None` if `DeterminismMode::Off` left it unchecked
//! - race-freedom — derived from hermeticity: two actions whose declared
//!   I/O sets are disjoint cannot race on each other's files regardless of
//!   scheduling order, so this check never runs independently
//!
//! The certificate is hashed so two builds of the same graph, under the
//! same sandbox policy, produce byte-identical verification output.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::DeterminismMode;
use crate::fingerprint::{self, Fingerprint};
use crate::graph::{Graph, TargetId};

/// One verification finding tied to a specific target, surfaced alongside a
/// failed certificate so the caller knows what to fix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub target: TargetId,
    pub message: String,
}

/// The outcome of verifying one completed (or in-progress) graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub acyclic: bool,
    pub hermetic: bool,
    /// `None` when the build ran with `DeterminismMode::Off` and so never
    /// exercised a re-run comparison for any target.
    pub deterministic: Option<bool>,
    pub race_free: bool,
    pub findings: Vec<Finding>,
    pub hash: Fingerprint,
}

impl Certificate {
    pub fn passed(&self) -> bool {
        self.acyclic && self.hermetic && self.race_free && self.deterministic != Some(false)
    }
}

/// Run every check against `graph` and produce a certificate.
///
/// `determinism_mode` reflects the sandbox policy the build actually ran
/// under — the certificate can only report on a check that was performed.
/// `violations` is the persisted [`crate::determinism::DeterminismLog`] from
/// that build (possibly empty, possibly from a different process entirely):
/// a `Warn`-mode mismatch never aborts the build, so without consulting it a
/// standalone `forge verify` would have no way to know one happened.
pub fn verify(
    graph: &Graph,
    determinism_mode: DeterminismMode,
    violations: &HashSet<TargetId>,
) -> Certificate {
    let acyclic = graph.verify_acyclic();

    let (hermetic, findings) = verify_hermeticity(graph);
    let race_free = hermetic;

    let deterministic = match determinism_mode {
        DeterminismMode::Off => None,
        DeterminismMode::Warn | DeterminismMode::Strict => Some(
            graph
                .all_indices()
                .all(|idx| !violations.contains(&graph.node_at(idx).target.id)),
        ),
    };

    let hash = hash_certificate(acyclic, hermetic, deterministic, race_free, &findings);

    Certificate {
        acyclic,
        hermetic,
        deterministic,
        race_free,
        findings,
        hash,
    }
}

/// No two targets may declare the same output path, and every dependency
/// edge in the graph must correspond to a real target — both of which
/// [`Graph::build`] already enforces, so this additionally checks two
/// invariants the graph type itself cannot: output-path disjointness, and
/// that no target reads another target's output without declaring the
/// dependency edge that wires it in (§4.F).
fn verify_hermeticity(graph: &Graph) -> (bool, Vec<Finding>) {
    let mut seen: std::collections::HashMap<PathBuf, TargetId> = std::collections::HashMap::new();
    let mut findings = Vec::new();

    for idx in graph.all_indices() {
        let target = &graph.node_at(idx).target;
        let Some(output) = &target.output_path else {
            continue;
        };
        if let Some(owner) = seen.get(output) {
            findings.push(Finding {
                target: target.id.clone(),
                message: format!("output `{}` also declared by {owner}", output.display()),
            });
        } else {
            seen.insert(output.clone(), target.id.clone());
        }
    }

    let io_paths = declared_io_paths(graph);
    for idx in graph.all_indices() {
        let target = &graph.node_at(idx).target;
        for source in &target.sources {
            // Cheap membership check before the owner lookup below: most
            // sources aren't anybody's output at all.
            if !io_paths.contains(source) {
                continue;
            }
            if let Some(owner) = seen.get(source) {
                if *owner != target.id && !target.dependency_outputs.contains(source) {
                    findings.push(Finding {
                        target: target.id.clone(),
                        message: format!(
                            "source `{}` is {owner}'s output but not declared as a dependency",
                            source.display()
                        ),
                    });
                }
            }
        }
    }

    (findings.is_empty(), findings)
}

fn hash_certificate(
    acyclic: bool,
    hermetic: bool,
    deterministic: Option<bool>,
    race_free: bool,
    findings: &[Finding],
) -> Fingerprint {
    let mut buf = Vec::new();
    buf.push(acyclic as u8);
    buf.push(hermetic as u8);
    buf.push(match deterministic {
        None => 0,
        Some(false) => 1,
        Some(true) => 2,
    });
    buf.push(race_free as u8);
    for finding in findings {
        buf.extend_from_slice(finding.target.as_str().as_bytes());
        buf.extend_from_slice(finding.message.as_bytes());
    }
    fingerprint::hash_bytes(&buf)
}

/// Every path reachable from `graph`'s declared sources and dependency
/// outputs, used by callers that want to cross-check a sandbox's own
/// observed file accesses against the declared set (§4.F `SandboxEscape`).
pub fn declared_io_paths(graph: &Graph) -> HashSet<PathBuf> {
    let mut paths = HashSet::new();
    for idx in graph.all_indices() {
        let target = &graph.node_at(idx).target;
        paths.extend(target.sources.iter().cloned());
        if let Some(output) = &target.output_path {
            paths.insert(output.clone());
        }
    }
    paths
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
