// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Action specifications: the unit of work the executor runs (§4.A/§3).
//!
//! An [`ActionSpec`] is the fully-resolved description of a single process
//! invocation — command, environment, declared inputs/outputs, resource
//! limits — produced by the analyzer from a [`crate::graph::Target`]. It
//! carries no graph position information; the scheduler and executor never
//! need to look the originating target back up through it except by id.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::TargetId;

/// How an input path participates in the action's sandbox (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputKind {
    /// A source file tracked by content hash.
    Source,
    /// The output of a dependency target, materialized before execution.
    DependencyOutput,
    /// A tool binary or script invoked by the command.
    Tool,
}

/// A single declared input to an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    pub path: PathBuf,
    pub kind: InputKind,
}

/// A single declared output an action must produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    pub path: PathBuf,
    /// Whether a missing output after a zero-exit run is an error.
    pub required: bool,
}

/// Resource limits enforced by the sandbox (§4.F), best-effort on platforms
/// that cannot enforce all of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_memory_bytes: Option<u64>,
    pub max_cpu_seconds: Option<u64>,
    pub max_open_files: Option<u64>,
}

/// Network access policy for a sandboxed action (§4.F). Defaults to fully
/// isolated; an action must opt into network access explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkPolicy {
    #[default]
    Isolated,
    Allowed,
}

/// A fully-resolved unit of executable work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub target: TargetId,
    pub command: Vec<String>,
    /// Sorted by key; fingerprinting depends on this ordering being stable.
    pub env: BTreeMap<String, String>,
    /// Environment variable names inherited from the invoking process,
    /// rather than explicitly set in `env` (§4.F capability `E`).
    pub env_allowlist: Vec<String>,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
    pub working_dir: PathBuf,
    pub limits: ResourceLimits,
    pub network: NetworkPolicy,
    pub timeout: Duration,
    /// Opaque tool identity (compiler version string, interpreter path,
    /// etc.) folded into the action fingerprint so a toolchain upgrade
    /// invalidates cached results without touching any declared input.
    pub tool_version: String,
    /// The target's opaque per-language configuration (§3 `Target.config`),
    /// carried through verbatim so two targets that differ only here never
    /// collide on the same fingerprint. Key-sorted so its JSON serialization
    /// is stable across runs.
    pub config: BTreeMap<String, serde_json::Value>,
}

impl ActionSpec {
    /// Input paths specifically marked [`InputKind::Source`], the set an
    /// incremental rebuild keys invalidation on.
    pub fn source_inputs(&self) -> impl Iterator<Item = &InputSpec> {
        self.inputs.iter().filter(|i| i.kind == InputKind::Source)
    }

    /// True if the action declares no outputs at all under `T` (the temp
    /// set) — a pure side-effect action, e.g. a test binary invocation.
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }
}
