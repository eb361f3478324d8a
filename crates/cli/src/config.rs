// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Workspace configuration parsing (§10.M).
//!
//! `forge.toml` declares the workspace version, cache tiers, sandbox
//! policy, and the targets that make up the build graph. Every nested
//! struct denies unknown fields: a typo'd key fails the build rather than
//! being silently ignored, mirroring how forge treats any other
//! configuration error as fail-fast (§7, `ErrorCategory::Configuration`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Currently supported `forge.toml` schema version.
pub const SUPPORTED_VERSION: i64 = 1;

/// Minimal shape used to check the version before committing to strict
/// parsing, so a version mismatch reports a clear upgrade message instead
/// of a confusing `deny_unknown_fields` cascade from a newer schema.
#[derive(Deserialize)]
struct VersionOnly {
    version: Option<i64>,
}

/// Top-level workspace configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub version: i64,

    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub targets: Vec<TargetDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: Option<String>,

    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Root output directory for materialized artifacts, relative to the
    /// workspace root. Distinct from the cache directory: outputs here are
    /// what a human or downstream tool inspects after a build.
    #[serde(default = "ProjectConfig::default_output_dir")]
    pub output_dir: PathBuf,
}

impl ProjectConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from(".forge/out")
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            exclude: ExcludeConfig::default(),
            output_dir: Self::default_output_dir(),
        }
    }
}

/// Glob-based exclusion shared by the walker and the dependency analyzer.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Directory for the local CAS and action index, relative to the
    /// workspace root.
    #[serde(default = "CacheConfig::default_dir")]
    pub dir: PathBuf,

    /// Local store size budget in bytes. `None` disables eviction.
    #[serde(default)]
    pub max_bytes: Option<u64>,

    /// A cache entry older than this is never honored as a hit, even if
    /// its fingerprint matches and every blob is present (spec.md:114).
    #[serde(default = "CacheConfig::default_max_age_secs")]
    pub max_age_secs: u64,

    #[serde(default)]
    pub remote: Option<RemoteCacheSection>,
}

impl CacheConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(".forge/cache")
    }

    fn default_max_age_secs() -> u64 {
        // One week; generous enough that a routine dev-loop build never
        // expires its own entries, short enough to bound unbounded staleness.
        7 * 86_400
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            max_bytes: None,
            max_age_secs: Self::default_max_age_secs(),
            remote: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteCacheSection {
    pub endpoint: String,
    /// Name of an environment variable holding the bearer token, so the
    /// token itself never lands in a committed config file.
    pub auth_token_env: Option<String>,
    #[serde(default = "RemoteCacheSection::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl RemoteCacheSection {
    fn default_timeout_ms() -> u64 {
        10_000
    }
}

/// How strictly forge enforces the determinism invariant (§4.L, §9).
///
/// `Off` never re-runs an action to check it. `Warn` re-runs and logs a
/// diff without failing the build. `Strict` re-runs and turns a mismatch
/// into a [`crate::error::Error::DeterminismViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeterminismMode {
    #[default]
    Off,
    Warn,
    Strict,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    #[serde(default)]
    pub determinism: DeterminismMode,

    #[serde(default = "SandboxConfig::default_allow_network")]
    pub allow_network: bool,

    #[serde(default)]
    pub env_allowlist: Vec<String>,
}

impl SandboxConfig {
    fn default_allow_network() -> bool {
        false
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            determinism: DeterminismMode::default(),
            allow_network: Self::default_allow_network(),
            env_allowlist: Vec::new(),
        }
    }
}

/// Retry policy for transient-category errors (§4.J).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_enabled")]
    pub enabled: bool,

    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "RetryConfig::default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "RetryConfig::default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "RetryConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_max_attempts() -> u32 {
        3
    }
    fn default_initial_delay_ms() -> u64 {
        200
    }
    fn default_backoff_multiplier() -> f64 {
        2.0
    }
    fn default_max_delay_ms() -> u64 {
        10_000
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            max_attempts: Self::default_max_attempts(),
            initial_delay_ms: Self::default_initial_delay_ms(),
            backoff_multiplier: Self::default_backoff_multiplier(),
            max_delay_ms: Self::default_max_delay_ms(),
        }
    }
}

/// Checkpoint persistence policy for resuming an interrupted build (§4.J).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckpointConfig {
    #[serde(default = "CheckpointConfig::default_enabled")]
    pub enabled: bool,

    /// Checkpoints older than this are considered stale and ignored on
    /// resume, falling back to a full rebuild.
    #[serde(default = "CheckpointConfig::default_max_age_secs")]
    pub max_age_secs: u64,
}

impl CheckpointConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_max_age_secs() -> u64 {
        86_400
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            max_age_secs: Self::default_max_age_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Maximum concurrent actions. `None` means CPU count (§4.H).
    #[serde(default)]
    pub max_parallelism: Option<usize>,

    #[serde(default = "SchedulerConfig::default_fail_fast")]
    pub fail_fast: bool,
}

impl SchedulerConfig {
    fn default_fail_fast() -> bool {
        true
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallelism: None,
            fail_fast: Self::default_fail_fast(),
        }
    }
}

/// A target declaration as it appears in `forge.toml`, before the analyzer
/// resolves its glob sources and dependency references into a concrete
/// [`crate::graph::Target`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDecl {
    pub name: String,
    pub kind: TargetKindDecl,
    #[serde(default = "TargetDecl::default_language")]
    pub language: String,
    #[serde(default)]
    pub srcs: Vec<String>,
    #[serde(default)]
    pub deps: Vec<String>,
    pub output: Option<String>,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub config: std::collections::HashMap<String, serde_json::Value>,
}

impl TargetDecl {
    fn default_language() -> String {
        "generic".to_string()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKindDecl {
    Executable,
    Library,
    Test,
    Custom,
}

impl From<TargetKindDecl> for crate::graph::TargetKind {
    fn from(decl: TargetKindDecl) -> Self {
        match decl {
            TargetKindDecl::Executable => crate::graph::TargetKind::Executable,
            TargetKindDecl::Library => crate::graph::TargetKind::Library,
            TargetKindDecl::Test => crate::graph::TargetKind::Test,
            TargetKindDecl::Custom => crate::graph::TargetKind::Custom,
        }
    }
}

/// Name of a per-package target declaration file, discovered by the
/// gitignore-aware walker rather than listed in `forge.toml` itself — a
/// workspace's target graph grows one `BUILD.toml` per package, not one
/// ever-larger root file.
pub const BUILD_FILE_NAME: &str = "BUILD.toml";

/// Shape of a `BUILD.toml`: just the `targets` table, reusing [`TargetDecl`]
/// so a target looks identical whether declared there or inline in
/// `forge.toml` (small workspaces may use the latter exclusively).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildFile {
    #[serde(default)]
    targets: Vec<TargetDecl>,
}

/// Parse one `BUILD.toml` into its declared targets.
pub fn load_build_file(path: &Path) -> Result<Vec<TargetDecl>> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: BuildFile = toml::from_str(&content).map_err(|e| Error::InvalidConfigValue {
        field: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(file.targets)
}

/// Load and validate `forge.toml` from `path`.
pub fn load(path: &Path) -> Result<WorkspaceConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, path)
}

pub fn parse(content: &str, path: &Path) -> Result<WorkspaceConfig> {
    let version_check: VersionOnly =
        toml::from_str(content).map_err(|e| Error::InvalidConfigValue {
            field: "<root>".to_string(),
            message: e.to_string(),
        })?;

    let version = version_check
        .version
        .ok_or_else(|| Error::MissingField {
            target: crate::graph::TargetId::new(path.display().to_string()),
            field: "version".to_string(),
        })?;

    if version != SUPPORTED_VERSION {
        return Err(Error::UnsupportedFormatVersion {
            path: path.to_path_buf(),
            found: version as u8,
            expected: SUPPORTED_VERSION as u8,
        });
    }

    toml::from_str(content).map_err(|e| Error::InvalidConfigValue {
        field: "<root>".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
