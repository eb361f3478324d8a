// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the core returns [`Error`]. Variants are grouped
//! by the policy categories the scheduler and executor dispatch on: transient
//! errors are retried, configuration/graph errors abort the build, build errors
//! mark a single node failed without aborting independent branches, and
//! integrity errors invalidate cache state but may still let the build continue.

use std::path::PathBuf;

use crate::graph::TargetId;

/// Forge error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ---- Transient: retried by the executor with backoff ----
    /// I/O failure reading/writing a file.
    #[error("io error: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote cache tier unreachable or returned a retriable status.
    #[error("network error: {0}")]
    Network(String),

    /// A cache tier failed to load an entry that should have existed.
    #[error("cache load failed: {0}")]
    CacheLoadFailed(String),

    /// Sandboxed process exceeded its timeout.
    #[error("action {target} timed out after {elapsed_ms}ms")]
    ProcessTimeout { target: TargetId, elapsed_ms: u64 },

    // ---- Configuration: fail fast, no retry ----
    /// A required field was missing from a declaration.
    #[error("missing field `{field}` on {target}")]
    MissingField { target: TargetId, field: String },

    /// A source glob pattern failed to parse.
    #[error("invalid glob `{pattern}`: {message}")]
    InvalidGlob { pattern: String, message: String },

    /// A configuration field held an invalid value.
    #[error("invalid config value for `{field}`: {message}")]
    InvalidConfigValue { field: String, message: String },

    // ---- Graph: fail fast, abort build ----
    /// A dependency cycle was detected during topological sort.
    #[error("circular dependency: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<TargetId> },

    /// A declared target id does not exist.
    #[error("target not found: {id}{}", format_suggestions(.suggestions))]
    TargetNotFound {
        id: TargetId,
        suggestions: Vec<TargetId>,
    },

    /// A dependency reference resolved to no known target.
    #[error("missing dependency `{dependency}` declared by {target}")]
    MissingDependency {
        target: TargetId,
        dependency: TargetId,
    },

    /// An illegal node status transition was attempted.
    #[error("invalid status transition for {target}: {from:?} -> {to:?}")]
    InvalidTransition {
        target: TargetId,
        from: crate::graph::Status,
        to: crate::graph::Status,
    },

    // ---- Build: report target-level, never retried ----
    /// The action's command exited non-zero.
    #[error("action failed for {target}: exit code {code:?}")]
    ActionFailed { target: TargetId, code: Option<i32> },

    // ---- Integrity: invalidate, report, continue if recoverable ----
    /// A blob's on-disk bytes no longer match its content hash.
    #[error("corrupted blob {hash}")]
    Corrupted { hash: String },

    /// Output hashes differed across two hermetic executions of the same action.
    #[error("determinism violation for {target}: {diff}")]
    DeterminismViolation { target: TargetId, diff: String },

    /// The sandbox observed an access outside its declared I/O sets.
    #[error("sandbox escape attempt for {target}: {path}")]
    SandboxEscape { target: TargetId, path: PathBuf },

    // ---- Sandbox setup ----
    /// The platform sandbox strategy refused to materialize.
    #[error("sandbox setup failed for {target}: {message}")]
    SandboxSetupFailed { target: TargetId, message: String },

    /// A declared resource limit was exceeded.
    #[error("resource limit exceeded for {target}: {message}")]
    ResourceLimitExceeded { target: TargetId, message: String },

    /// The action's process could not be spawned at all.
    #[error("failed to spawn process for {target}: {source}")]
    ProcessSpawnFailed {
        target: TargetId,
        #[source]
        source: std::io::Error,
    },

    // ---- Fatal: abort with diagnostic dump ----
    /// An internal invariant was violated; indicates a bug in forge itself.
    #[error("internal invariant broken: {0}")]
    Internal(String),

    /// Checkpoint or cache index binary format used an unrecognized version.
    #[error("unsupported on-disk format version {found} (expected {expected}) in {}", .path.display())]
    UnsupportedFormatVersion {
        path: PathBuf,
        found: u8,
        expected: u8,
    },

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),
}

fn format_cycle(cycle: &[TargetId]) -> String {
    cycle
        .iter()
        .map(TargetId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_suggestions(suggestions: &[TargetId]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    let names = suggestions
        .iter()
        .map(TargetId::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(" (did you mean: {names}?)")
}

/// Result type using the forge [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The error categories retry/abort policy is dispatched on (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Configuration,
    Graph,
    Build,
    Integrity,
    Fatal,
}

impl Error {
    /// Classify this error for retry/abort policy dispatch.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io { .. }
            | Error::Network(_)
            | Error::CacheLoadFailed(_)
            | Error::ProcessTimeout { .. } => ErrorCategory::Transient,

            Error::MissingField { .. }
            | Error::InvalidGlob { .. }
            | Error::InvalidConfigValue { .. } => ErrorCategory::Configuration,

            Error::CircularDependency { .. }
            | Error::TargetNotFound { .. }
            | Error::MissingDependency { .. }
            | Error::InvalidTransition { .. } => ErrorCategory::Graph,

            Error::ActionFailed { .. } => ErrorCategory::Build,

            Error::Corrupted { .. }
            | Error::DeterminismViolation { .. }
            | Error::SandboxEscape { .. } => ErrorCategory::Integrity,

            Error::SandboxSetupFailed { .. }
            | Error::ResourceLimitExceeded { .. }
            | Error::ProcessSpawnFailed { .. }
            | Error::Internal(_)
            | Error::UnsupportedFormatVersion { .. }
            | Error::Serialization(_) => ErrorCategory::Fatal,
        }
    }

    /// Whether the executor should retry this error under the retry policy (§4.J).
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Process exit codes per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// All targets built successfully.
    Success = 0,
    /// One or more targets failed to build.
    BuildFailed = 1,
    /// Configuration or argument error.
    UsageError = 2,
    /// Internal panic.
    InternalPanic = 139,
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Configuration | ErrorCategory::Graph => ExitCode::UsageError,
            ErrorCategory::Build => ExitCode::BuildFailed,
            ErrorCategory::Transient | ErrorCategory::Integrity => ExitCode::BuildFailed,
            ErrorCategory::Fatal => ExitCode::InternalPanic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        let err = Error::Io {
            path: PathBuf::from("x"),
            source: std::io::Error::other("boom"),
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn graph_errors_are_not_retryable() {
        let err = Error::CircularDependency {
            cycle: vec![TargetId::new("//a:a"), TargetId::new("//b:b")],
        };
        assert!(!err.is_retryable());
        assert_eq!(ExitCode::from(&err), ExitCode::UsageError);
    }

    #[test]
    fn cycle_formats_with_arrows() {
        let err = Error::CircularDependency {
            cycle: vec![
                TargetId::new("//x:x"),
                TargetId::new("//y:y"),
                TargetId::new("//z:z"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency: //x:x -> //y:y -> //z:z"
        );
    }

    #[test]
    fn build_failure_exit_code() {
        let err = Error::ActionFailed {
            target: TargetId::new("//a:a"),
            code: Some(1),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::BuildFailed);
    }
}
