// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! CLI argument parsing with clap derive (§10.O).
//!
//! Thin on purpose: this crate's job is to drive the core engine, not to be
//! a product surface. Every subcommand maps to exactly one abstract
//! operation from §6 — no interactive prompts, no shell completions, no
//! TUI.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DeterminismMode;

/// Content-addressed, incremental build engine for polyglot monorepos.
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the workspace's `forge.toml`. Discovered by walking up from
    /// the current directory when omitted.
    #[arg(short = 'C', long = "config", global = true, env = "FORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the scheduler's worker count; defaults to the config file's
    /// `scheduler.max_parallelism`, or available CPU parallelism.
    #[arg(long, global = true, env = "FORGE_PARALLELISM")]
    pub parallelism: Option<usize>,

    /// Override the sandbox's determinism enforcement mode.
    #[arg(long, global = true, env = "FORGE_DETERMINISM", value_enum)]
    pub determinism: Option<DeterminismModeArg>,

    #[command(subcommand)]
    pub command: Command,
}

/// `clap::ValueEnum` mirror of [`DeterminismMode`] — kept separate so the
/// config module's own `Deserialize` impl doesn't have to also satisfy
/// clap's trait.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum DeterminismModeArg {
    Off,
    Warn,
    Strict,
}

impl From<DeterminismModeArg> for DeterminismMode {
    fn from(arg: DeterminismModeArg) -> Self {
        match arg {
            DeterminismModeArg::Off => DeterminismMode::Off,
            DeterminismModeArg::Warn => DeterminismMode::Warn,
            DeterminismModeArg::Strict => DeterminismMode::Strict,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a target and its transitive dependencies.
    Build(TargetArgs),
    /// Build a target, then run its test-typed dependents.
    Test(TargetArgs),
    /// Remove the local cache and output directories.
    Clean,
    /// Emit the dependency graph rooted at a target.
    Graph(TargetArgs),
    /// Evaluate a query expression against the graph (`all`, `deps(id)`,
    /// `dependents(id)`).
    Query(QueryArgs),
    /// Continue an interrupted build from its last checkpoint.
    Resume(ResumeArgs),
    /// Run the verification suite (acyclicity, hermeticity, determinism,
    /// race-freedom) and print the resulting certificate.
    Verify(TargetArgs),
}

#[derive(clap::Args)]
pub struct TargetArgs {
    /// Target id, e.g. `//services/api:server`. Omit to operate on every
    /// target the workspace declares.
    pub target: Option<String>,
}

#[derive(clap::Args)]
pub struct QueryArgs {
    /// Query expression: `all`, `deps(<target>)`, or `dependents(<target>)`.
    pub expression: String,
}

#[derive(clap::Args)]
pub struct ResumeArgs {
    /// How to treat targets the checkpoint recorded as failed.
    #[arg(long, value_enum, default_value = "smart")]
    pub strategy: ResumeStrategyArg,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ResumeStrategyArg {
    Smart,
    RetryFailed,
    SkipFailed,
    RebuildAll,
}

impl From<ResumeStrategyArg> for crate::checkpoint::ResumeStrategy {
    fn from(arg: ResumeStrategyArg) -> Self {
        match arg {
            ResumeStrategyArg::Smart => crate::checkpoint::ResumeStrategy::Smart,
            ResumeStrategyArg::RetryFailed => crate::checkpoint::ResumeStrategy::RetryFailed,
            ResumeStrategyArg::SkipFailed => crate::checkpoint::ResumeStrategy::SkipFailed,
            ResumeStrategyArg::RebuildAll => crate::checkpoint::ResumeStrategy::RebuildAll,
        }
    }
}
