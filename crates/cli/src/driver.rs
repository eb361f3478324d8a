// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Language driver registry (§10.Q).
//!
//! A [`LanguageDriver`] turns a resolved [`Target`] into an [`ActionSpec`]
//! the executor can run, and optionally analyzes its sources for imports the
//! declared `deps` list didn't capture (fed into incremental invalidation,
//! §4.K). Drivers are looked up by the target's `language` tag string, so
//! adding support for a new toolchain never touches the scheduler or
//! executor — only the registry.
//!
//! This crate ships one reference driver, [`GenericDriver`], which treats
//! `command` as already fully resolved and does no import analysis. It
//! covers the `generic`/`custom` case and is the fallback when no more
//! specific driver is registered for a tag.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::action::{ActionSpec, InputKind, InputSpec, NetworkPolicy, OutputSpec, ResourceLimits};
use crate::config::SandboxConfig;
use crate::error::Result;
use crate::graph::Target;

/// Default wall-clock budget for an action with no target-specific override.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Per-language hook into action construction and source analysis.
///
/// Implementations must be side-effect free and safe to call concurrently
/// from multiple worker threads (§4.H schedules actions across a pool).
pub trait LanguageDriver: Send + Sync {
    /// The `language` tag this driver answers to, e.g. `"rust"`.
    fn tag(&self) -> &str;

    /// Build the action this target's build step requires.
    fn build_action(&self, target: &Target, sandbox: &SandboxConfig) -> Result<ActionSpec>;

    /// Scan a target's sources for ecosystem-internal imports not already
    /// captured by its declared `deps`. Returns target ids the analyzer
    /// should fold into the dependency graph as additional edges. The
    /// default implementation finds nothing, which is correct for any
    /// language without a static, source-level import syntax forge can
    /// cheaply parse.
    fn analyze_imports(&self, _target: &Target) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// The output paths this driver expects its action to produce, used to
    /// validate a target declaration before it ever reaches the executor.
    fn declared_outputs(&self, target: &Target) -> Vec<PathBuf> {
        target.output_path.iter().cloned().collect()
    }
}

/// Reference driver: the target's declared `command`, `srcs`, and `output`
/// are taken at face value. No import analysis.
pub struct GenericDriver;

impl LanguageDriver for GenericDriver {
    fn tag(&self) -> &str {
        "generic"
    }

    fn build_action(&self, target: &Target, sandbox: &SandboxConfig) -> Result<ActionSpec> {
        let inputs = target
            .sources
            .iter()
            .cloned()
            .map(|path| InputSpec {
                path,
                kind: InputKind::Source,
            })
            .chain(
                target
                    .dependency_outputs
                    .iter()
                    .cloned()
                    .map(|path| InputSpec {
                        path,
                        kind: InputKind::DependencyOutput,
                    }),
            )
            .collect();

        let outputs = target
            .output_path
            .iter()
            .cloned()
            .map(|path| OutputSpec {
                path,
                required: true,
            })
            .collect();

        Ok(ActionSpec {
            target: target.id.clone(),
            command: target.command.clone(),
            env: target.env.clone(),
            env_allowlist: sandbox.env_allowlist.clone(),
            inputs,
            outputs,
            working_dir: PathBuf::from("."),
            limits: ResourceLimits::default(),
            network: if sandbox.allow_network {
                NetworkPolicy::Allowed
            } else {
                NetworkPolicy::Isolated
            },
            timeout: DEFAULT_TIMEOUT,
            tool_version: "generic-1".to_string(),
            config: target.config.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }
}

/// Dispatches targets to the driver registered for their `language` tag,
/// falling back to [`GenericDriver`] for any tag without a specific match.
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn LanguageDriver>>,
    fallback: Arc<dyn LanguageDriver>,
}

impl DriverRegistry {
    /// A registry with only the generic driver registered, also serving as
    /// the fallback for unknown tags.
    pub fn with_generic() -> Self {
        let generic: Arc<dyn LanguageDriver> = Arc::new(GenericDriver);
        let mut drivers: BTreeMap<String, Arc<dyn LanguageDriver>> = BTreeMap::new();
        drivers.insert(generic.tag().to_string(), generic.clone());
        Self {
            drivers,
            fallback: generic,
        }
    }

    pub fn register(&mut self, driver: Arc<dyn LanguageDriver>) {
        self.drivers.insert(driver.tag().to_string(), driver);
    }

    pub fn resolve(&self, language: &str) -> Arc<dyn LanguageDriver> {
        self.drivers
            .get(language)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_generic()
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
