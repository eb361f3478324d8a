// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Parallel execution scheduler (§4.H).
//!
//! Drives a [`Graph`] to completion in rounds: collect every node whose
//! dependencies are already satisfied, hand the whole round to the
//! [`WorkerPool`] at once, apply the results, and repeat. A round only ever
//! grows as large as the graph's actual parallelism at that point — a
//! target with nine dependents doesn't start any of them until it finishes,
//! so the scheduler never needs to guess at concurrency beyond what the
//! graph's shape already allows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::checkpoint::Checkpoint;
use crate::config::{RetryConfig, SchedulerConfig};
use crate::driver::DriverRegistry;
use crate::error::Result;
use crate::executor::{ExecutionSource, Executor};
use crate::graph::{Graph, NodeIndex, Status, TargetId};
use crate::retry::RetryPolicy;
use crate::worker::WorkerPool;

/// Shared shutdown-coordinator flag (§4.H, §9: "signal handlers... write to
/// an atomic flag, have the scheduler poll it"). A signal handler installed
/// once at process start calls [`DrainFlag::set`]; the scheduler checks
/// [`DrainFlag::is_set`] before starting each new round, never mid-round, so
/// in-flight actions always finish (respecting their own timeouts) before
/// the build actually stops.
#[derive(Clone, Default)]
pub struct DrainFlag(Arc<AtomicBool>);

impl DrainFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A single target's final outcome for a completed (or aborted) build.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: TargetId,
    pub status: Status,
    pub error: Option<String>,
}

/// Summary of one scheduler run.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub targets: Vec<TargetReport>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.targets
            .iter()
            .all(|t| matches!(t.status, Status::Success | Status::Cached))
    }

    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets.iter().filter(|t| t.status == Status::Failed)
    }
}

/// Orchestrates a build: readiness rounds, dispatch to the worker pool,
/// status application, and retry-on-transient-failure.
pub struct Scheduler<'a> {
    graph: &'a Graph,
    executor: Executor,
    pool: WorkerPool,
    drivers: &'a DriverRegistry,
    sandbox: &'a crate::config::SandboxConfig,
    retry_policy: RetryPolicy,
    fail_fast: bool,
    drain: DrainFlag,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: &'a Graph,
        executor: Executor,
        scheduler_config: &SchedulerConfig,
        retry_config: &RetryConfig,
        drivers: &'a DriverRegistry,
        sandbox: &'a crate::config::SandboxConfig,
    ) -> Result<Self> {
        let parallelism = scheduler_config
            .max_parallelism
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
        let pool = WorkerPool::new(parallelism)?;

        Ok(Self {
            graph,
            executor,
            pool,
            drivers,
            sandbox,
            retry_policy: RetryPolicy::from(retry_config),
            fail_fast: scheduler_config.fail_fast,
            drain: DrainFlag::new(),
        })
    }

    /// Attach an externally-owned [`DrainFlag`] (typically one a signal
    /// handler installed at process start writes to) instead of the private
    /// one `new` creates. Replaces, rather than merges with, any prior flag.
    pub fn with_drain_flag(mut self, drain: DrainFlag) -> Self {
        self.drain = drain;
        self
    }

    /// Run the build to completion (every node reaches a terminal status, or
    /// the drain flag is set — by `fail_fast` after the first failure, or by
    /// an external signal handler). Returns a report covering every target
    /// the graph declares; a node never reaches `Building` once draining has
    /// begun, but whatever batch was already dispatched runs to completion.
    pub fn run(&self) -> Result<BuildReport> {
        self.graph.mark_all_ready()?;

        loop {
            if self.drain.is_set() {
                break;
            }
            let ready = self.graph.ready_nodes();
            if ready.is_empty() {
                break;
            }

            let mut batch = Vec::with_capacity(ready.len());
            for idx in ready {
                self.graph.mark(idx, Status::Building)?;
                let target = &self.graph.node_at(idx).target;
                let driver = self.drivers.resolve(&target.language);
                let spec = driver.build_action(target, self.sandbox)?;
                batch.push((idx, spec));
            }

            let results = self.pool.run_batch(&self.executor, batch);

            for result in results {
                self.apply_result(result.index, result.outcome)?;
                if self.fail_fast && self.graph.node_at(result.index).status() == Status::Failed {
                    self.drain.set();
                }
            }
        }

        Ok(self.report())
    }

    /// Resume a build from a previously saved checkpoint, then run any
    /// remaining work to completion.
    pub fn resume(&self, checkpoint: &Checkpoint, strategy: crate::checkpoint::ResumeStrategy) -> Result<BuildReport> {
        checkpoint.apply(self.graph, strategy)?;
        self.run()
    }

    fn apply_result(&self, idx: NodeIndex, outcome: Result<crate::executor::ExecutionOutcome>) -> Result<()> {
        match outcome {
            Ok(result) => {
                let status = match result.source {
                    ExecutionSource::Cached(_) => Status::Cached,
                    ExecutionSource::Ran => Status::Success,
                };
                self.graph.mark(idx, status)?;
                self.graph
                    .node_at(idx)
                    .set_cached_output_hash(*result.fingerprint.as_bytes());
                Ok(())
            }
            Err(error) => {
                let node = self.graph.node_at(idx);
                self.graph.mark(idx, Status::Failed)?;
                node.set_last_error(error.to_string());

                let attempts = node.increment_retry();
                if self.retry_policy.should_retry(&error, attempts - 1) {
                    let delay = self.retry_policy.delay_for(attempts, idx as u64);
                    std::thread::sleep(delay);
                    self.graph.mark(idx, Status::Ready)?;
                }
                Ok(())
            }
        }
    }

    fn report(&self) -> BuildReport {
        let targets = self
            .graph
            .all_indices()
            .map(|idx| {
                let node = self.graph.node_at(idx);
                TargetReport {
                    target: node.target.id.clone(),
                    status: node.status(),
                    error: node.last_error(),
                }
            })
            .collect();
        BuildReport { targets }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
