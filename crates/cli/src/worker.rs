// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Worker pool (§4.I).
//!
//! Runs a batch of ready actions to completion concurrently, isolating each
//! action's outcome from the others: a batch item that errors never stops
//! its siblings from finishing. Built on a dedicated
//! [`rayon::ThreadPool`] rather than the global pool, so forge's own
//! parallelism cap (§4.H, `SchedulerConfig::max_parallelism`) is independent
//! of whatever else shares the process. Rayon's scheduler is work-stealing,
//! which satisfies the pool's own concurrency requirement without forge
//! re-implementing claim/steal bookkeeping by hand.

use rayon::ThreadPool;

use crate::error::Result;
use crate::executor::{ExecutionOutcome, Executor};
use crate::graph::NodeIndex;

/// The result of running one batch member.
pub struct JobResult {
    pub index: NodeIndex,
    pub outcome: Result<ExecutionOutcome>,
}

/// A bounded pool of worker threads that execute [`ActionSpec`]s produced
/// for a batch of ready graph nodes.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `parallelism` worker threads. `0` defers to
    /// rayon's own default (the available core count).
    pub fn new(parallelism: usize) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("forge-worker-{i}"));
        if parallelism > 0 {
            builder = builder.num_threads(parallelism);
        }
        let pool = builder
            .build()
            .map_err(|e| crate::error::Error::Internal(format!("failed to start worker pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Run a batch of actions against a shared [`Executor`] concurrently,
    /// one job per ready node, returning one [`JobResult`] per input once
    /// they have all finished. A job that produces an `Err` does not cancel
    /// the others in the batch.
    pub fn run_batch(
        &self,
        executor: &Executor,
        batch: Vec<(NodeIndex, crate::action::ActionSpec)>,
    ) -> Vec<JobResult> {
        use rayon::prelude::*;

        self.pool.install(|| {
            batch
                .into_par_iter()
                .map(|(index, spec)| JobResult {
                    index,
                    outcome: executor.execute(&spec),
                })
                .collect()
        })
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
