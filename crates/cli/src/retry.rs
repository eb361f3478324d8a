// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Retry policy for transient action failures (§4.J).
//!
//! Only [`crate::error::ErrorCategory::Transient`] failures are retried —
//! a configuration or graph error retrying would just fail the same way
//! again. Backoff is exponential with a multiplicative jitter so a burst of
//! simultaneously-failing actions (e.g. a remote cache blip) doesn't retry
//! in lockstep and immediately re-trigger the same contention.

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::Error;

/// Computes retry delays for one action's failure history. Stateless beyond
/// its configuration; the caller tracks attempt counts per node (§4.D's
/// `Node::retry_attempts`).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    enabled: bool,
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.backoff_multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Whether `error`, having already failed `attempts_so_far` times,
    /// should be retried at all.
    pub fn should_retry(&self, error: &Error, attempts_so_far: u32) -> bool {
        self.enabled && error.is_retryable() && attempts_so_far < self.max_attempts
    }

    /// The delay before retry number `attempt` (1-based), with up to 25%
    /// jitter added so concurrent retries of the same failure don't
    /// resynchronize. `seed` selects a deterministic pseudo-jitter per call
    /// site, so tests can assert exact bounds without real randomness.
    pub fn delay_for(&self, attempt: u32, seed: u64) -> Duration {
        let base_millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base_millis.min(self.max_delay.as_millis() as f64);
        let jitter_fraction = (seed % 1000) as f64 / 1000.0 * 0.25;
        let jittered = capped * (1.0 + jitter_fraction);
        Duration::from_millis(jittered.round() as u64)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
