#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::path::PathBuf;

use super::*;
use crate::graph::TargetId;

fn transient_error() -> Error {
    Error::Io {
        path: PathBuf::from("x"),
        source: std::io::Error::other("boom"),
    }
}

fn non_retryable_error() -> Error {
    Error::ActionFailed {
        target: TargetId::new("//a:a"),
        code: Some(1),
    }
}

#[test]
fn retries_transient_errors_within_budget() {
    let policy = RetryPolicy::from(&RetryConfig::default());
    assert!(policy.should_retry(&transient_error(), 0));
    assert!(policy.should_retry(&transient_error(), 2));
    assert!(!policy.should_retry(&transient_error(), 3));
}

#[test]
fn never_retries_non_transient_errors() {
    let policy = RetryPolicy::from(&RetryConfig::default());
    assert!(!policy.should_retry(&non_retryable_error(), 0));
}

#[test]
fn disabled_policy_never_retries() {
    let mut config = RetryConfig::default();
    config.enabled = false;
    let policy = RetryPolicy::from(&config);
    assert!(!policy.should_retry(&transient_error(), 0));
}

#[test]
fn delay_grows_exponentially_and_caps() {
    let policy = RetryPolicy::from(&RetryConfig::default());
    let first = policy.delay_for(1, 0);
    let second = policy.delay_for(2, 0);
    assert!(second >= first);

    let far = policy.delay_for(20, 0);
    assert!(far.as_millis() as u64 <= RetryConfig::default().max_delay_ms * 2);
}
