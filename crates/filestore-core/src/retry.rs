//! Generic retry executor.
//!
//! A [`RetryPolicy`] is a plain value: how many attempts in total and how long to
//! wait between them. Which failures are worth another attempt is decided by the
//! caller through an `is_retryable` predicate, so different layers can share the
//! executor while reacting to different failure classes.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn no_backoff(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Single attempt, never retried.
    pub fn once() -> Self {
        Self::no_backoff(1)
    }
}

/// Run `attempt_fn` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned unchanged.
pub async fn retry_with_policy<T, E, F, Fut, R>(
    policy: RetryPolicy,
    description: &str,
    mut attempt_fn: F,
    mut is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.backoff.as_millis() as u64,
                    description,
                    error = %e,
                    "Attempt failed, retrying"
                );
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
                attempt += 1;
            }
        }
    }
}
