//! Bounded retry with fixed backoff.
//!
//! Extracted from the boot path so the attempt/delay accounting can be unit
//! tested with an injected delay function instead of real time. The delay is
//! non-blocking; nothing else is held up while an attempt waits.

use std::future::Future;
use std::time::Duration;

/// Attempt bound and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// All attempts failed; carries the final error and how many ran.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the attempt bound is hit, sleeping via
/// `delay` between attempts. `op` receives the 1-based attempt number.
///
/// Exactly `max_attempts` invocations happen in the worst case, with
/// `max_attempts - 1` delays between them — never a delay after the last
/// failure.
pub async fn retry_with_backoff<T, E, F, Fut, D, DFut>(
    policy: RetryPolicy,
    mut op: F,
    mut delay: D,
) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: FnMut(Duration) -> DFut,
    DFut: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                tracing::warn!(attempt, max_attempts, %error, "attempt failed, retrying");
                attempt += 1;
                delay(policy.backoff).await;
            }
        }
    }
}

/// `retry_with_backoff` with the real clock.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, op: F) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff(policy, op, tokio::time::sleep).await
}
