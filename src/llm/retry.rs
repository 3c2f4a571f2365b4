//! Exponential backoff retry for opening completion requests.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::warn;

/// Configuration: 3 total attempts, base 1s, max 30s.
pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 30;

/// Retry an async operation with exponential backoff.
///
/// `attempt` is called up to `MAX_ATTEMPTS` times. An error for which
/// `is_retryable` returns false is returned immediately. Otherwise the task
/// sleeps for an exponentially increasing duration before the next attempt.
///
/// `wrap_exhausted` converts the last error into the appropriate
/// `RetriesExhausted` variant for the caller's error type.
pub async fn retry_with_backoff<T, E, Fut, F, R, W>(
    mut attempt: F,
    is_retryable: R,
    wrap_exhausted: W,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    W: FnOnce(E) -> E,
    E: std::fmt::Display,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(INITIAL_INTERVAL_SECS),
        max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempts = 0;

    loop {
        attempts += 1;

        let error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => e,
        };

        if attempts >= MAX_ATTEMPTS {
            return Err(wrap_exhausted(error));
        }

        warn!("Attempt {}/{} failed: {}", attempts, MAX_ATTEMPTS, error);
        if let Some(wait_duration) = backoff.next_backoff() {
            tokio::time::sleep(wait_duration).await;
        }
    }
}
