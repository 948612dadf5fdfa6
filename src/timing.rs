//! Deadline and retry combinators.
//!
//! Every suspension point in the pipeline goes through [`with_deadline`]; the
//! interaction step is the only one wrapped in [`with_retry`].

use std::future::Future;
use std::time::Duration;

use crate::error::HarvestError;

/// Wall-clock budgets for each suspension point of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deadlines {
    pub initial_navigation: Duration,
    pub resolve: Duration,
    pub visibility: Duration,
    pub navigation: Duration,
    pub readiness: Duration,
    pub extraction: Duration,
    pub capture: Duration,
    pub recovery: Duration,
    pub poll_interval: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            initial_navigation: Duration::from_secs(60),
            resolve: Duration::from_secs(10),
            visibility: Duration::from_secs(5),
            navigation: Duration::from_secs(60),
            readiness: Duration::from_secs(10),
            extraction: Duration::from_secs(30),
            capture: Duration::from_secs(30),
            recovery: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
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

/// Race `fut` against a timer; the first to settle decides the outcome.
///
/// Expiry drops the pending future and yields [`HarvestError::Timeout`]. Work
/// already dispatched to the browser is not interrupted.
pub async fn with_deadline<F, T, E>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, HarvestError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<HarvestError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(HarvestError::Timeout { operation, limit }),
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping `policy.backoff`
/// between failed attempts. The final failure is returned unchanged.
///
/// `on_retry` sees the attempt number (1-based) and error of every attempt
/// that is going to be retried.
pub async fn with_retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_retry: R,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(u32, &E),
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                on_retry(attempt, &err);
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
