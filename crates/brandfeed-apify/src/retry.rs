//! Retry policy for Apify requests.
//!
//! Apify throttles per token and answers `429` with a `Retry-After` header;
//! that wait is honoured as given. Other transient failures (timeouts,
//! connection errors, 5xx) back off exponentially with jitter.

use std::future::Future;
use std::time::Duration;

use crate::error::ApifyError;

const MAX_DELAY: Duration = Duration::from_secs(60);

/// Returns `true` for errors that are worth retrying after a delay.
///
/// Other 4xx statuses (bad token, unknown task or dataset),
/// [`ApifyError::Config`] and [`ApifyError::Deserialize`] are final.
pub(crate) fn is_retriable(err: &ApifyError) -> bool {
    match err {
        ApifyError::RateLimited { .. } => true,
        ApifyError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ApifyError::Config(_) | ApifyError::Deserialize { .. } => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Backoff {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base: Duration,
}

impl Backoff {
    /// Wait before retry number `attempt` (1-based) after `err`.
    ///
    /// A server-provided `Retry-After` wins; otherwise `base × 2^(attempt-1)`
    /// with ±25 % jitter. Both are capped at one minute.
    pub(crate) fn delay(&self, attempt: u32, err: &ApifyError) -> Duration {
        if let ApifyError::RateLimited {
            retry_after: Some(wait),
        } = err
        {
            return (*wait).min(MAX_DELAY);
        }
        let exponential = self
            .base
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(10))
            .min(MAX_DELAY);
        exponential * rand::random_range(75..=125u32) / 100
    }

    /// Runs `operation` until it succeeds, fails for good, or the retry
    /// budget is spent.
    pub(crate) async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ApifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApifyError>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !is_retriable(&err) || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            let delay = self.delay(attempt, &err);
            tracing::warn!(
                attempt,
                max_retries = self.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "apify request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
