//! Retry policy for upstream requests.
//!
//! Any non-200 answer and any transport failure is retried. Only a response
//! that arrived but could not be understood is final.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Response, StatusCode};

use crate::error::UpstreamError;

/// Number of attempts after the first one.
pub const MAX_RETRIES: usize = 3;

/// Delay before the first retry in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Multiplier applied to the delay after every retry. The schedule is fixed,
/// without jitter.
pub const BACKOFF_FACTOR: u32 = 2;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_DELAY_MS),
            factor: BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Same number of attempts with no waiting in between.
    pub fn immediate(retries: usize) -> Self {
        Self {
            retries,
            base_delay: Duration::ZERO,
            factor: 1,
        }
    }

    /// Total number of attempts, including the first.
    pub fn attempts(&self) -> usize {
        self.retries + 1
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = self.factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier)
    }
}

/// Turns any answer other than 200 OK into an [`UpstreamError::Status`].
pub fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status == StatusCode::OK {
        Ok(response)
    } else {
        Err(UpstreamError::Status {
            status,
            url: response.url().to_string(),
        })
    }
}

fn is_retryable(e: &UpstreamError) -> bool {
    !matches!(e, UpstreamError::Malformed(_))
}

/// Executes an async operation until it succeeds or the policy is exhausted.
/// The error of the last attempt is returned.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, UpstreamError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) => {
                debug!("{}: non-retryable error: {}", operation_name, e);
                return Err(e);
            }
            Err(e) if attempt >= attempts => {
                warn!(
                    "{}: giving up after {} attempts ({})",
                    operation_name, attempts, e
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                    operation_name,
                    attempt,
                    attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
