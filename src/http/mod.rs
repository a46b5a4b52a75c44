//! HTTP client module with retry logic and error handling.

mod client;
mod retry;

pub use client::{GITHUB_ACCEPT, HttpClient, USER_AGENT};
pub use retry::{
    BACKOFF_FACTOR, MAX_RETRIES, RETRY_DELAY_MS, RetryPolicy, check_status, with_retry,
};
