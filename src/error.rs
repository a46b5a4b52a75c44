//! Error types shared by the release cache and the request handlers.
//!
//! The split follows how each failure is handled:
//! - [`ConfigError`] is fatal, the cache is never built.
//! - [`UpstreamError`] aborts a refresh; the cached state stays as it was and
//!   the next request tries again.
//! - [`ManifestError`] is logged and swallowed while a channel is rebuilt.
//! - [`DecisionError`] and [`DownloadError`] are reported to the client.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Invalid process configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Neither ACCOUNT, nor REPOSITORY are defined")]
    MissingRepository,

    #[error("URL must be defined when TOKEN is set, it is mandatory for private repo mode")]
    MissingBaseUrl,
}

/// Failure talking to the release hosting API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-200 response, after all retries were used up.
    #[error("upstream responded with {status} for {url}")]
    Status { status: StatusCode, url: String },

    /// Transport failure (connect, TLS, body read).
    #[error("request to upstream failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body could not be interpreted.
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// Failure of a refresh attempt, handed to every caller that waited on it.
    #[error(transparent)]
    Shared(Arc<UpstreamError>),
}

impl UpstreamError {
    /// HTTP status of the last attempt, if the upstream answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Request(e) => e.status(),
            UpstreamError::Malformed(_) => None,
            UpstreamError::Shared(e) => e.status(),
        }
    }
}

/// A `RELEASES` file without a single package reference.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("RELEASES content doesn't contain any .nupkg reference")]
pub struct ManifestParseError;

/// Failure producing the rewritten `RELEASES` file.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to fetch RELEASES: {0}")]
    Fetch(#[from] UpstreamError),

    #[error(transparent)]
    Parse(#[from] ManifestParseError),
}

/// Rejected client input on the update endpoint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("The specified version is not SemVer-compatible")]
    InvalidVersion(String),

    #[error("The specified platform is not valid")]
    InvalidPlatform(String),
}

impl DecisionError {
    /// Machine readable error code sent in the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            DecisionError::InvalidVersion(_) => "version_invalid",
            DecisionError::InvalidPlatform(_) => "invalid_platform",
        }
    }
}

/// Failure resolving a proxied private-repository download.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("upstream answered {0} without a Location header")]
    MissingLocation(StatusCode),
}
