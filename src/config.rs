//! Validated process configuration.

use std::time::Duration;

use crate::error::ConfigError;
use crate::github::{DEFAULT_API_URL, GitHubRepo};

/// Minutes between upstream revalidations when nothing else is configured.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 15;

/// Raw configuration values as they come from flags or the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub account: Option<String>,
    pub repository: Option<String>,
    pub token: Option<String>,
    pub url: Option<String>,
    /// Minutes
    pub interval: Option<u64>,
    pub pre: bool,
    pub api_url: Option<String>,
}

/// Credentials and public address used to proxy private-repository downloads.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateRepo {
    pub token: String,
    /// Public base URL of this service, e.g. `https://updates.example.com`
    pub base_url: String,
}

impl std::fmt::Debug for PrivateRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateRepo")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub repo: GitHubRepo,
    /// Set when a token is configured; implies a public base URL
    pub private: Option<PrivateRepo>,
    pub interval: Duration,
    /// Serve prereleases on the stable channel too
    pub pre: bool,
    pub api_url: String,
}

impl Config {
    /// Validates raw options. Fails when the repository is incomplete or when
    /// a token is given without the public URL private mode redirects to.
    pub fn new(options: ConfigOptions) -> Result<Self, ConfigError> {
        let account = non_empty(options.account).ok_or(ConfigError::MissingRepository)?;
        let repository = non_empty(options.repository).ok_or(ConfigError::MissingRepository)?;
        let url = non_empty(options.url).map(|u| u.trim_end_matches('/').to_string());

        let private = match non_empty(options.token) {
            Some(token) => {
                let base_url = url.ok_or(ConfigError::MissingBaseUrl)?;
                Some(PrivateRepo { token, base_url })
            }
            None => None,
        };

        let interval = options.interval.unwrap_or(DEFAULT_INTERVAL_MINUTES);
        let api_url = non_empty(options.api_url)
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            repo: GitHubRepo::new(account, repository),
            private,
            interval: Duration::from_secs(interval.saturating_mul(60)),
            pre: options.pre,
            api_url,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.private.as_ref().map(|p| p.token.as_str())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
