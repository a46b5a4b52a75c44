//! HTTP client with built-in retry logic and error handling.

use anyhow::Result;
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::retry::{RetryPolicy, check_status, with_retry};
use crate::error::UpstreamError;

/// Media type the releases API is queried with.
pub const GITHUB_ACCEPT: &str = "application/vnd.github.preview";

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = concat!("updraft/", env!("UPDRAFT_VERSION"));

/// HTTP client for upstream calls.
///
/// Holds two reqwest clients: the regular one follows redirects and carries
/// the API token, the other never follows redirects so that proxied downloads
/// can hand the upstream `Location` to the caller.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    redirect_client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Wraps existing reqwest clients.
    pub fn new(client: Client, redirect_client: Client) -> Self {
        Self {
            client,
            redirect_client,
            retry: RetryPolicy::default(),
        }
    }

    /// Builds both clients, authenticating API calls with `token` when present.
    pub fn with_token(token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let mut auth_value = HeaderValue::from_str(&format!("token {}", token))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
            debug!("Using token for authentication: *********{}", mask(token));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        let redirect_client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()?;

        Ok(Self::new(client, redirect_client))
    }

    /// Replaces the retry policy (tests use one without delays).
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Performs a GET request with query parameters and deserializes the JSON response.
    /// Retries on any non-200 answer.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        debug!("GET JSON from {} with query {:?}...", url, query);

        let response = self
            .send_with_retry("GET JSON", || self.client.get(url).query(query))
            .await?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    /// Performs a GET request and returns the body as text.
    /// Retries on any non-200 answer.
    #[tracing::instrument(skip(self))]
    pub async fn get_text(&self, url: &str) -> Result<String, UpstreamError> {
        debug!("GET text from {}...", url);

        let response = self
            .send_with_retry("GET text", || self.client.get(url))
            .await?;

        Ok(response.text().await?)
    }

    /// Requests `url` without following redirects and returns the answer's
    /// status and `Location` header. `username` is sent as basic-auth user.
    #[tracing::instrument(skip(self, username))]
    pub async fn redirect_location(
        &self,
        url: &str,
        accept: &str,
        username: &str,
    ) -> Result<(StatusCode, Option<String>), UpstreamError> {
        let response = self
            .redirect_client
            .get(url)
            .header(ACCEPT, accept)
            .basic_auth(username, None::<&str>)
            .send()
            .await?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!("{} answered {}", url, response.status());

        Ok((response.status(), location))
    }

    async fn send_with_retry<F>(
        &self,
        operation_name: &str,
        request: F,
    ) -> Result<Response, UpstreamError>
    where
        F: Fn() -> RequestBuilder,
    {
        let request = &request;
        with_retry(&self.retry, operation_name, move || async move {
            let response = request().send().await?;
            check_status(response)
        })
        .await
    }
}

/// Last four characters of a secret, for log lines.
fn mask(secret: &str) -> &str {
    let start = secret
        .char_indices()
        .rev()
        .nth(3)
        .map_or(secret.len(), |(i, _)| i);
    if secret.len() > 8 {
        &secret[start..]
    } else {
        ""
    }
}
