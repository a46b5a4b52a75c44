use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use super::repo::GitHubRepo;
use super::types::Release;
use crate::error::UpstreamError;
use crate::http::HttpClient;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Number of releases requested from the listing endpoint.
pub const RELEASES_PER_PAGE: &str = "100";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListReleases: Send + Sync {
    /// Lists the newest releases of `repo`, in upstream order (newest first).
    async fn list_releases(&self, repo: &GitHubRepo) -> Result<Vec<Release>, UpstreamError>;
}

pub struct GitHub {
    http_client: HttpClient,
    api_url: String,
}

impl GitHub {
    #[tracing::instrument(skip(http_client, api_url))]
    pub fn new(http_client: HttpClient, api_url: Option<String>) -> Self {
        let api_url = api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            http_client,
            api_url,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ListReleases for GitHub {
    #[tracing::instrument(skip(self))]
    async fn list_releases(&self, repo: &GitHubRepo) -> Result<Vec<Release>, UpstreamError> {
        let url = repo.releases_url(&self.api_url);

        debug!("Fetching releases from {}...", url);

        let value: Value = self
            .http_client
            .get_json_with_query(&url, &[("per_page", RELEASES_PER_PAGE)])
            .await?;

        // Anything but an array means there is nothing to mirror yet
        if !value.is_array() {
            warn!(
                "Expected a JSON array of releases from {}, got: {}",
                url, value
            );
            return Ok(Vec::new());
        }

        let releases: Vec<Release> = serde_json::from_value(value)
            .map_err(|e| UpstreamError::Malformed(format!("{}: {}", url, e)))?;

        debug!("Fetched {} releases for {}", releases.len(), repo);

        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RetryPolicy;
    use mockito::Matcher;
    use reqwest::StatusCode;

    fn github(url: &str, token: Option<&str>) -> GitHub {
        let http_client = HttpClient::with_token(token)
            .unwrap()
            .with_retry_policy(RetryPolicy::immediate(3));
        GitHub::new(http_client, Some(url.to_string()))
    }

    #[test]
    fn test_default_api_url() {
        let github = GitHub::new(HttpClient::with_token(None).unwrap(), None);
        assert_eq!(github.api_url(), "https://api.github.com");
    }

    #[tokio::test]
    async fn test_list_releases() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/repos/test-owner/test-repo/releases?per_page=100")
            .match_header("accept", "application/vnd.github.preview")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {
                        "tag_name": "v1.1.0-beta.1",
                        "draft": false,
                        "prerelease": true,
                        "body": "beta notes",
                        "published_at": "2024-02-01T00:00:00Z",
                        "assets": []
                    },
                    {
                        "tag_name": "v1.0.0",
                        "draft": false,
                        "prerelease": false,
                        "body": "notes",
                        "published_at": "2024-01-01T00:00:00Z",
                        "assets": [
                            {
                                "name": "App-1.0.0-mac.zip",
                                "url": "https://api.github.com/repos/test-owner/test-repo/releases/assets/1",
                                "browser_download_url": "https://github.com/test-owner/test-repo/releases/download/v1.0.0/App-1.0.0-mac.zip",
                                "content_type": "application/zip",
                                "size": 1234567
                            }
                        ]
                    }
                ]"#,
            )
            .create_async()
            .await;

        let releases = github(&url, None)
            .list_releases(&GitHubRepo::new("test-owner", "test-repo"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].tag_name, "v1.1.0-beta.1");
        assert!(releases[0].prerelease);
        assert_eq!(releases[1].tag_name, "v1.0.0");
        assert_eq!(releases[1].body.as_deref(), Some("notes"));
        assert_eq!(releases[1].assets[0].size, 1234567);
        assert_eq!(releases[1].assets[0].content_type, "application/zip");
    }

    #[tokio::test]
    async fn test_list_releases_sends_token() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/repos/o/r/releases?per_page=100")
            .match_header("authorization", "token abc123")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let releases = github(&url, Some("abc123"))
            .list_releases(&GitHubRepo::new("o", "r"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(releases.is_empty());
    }

    #[tokio::test]
    async fn test_list_releases_non_array_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/repos/o/r/releases?per_page=100")
            .with_status(200)
            .with_body(r#"{"message": "Moved Permanently"}"#)
            .create_async()
            .await;

        let releases = github(&url, None)
            .list_releases(&GitHubRepo::new("o", "r"))
            .await
            .unwrap();

        assert!(releases.is_empty());
    }

    #[tokio::test]
    async fn test_list_releases_wrong_shape_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let _mock = server
            .mock("GET", "/repos/o/r/releases?per_page=100")
            .with_status(200)
            .with_body(r#"[{"draft": false}]"#)
            .create_async()
            .await;

        let result = github(&url, None)
            .list_releases(&GitHubRepo::new("o", "r"))
            .await;

        assert!(matches!(result, Err(UpstreamError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_list_releases_not_found_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/repos/o/r/releases?per_page=100")
            .with_status(404)
            .expect(4)
            .create_async()
            .await;

        let result = github(&url, None)
            .list_releases(&GitHubRepo::new("o", "r"))
            .await;

        mock.assert_async().await;
        assert_eq!(result.unwrap_err().status(), Some(StatusCode::NOT_FOUND));
    }
}
