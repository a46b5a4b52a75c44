//! `RELEASES` manifest rewriting.
//!
//! Squirrel-style Windows updaters download `RELEASES` and then fetch every
//! package it lists relative to the manifest location. The cached copy lists
//! absolute URLs instead, so clients can fetch packages straight from the
//! release host.

use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};

use crate::error::{ManifestError, ManifestParseError};
use crate::http::HttpClient;

/// Asset name of the installer manifest.
pub const MANIFEST_FILE: &str = "RELEASES";

static PACKAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\S*\.nupkg").expect("valid regex"));

/// Fetches and rewrites `RELEASES` files.
pub struct ReleaseListRewriter {
    http_client: HttpClient,
}

impl ReleaseListRewriter {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    /// Downloads the manifest at `manifest_url` and returns it with every
    /// package reference replaced by an absolute URL.
    #[tracing::instrument(skip(self))]
    pub async fn rewrite(&self, manifest_url: &str) -> Result<String, ManifestError> {
        let content = self.http_client.get_text(manifest_url).await?;
        Ok(rewrite_content(&content, manifest_url)?)
    }
}

/// Replaces each `*.nupkg` token in `content` with the sibling URL of
/// `manifest_url`, i.e. the manifest URL with its last path segment swapped
/// for the package filename.
pub fn rewrite_content(content: &str, manifest_url: &str) -> Result<String, ManifestParseError> {
    let count = PACKAGE_TOKEN.find_iter(content).count();
    if count == 0 {
        return Err(ManifestParseError);
    }

    let base = match manifest_url.rsplit_once('/') {
        Some((base, _)) => base,
        None => manifest_url,
    };

    debug!("Rewriting {} package references against {}", count, base);

    let out = PACKAGE_TOKEN.replace_all(content, |c: &Captures| format!("{base}/{}", &c[0]));

    Ok(out.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RetryPolicy;

    const MANIFEST_URL: &str = "https://github.com/acme/app/releases/download/v1.2.3/RELEASES";

    #[test]
    fn test_rewrite_single_package() {
        let content = "0F1E2D3C app-1.2.3.nupkg 1234";
        let rewritten = rewrite_content(content, MANIFEST_URL).unwrap();
        assert_eq!(
            rewritten,
            "0F1E2D3C https://github.com/acme/app/releases/download/v1.2.3/app-1.2.3.nupkg 1234"
        );
    }

    #[test]
    fn test_rewrite_multiple_lines_and_case() {
        let content = "AAA app-1.2.2-full.nupkg 100\nBBB app-1.2.3-delta.NUPKG 20\n";
        let rewritten = rewrite_content(content, MANIFEST_URL).unwrap();
        assert_eq!(
            rewritten,
            "AAA https://github.com/acme/app/releases/download/v1.2.3/app-1.2.2-full.nupkg 100\n\
             BBB https://github.com/acme/app/releases/download/v1.2.3/app-1.2.3-delta.NUPKG 20\n"
        );
    }

    #[test]
    fn test_rewrite_repeated_token_is_not_double_prefixed() {
        let content = "A app.nupkg 1\nB app.nupkg 1";
        let rewritten = rewrite_content(content, MANIFEST_URL).unwrap();
        assert_eq!(rewritten.matches("https://").count(), 2);
        assert!(!rewritten.contains("v1.2.3/https://"));
    }

    #[test]
    fn test_rewrite_without_packages_fails() {
        assert_eq!(
            rewrite_content("nothing to see here", MANIFEST_URL),
            Err(ManifestParseError)
        );
        assert_eq!(rewrite_content("", MANIFEST_URL), Err(ManifestParseError));
    }

    #[tokio::test]
    async fn test_rewrite_fetches_manifest() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/download/v1.2.3/RELEASES", server.url());

        let mock = server
            .mock("GET", "/download/v1.2.3/RELEASES")
            .with_status(200)
            .with_body("ABC app-1.2.3.nupkg 42")
            .create_async()
            .await;

        let rewriter = ReleaseListRewriter::new(
            HttpClient::with_token(None)
                .unwrap()
                .with_retry_policy(RetryPolicy::immediate(0)),
        );
        let content = rewriter.rewrite(&url).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            content,
            format!("ABC {}/download/v1.2.3/app-1.2.3.nupkg 42", server.url())
        );
    }

    #[tokio::test]
    async fn test_rewrite_fetch_failure() {
        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/RELEASES", server.url());

        let _mock = server
            .mock("GET", "/RELEASES")
            .with_status(404)
            .create_async()
            .await;

        let rewriter = ReleaseListRewriter::new(
            HttpClient::with_token(None)
                .unwrap()
                .with_retry_policy(RetryPolicy::immediate(0)),
        );
        let result = rewriter.rewrite(&url).await;

        assert!(matches!(result, Err(ManifestError::Fetch(_))));
    }
}
