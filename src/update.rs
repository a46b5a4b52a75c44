//! Update check for a client that reports its platform and version.
//!
//! Any difference between the cached and the reported version is answered
//! with an update, including a cached version lower than the client's. This
//! lets a release be pulled and users be moved back to an older build.

use std::cmp::Ordering;

use semver::Version;
use serde::Serialize;

use crate::cache::{Channel, ChannelState};
use crate::config::PrivateRepo;
use crate::error::DecisionError;
use crate::platform::{PlatformTag, resolve_alias};

/// Body of a positive update answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateManifest {
    pub name: String,
    pub notes: Option<String>,
    pub pub_date: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateDecision {
    NoUpdate,
    Manifest(UpdateManifest),
}

/// Parses version text the way clients send it: surrounding whitespace and a
/// leading `v` or `=` are accepted.
pub fn parse_version(text: &str) -> Option<Version> {
    let trimmed = text.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(bare).ok()
}

/// Semver precedence; build metadata does not take part.
fn compare_precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

fn same_version(cached: &str, client: &Version) -> bool {
    match parse_version(cached) {
        Some(cached) => compare_precedence(&cached, client) == Ordering::Equal,
        // Tags that are not semver can only match textually
        None => cached.strip_prefix('v').unwrap_or(cached) == client.to_string(),
    }
}

/// Checks the values a client put in the URL. The version is checked first.
pub fn validate(
    platform_name: &str,
    client_version: &str,
) -> Result<(PlatformTag, Version), DecisionError> {
    let version = parse_version(client_version)
        .ok_or_else(|| DecisionError::InvalidVersion(client_version.to_string()))?;

    let platform = resolve_alias(platform_name)
        .ok_or_else(|| DecisionError::InvalidPlatform(platform_name.to_string()))?;

    Ok((platform, version))
}

/// Decides whether a client on `platform_name` running `client_version`
/// should update to the cached release of `channel`.
///
/// In private mode the manifest points back at this service's download route
/// so that the asset can be fetched with the repository token.
pub fn decide(
    platform_name: &str,
    client_version: &str,
    state: &ChannelState,
    channel: Channel,
    private: Option<&PrivateRepo>,
) -> Result<UpdateDecision, DecisionError> {
    let (platform, version) = validate(platform_name, client_version)?;

    let (Some(asset), Some(latest)) = (state.asset(platform), state.version.as_deref()) else {
        return Ok(UpdateDecision::NoUpdate);
    };

    if same_version(latest, &version) {
        return Ok(UpdateDecision::NoUpdate);
    }

    let url = match private {
        Some(private) => proxied_download_url(&private.base_url, platform_name, channel),
        None => asset.url.clone(),
    };

    Ok(UpdateDecision::Manifest(UpdateManifest {
        name: latest.to_string(),
        notes: state.notes.clone(),
        pub_date: state.pub_date.clone(),
        url,
    }))
}

/// Download route of this service that proxies the asset for updaters.
pub fn proxied_download_url(base_url: &str, platform_name: &str, channel: Channel) -> String {
    match channel {
        Channel::Stable => format!("{}/download/{}?update=true", base_url, platform_name),
        Channel::Prerelease => format!(
            "{}/download/{}?update=true&channel={}",
            base_url, platform_name, channel
        ),
    }
}
