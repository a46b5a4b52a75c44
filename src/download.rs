//! Download redirects for the cached release.
//!
//! Public repositories redirect straight to the asset's download URL. For
//! private repositories the asset API URL is requested with the token and the
//! short-lived `Location` it answers with is passed on, so the token itself
//! never reaches the client.

use log::{debug, info};

use crate::cache::ChannelState;
use crate::config::PrivateRepo;
use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::platform::{PlatformKind, PlatformTag, resolve_alias};

/// Accept header that makes the asset API answer with a redirect to the file.
const ASSET_ACCEPT: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    Redirect(String),
    NotFound,
}

/// Resolves the platform name of a `/download/{platform}` request.
///
/// Browsers asking for `mac` get the disk image; the updater (`update` set)
/// gets the zipped bundle `mac` stands for otherwise.
pub fn resolve_platform(name: &str, is_update: bool) -> Option<PlatformTag> {
    if !is_update {
        match name {
            "mac" => return Some(PlatformTag::new(PlatformKind::Dmg)),
            "mac_arm64" => return Some(PlatformTag::arm64(PlatformKind::Dmg)),
            _ => {}
        }
    }
    resolve_alias(name)
}

/// Where to send a client asking for `platform`.
#[tracing::instrument(skip(state, private, http_client))]
pub async fn resolve(
    platform: PlatformTag,
    state: &ChannelState,
    private: Option<&PrivateRepo>,
    http_client: &HttpClient,
) -> Result<DownloadTarget, DownloadError> {
    let Some(asset) = state.asset(platform) else {
        debug!("No {} asset cached", platform);
        return Ok(DownloadTarget::NotFound);
    };

    let Some(private) = private else {
        return Ok(DownloadTarget::Redirect(asset.url.clone()));
    };

    info!("Proxying private download of {}", asset.name);

    let (status, location) = http_client
        .redirect_location(&asset.api_url, ASSET_ACCEPT, &private.token)
        .await?;

    location
        .map(DownloadTarget::Redirect)
        .ok_or(DownloadError::MissingLocation(status))
}
