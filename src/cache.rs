//! Per-channel release cache.
//!
//! The cache keeps one snapshot per update channel and revalidates it against
//! the upstream release list when a request finds it missing or older than the
//! configured interval. There is no background poller.
//!
//! Each channel slot sits behind an async mutex that is held for the whole
//! refresh. Requests arriving while a refresh runs wait for it and then take
//! its outcome, fresh state or the shared error, so concurrent requests cause a
//! single upstream call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::UpstreamError;
use crate::github::{GitHub, ListReleases, Release, ReleaseAsset};
use crate::http::HttpClient;
use crate::manifest::{MANIFEST_FILE, ReleaseListRewriter};
use crate::platform::{DefaultPlatformResolver, PlatformResolver, PlatformTag};

/// Update track a client follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    #[default]
    Stable,
    Prerelease,
}

impl Channel {
    /// Channel selected by the `channel` query parameter.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("prerelease") => Channel::Prerelease,
            _ => Channel::Stable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Prerelease => "prerelease",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloadable artifact of the cached release.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub name: String,
    pub api_url: String,
    pub url: String,
    pub content_type: String,
    /// Megabytes, one decimal
    pub size: f64,
}

impl From<&ReleaseAsset> for Asset {
    fn from(asset: &ReleaseAsset) -> Self {
        Asset {
            name: asset.name.clone(),
            api_url: asset.url.clone(),
            url: asset.browser_download_url.clone(),
            content_type: asset.content_type.clone(),
            size: size_in_megabytes(asset.size),
        }
    }
}

/// Byte count as megabytes rounded half-up to one decimal.
pub fn size_in_megabytes(bytes: u64) -> f64 {
    (bytes as f64 / 1_000_000.0 * 10.0).round() / 10.0
}

/// Cached state of one channel. Handed out by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub version: Option<String>,
    pub notes: Option<String>,
    pub pub_date: Option<String>,
    pub platforms: HashMap<PlatformTag, Asset>,
    pub files: HashMap<String, String>,
}

impl ChannelState {
    pub fn asset(&self, platform: PlatformTag) -> Option<&Asset> {
        self.platforms.get(&platform)
    }

    /// The rewritten `RELEASES` file, if the release had one.
    pub fn manifest(&self) -> Option<&str> {
        self.files.get(MANIFEST_FILE).map(String::as_str)
    }
}

/// What a completed refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No release qualified for the channel; nothing changed
    NoRelease,
    /// The newest release is the cached one; only the timestamp moved
    Unchanged(String),
    /// The channel was rebuilt for this tag
    Updated(String),
}

#[derive(Debug, Default)]
struct ChannelSlot {
    state: ChannelState,
    last_refresh: Option<Instant>,
    /// Error of the last refresh attempt, `None` once one succeeds
    last_failure: Option<Arc<UpstreamError>>,
}

impl ChannelSlot {
    fn is_outdated(&self, interval: Duration) -> bool {
        self.last_refresh.is_some_and(|at| at.elapsed() > interval)
    }

    fn needs_refresh(&self, interval: Duration) -> bool {
        self.last_refresh.is_none() || self.is_outdated(interval)
    }
}

#[derive(Debug, Default)]
struct ChannelCell {
    slot: Mutex<ChannelSlot>,
    /// Completed refresh attempts, readable without taking the lock
    attempts: AtomicU64,
}

/// Pick the newest release for a channel from an upstream list (newest first).
pub fn select_release(releases: &[Release], prerelease: bool) -> Option<&Release> {
    releases
        .iter()
        .find(|r| !r.draft && r.prerelease == prerelease)
}

pub struct ReleaseCache<S: ListReleases = GitHub> {
    config: Config,
    source: S,
    rewriter: ReleaseListRewriter,
    resolver: Box<dyn PlatformResolver>,
    stable: ChannelCell,
    prerelease: ChannelCell,
}

impl ReleaseCache<GitHub> {
    /// Builds a cache backed by the GitHub API described in `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let http_client = HttpClient::with_token(config.token())?;
        let github = GitHub::new(http_client.clone(), Some(config.api_url.clone()));
        let rewriter = ReleaseListRewriter::new(http_client);
        Ok(Self::new(config, github, rewriter))
    }
}

impl<S: ListReleases> ReleaseCache<S> {
    pub fn new(config: Config, source: S, rewriter: ReleaseListRewriter) -> Self {
        Self {
            config,
            source,
            rewriter,
            resolver: Box::new(DefaultPlatformResolver),
            stable: ChannelCell::default(),
            prerelease: ChannelCell::default(),
        }
    }

    /// Replaces the asset classifier.
    pub fn with_resolver(mut self, resolver: impl PlatformResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn cell(&self, channel: Channel) -> &ChannelCell {
        match channel {
            Channel::Stable => &self.stable,
            Channel::Prerelease => &self.prerelease,
        }
    }

    /// True once the channel has been refreshed and the interval has passed
    /// since. A channel that was never refreshed is not outdated.
    pub async fn is_outdated(&self, channel: Channel) -> bool {
        self.cell(channel)
            .slot
            .lock()
            .await
            .is_outdated(self.config.interval)
    }

    /// When the channel last completed a refresh.
    pub async fn last_refreshed(&self, channel: Channel) -> Option<Instant> {
        self.cell(channel).slot.lock().await.last_refresh
    }

    /// Current state of `channel`, refreshed first if it was never loaded or
    /// has gone stale. On upstream failure the cached state is left as it was.
    ///
    /// A caller that waited while another one refreshed gets that attempt's
    /// outcome, even a failed one, instead of asking upstream again.
    pub async fn get(&self, channel: Channel) -> Result<ChannelState, UpstreamError> {
        let cell = self.cell(channel);
        let seen = cell.attempts.load(Ordering::Acquire);
        let mut slot = cell.slot.lock().await;

        if !slot.needs_refresh(self.config.interval) {
            debug!("Serving cached {} channel", channel);
            return Ok(slot.state.clone());
        }

        if cell.attempts.load(Ordering::Acquire) != seen {
            debug!("Taking outcome of the concurrent {} refresh", channel);
            return match &slot.last_failure {
                Some(e) => Err(UpstreamError::Shared(e.clone())),
                None => Ok(slot.state.clone()),
            };
        }

        self.attempt(channel, cell, &mut slot).await?;
        Ok(slot.state.clone())
    }

    /// Revalidates `channel` against upstream regardless of its age.
    pub async fn refresh(&self, channel: Channel) -> Result<RefreshOutcome, UpstreamError> {
        let cell = self.cell(channel);
        let mut slot = cell.slot.lock().await;
        self.attempt(channel, cell, &mut slot).await
    }

    /// Runs one refresh and records its outcome for callers queued on the lock.
    async fn attempt(
        &self,
        channel: Channel,
        cell: &ChannelCell,
        slot: &mut ChannelSlot,
    ) -> Result<RefreshOutcome, UpstreamError> {
        let result = self.refresh_slot(channel, slot).await.map_err(Arc::new);
        slot.last_failure = result.as_ref().err().cloned();
        cell.attempts.fetch_add(1, Ordering::Release);
        result.map_err(UpstreamError::Shared)
    }

    #[tracing::instrument(skip(self, slot))]
    async fn refresh_slot(
        &self,
        channel: Channel,
        slot: &mut ChannelSlot,
    ) -> Result<RefreshOutcome, UpstreamError> {
        info!("Refreshing {} channel...", channel);

        let releases = self
            .source
            .list_releases(&self.config.repo)
            .await
            .inspect_err(|e| error!("Refreshing {} channel failed: {}", channel, e))?;

        let want_prerelease = self.config.pre || channel == Channel::Prerelease;
        let Some(release) = select_release(&releases, want_prerelease) else {
            info!(
                "No release of {} qualifies for the {} channel",
                self.config.repo, channel
            );
            return Ok(RefreshOutcome::NoRelease);
        };

        let tag = release.tag_name.clone();
        debug!(
            "Latest version is {} (cached: {:?})",
            tag, slot.state.version
        );

        if slot.state.version.as_deref() == Some(tag.as_str()) {
            info!("Cached version {} is the same as latest", tag);
            slot.last_refresh = Some(Instant::now());
            return Ok(RefreshOutcome::Unchanged(tag));
        }

        info!("Caching version {}...", tag);
        slot.state = self.rebuild(release).await;
        slot.last_refresh = Some(Instant::now());
        info!("Finished caching version {}", tag);

        Ok(RefreshOutcome::Updated(tag))
    }

    /// Builds the channel state for `release`. A `RELEASES` file that cannot be
    /// fetched or parsed is logged and left out.
    async fn rebuild(&self, release: &Release) -> ChannelState {
        let mut state = ChannelState {
            version: Some(release.tag_name.clone()),
            notes: release.body.clone(),
            pub_date: release.published_at.clone(),
            ..Default::default()
        };

        for asset in &release.assets {
            if asset.name == MANIFEST_FILE {
                match self.rewriter.rewrite(&asset.browser_download_url).await {
                    Ok(content) => {
                        state.files.insert(MANIFEST_FILE.to_string(), content);
                    }
                    Err(e) => error!(
                        "Tried to cache {} of {}, but failed: {}",
                        MANIFEST_FILE, release.tag_name, e
                    ),
                }
                continue;
            }

            let Some(platform) = self.resolver.classify(&asset.name) else {
                debug!("Skipping asset {}: no matching platform", asset.name);
                continue;
            };

            state.platforms.insert(platform, Asset::from(asset));
        }

        state
    }
}
