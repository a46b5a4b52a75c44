//! HTTP routes.
//!
//! Every handler reads channel data through [`ReleaseCache::get`], which
//! revalidates stale channels before answering.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;

use crate::cache::{Channel, ChannelState, ReleaseCache};
use crate::download::{self, DownloadTarget};
use crate::error::{DecisionError, UpstreamError};
use crate::github::ListReleases;
use crate::http::HttpClient;
use crate::platform::{PlatformTag, from_user_agent};
use crate::update::{self, UpdateDecision};

/// Shared state of all handlers.
pub struct AppState<S: ListReleases> {
    pub cache: ReleaseCache<S>,
    /// Client used to resolve proxied downloads
    pub http_client: HttpClient,
}

impl<S: ListReleases> AppState<S> {
    pub fn new(cache: ReleaseCache<S>, http_client: HttpClient) -> Self {
        Self { cache, http_client }
    }
}

/// Query parameters shared by all routes.
#[derive(Debug, Default, Deserialize)]
pub struct RequestQuery {
    pub channel: Option<String>,
    pub update: Option<String>,
}

impl RequestQuery {
    pub fn channel(&self) -> Channel {
        Channel::from_query(self.channel.as_deref())
    }

    /// Set when the in-app updater, not a browser, asks for a download.
    pub fn is_update(&self) -> bool {
        self.update.as_deref().is_some_and(|v| !v.is_empty())
    }
}

pub fn router<S: ListReleases + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/download", get(download_handler::<S>))
        .route("/download/{platform}", get(download_platform_handler::<S>))
        .route("/update/{platform}/{version}", get(update_handler::<S>))
        .route(
            "/update/{platform}/{version}/RELEASES",
            get(releases_handler::<S>),
        )
        .with_state(state)
}

/// Binds `addr` and serves the routes until the process ends.
pub async fn serve<S: ListReleases + 'static>(
    state: Arc<AppState<S>>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn load<S: ListReleases>(
    state: &AppState<S>,
    channel: Channel,
) -> Result<ChannelState, Response> {
    state.cache.get(channel).await.map_err(upstream_failure)
}

fn upstream_failure(e: UpstreamError) -> Response {
    error!("Could not load releases: {}", e);
    (
        StatusCode::BAD_GATEWAY,
        "Could not load releases from upstream",
    )
        .into_response()
}

fn decision_failure(e: DecisionError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.code(), "message": e.to_string() })),
    )
        .into_response()
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn update_handler<S: ListReleases>(
    State(state): State<Arc<AppState<S>>>,
    Path((platform, version)): Path<(String, String)>,
    Query(query): Query<RequestQuery>,
) -> Response {
    if let Err(e) = update::validate(&platform, &version) {
        warn!("Rejected update check {}/{}: {}", platform, version, e);
        return decision_failure(e);
    }

    let channel = query.channel();
    let snapshot = match load(&state, channel).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let private = state.cache.config().private.as_ref();
    match update::decide(&platform, &version, &snapshot, channel, private) {
        Ok(UpdateDecision::Manifest(manifest)) => Json(manifest).into_response(),
        Ok(UpdateDecision::NoUpdate) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => decision_failure(e),
    }
}

async fn releases_handler<S: ListReleases>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<RequestQuery>,
) -> Response {
    let snapshot = match load(&state, query.channel()).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    match snapshot.manifest() {
        Some(content) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            content.to_string(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn download_platform_handler<S: ListReleases>(
    State(state): State<Arc<AppState<S>>>,
    Path(platform): Path<String>,
    Query(query): Query<RequestQuery>,
) -> Response {
    let Some(tag) = download::resolve_platform(&platform, query.is_update()) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "The specified platform is not valid",
        )
            .into_response();
    };

    send_download(
        &state,
        tag,
        query.channel(),
        "No download available for your platform",
    )
    .await
}

async fn download_handler<S: ListReleases>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<RequestQuery>,
    headers: HeaderMap,
) -> Response {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(tag) = from_user_agent(user_agent, query.is_update()) else {
        return (
            StatusCode::NOT_FOUND,
            "No download available for your platform!",
        )
            .into_response();
    };

    send_download(
        &state,
        tag,
        query.channel(),
        "No download available for your platform!",
    )
    .await
}

async fn send_download<S: ListReleases>(
    state: &AppState<S>,
    platform: PlatformTag,
    channel: Channel,
    not_found: &'static str,
) -> Response {
    let snapshot = match load(state, channel).await {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    let private = state.cache.config().private.as_ref();
    match download::resolve(platform, &snapshot, private, &state.http_client).await {
        Ok(DownloadTarget::Redirect(location)) => redirect(&location),
        Ok(DownloadTarget::NotFound) => (StatusCode::NOT_FOUND, not_found).into_response(),
        Err(e) => {
            error!("Proxying {} download failed: {}", platform, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not resolve the download",
            )
                .into_response()
        }
    }
}
