//! Upstream release listing against the GitHub REST API.

mod client;
mod repo;
mod types;

#[cfg(test)]
pub use client::MockListReleases;
pub use client::{DEFAULT_API_URL, GitHub, ListReleases, RELEASES_PER_PAGE};
pub use repo::GitHubRepo;
pub use types::{Release, ReleaseAsset};
