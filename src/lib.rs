pub mod cache;
pub mod config;
pub mod download;
pub mod error;
pub mod github;
pub mod http;
pub mod manifest;
pub mod platform;
pub mod server;
pub mod update;
