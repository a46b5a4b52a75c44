use anyhow::Result;
use clap::Parser;
use log::info;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use updraft::cache::ReleaseCache;
use updraft::config::{Config, ConfigOptions, DEFAULT_INTERVAL_MINUTES};
use updraft::http::HttpClient;
use updraft::server::{self, AppState};

/// updraft - update server for desktop apps released on GitHub
///
/// Serves update checks, RELEASES files and download redirects for the
/// latest release of one repository.
///
/// If TOKEN is set the repository is treated as private: downloads are proxied
/// through this service, which then needs its public URL in URL.
#[derive(Parser, Debug)]
#[command(author, version = env!("UPDRAFT_VERSION"), about)]
struct Cli {
    /// GitHub account owning the repository
    #[arg(long, env = "ACCOUNT")]
    account: Option<String>,

    /// Repository name
    #[arg(long, env = "REPOSITORY")]
    repository: Option<String>,

    /// GitHub token for a private repository
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Public base URL of this service (required with TOKEN)
    #[arg(long, env = "URL")]
    url: Option<String>,

    /// Minutes a cached release stays fresh
    #[arg(long, env = "INTERVAL", default_value_t = DEFAULT_INTERVAL_MINUTES)]
    interval: u64,

    /// Serve prereleases on the stable channel too
    #[arg(long, env = "PRE")]
    pre: bool,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", env = "API_URL", value_name = "URL")]
    api_url: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,
}

impl Cli {
    fn config_options(&self) -> ConfigOptions {
        ConfigOptions {
            account: self.account.clone(),
            repository: self.repository.clone(),
            token: self.token.clone(),
            url: self.url.clone(),
            interval: Some(self.interval),
            pre: self.pre,
            api_url: self.api_url.clone(),
        }
    }

    fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = Config::new(cli.config_options())?;
    info!(
        "Serving releases of {} ({} mode)",
        config.repo,
        if config.private.is_some() {
            "private"
        } else {
            "public"
        }
    );

    let http_client = HttpClient::with_token(config.token())?;
    let cache = ReleaseCache::from_config(config)?;
    let state = Arc::new(AppState::new(cache, http_client));

    server::serve(state, cli.listen_addr()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};
    use std::time::Duration;

    /// Declared default and env variable of one argument, independent of the
    /// environment the tests run in.
    fn declared(id: &str) -> (Vec<String>, Option<String>) {
        let command = Cli::command();
        let arg = command.get_arguments().find(|a| a.get_id() == id).unwrap();
        let defaults = arg
            .get_default_values()
            .iter()
            .map(|v| v.to_string_lossy().into_owned())
            .collect();
        let env = arg.get_env().map(|e| e.to_string_lossy().into_owned());
        (defaults, env)
    }

    #[test]
    fn test_cli_defaults() {
        let (defaults, env) = declared("port");
        assert_eq!(defaults, ["3000"]);
        assert_eq!(env.as_deref(), Some("PORT"));

        let (defaults, env) = declared("host");
        assert_eq!(defaults, ["0.0.0.0"]);
        assert_eq!(env.as_deref(), Some("HOST"));

        let (defaults, env) = declared("interval");
        assert_eq!(defaults, [DEFAULT_INTERVAL_MINUTES.to_string()]);
        assert_eq!(env.as_deref(), Some("INTERVAL"));

        assert_eq!(declared("account").1.as_deref(), Some("ACCOUNT"));
        assert_eq!(declared("pre").1.as_deref(), Some("PRE"));
    }

    #[test]
    fn test_cli_flags_parsing() {
        let cli = Cli::try_parse_from([
            "updraft",
            "--account",
            "acme",
            "--repository",
            "app",
            "--interval",
            "5",
            "--pre",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
        ])
        .unwrap();

        assert_eq!(cli.listen_addr().to_string(), "127.0.0.1:8080");

        let options = ConfigOptions {
            token: None,
            url: None,
            ..cli.config_options()
        };
        let config = Config::new(options).unwrap();
        assert_eq!(config.repo.to_string(), "acme/app");
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.pre);
        assert!(config.private.is_none());
    }

    #[test]
    fn test_cli_private_mode_parsing() {
        let cli = Cli::try_parse_from([
            "updraft",
            "--account",
            "acme",
            "--repository",
            "app",
            "--token",
            "secret",
            "--url",
            "https://updates.example.com/",
        ])
        .unwrap();

        let config = Config::new(cli.config_options()).unwrap();
        assert_eq!(config.token(), Some("secret"));
        assert_eq!(
            config.private.unwrap().base_url,
            "https://updates.example.com"
        );
    }

    #[test]
    fn test_cli_invalid_port_fails() {
        let result = Cli::try_parse_from(["updraft", "--port", "http"]);
        assert!(result.is_err());
    }
}
