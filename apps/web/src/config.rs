//! Environment-driven configuration for the web process.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use shelfmark_platform_client::RealtimeConfig;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8788";
const DEFAULT_OAUTH_PROVIDER: &str = "google";
const DEFAULT_REFRESH_COOKIE_TTL_SECONDS: u64 = 2_592_000;
const DEFAULT_VERIFIER_COOKIE_TTL_SECONDS: u64 = 600;
const DEFAULT_PLATFORM_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_FEED_JOIN_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_FEED_HEARTBEAT_MS: u64 = 25_000;

/// Runtime settings, sourced from `SHELFMARK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub platform_url: String,
    pub platform_key: String,
    /// Public origin of this service, used to build OAuth callback URLs.
    pub site_url: String,
    pub oauth_provider: String,
    pub refresh_cookie_ttl_seconds: u64,
    pub verifier_cookie_ttl_seconds: u64,
    pub platform_timeout_ms: u64,
    pub feed_join_timeout_ms: u64,
    pub feed_heartbeat_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    MissingVar { name: &'static str },
    #[error("invalid SHELFMARK_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env::var("SHELFMARK_BIND_ADDR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr_raw,
                source,
            })?;

        let platform_url = require_env("SHELFMARK_PLATFORM_URL")?;
        let platform_key = require_env("SHELFMARK_PLATFORM_KEY")?;

        let site_url = env::var("SHELFMARK_SITE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| format!("http://{bind_addr}"));

        let oauth_provider = env::var("SHELFMARK_OAUTH_PROVIDER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OAUTH_PROVIDER.to_string());

        let refresh_cookie_ttl_seconds = env::var("SHELFMARK_REFRESH_COOKIE_TTL_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_COOKIE_TTL_SECONDS);

        let verifier_cookie_ttl_seconds = env::var("SHELFMARK_VERIFIER_COOKIE_TTL_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_VERIFIER_COOKIE_TTL_SECONDS);

        let platform_timeout_ms = env::var("SHELFMARK_PLATFORM_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PLATFORM_TIMEOUT_MS);

        let feed_join_timeout_ms = env::var("SHELFMARK_FEED_JOIN_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FEED_JOIN_TIMEOUT_MS);

        let feed_heartbeat_ms = env::var("SHELFMARK_FEED_HEARTBEAT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_FEED_HEARTBEAT_MS);

        Ok(Self {
            bind_addr,
            platform_url,
            platform_key,
            site_url,
            oauth_provider,
            refresh_cookie_ttl_seconds,
            verifier_cookie_ttl_seconds,
            platform_timeout_ms,
            feed_join_timeout_ms,
            feed_heartbeat_ms,
        })
    }

    /// Realtime settings for dashboard feed subscriptions.
    #[must_use]
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            join_timeout: Duration::from_millis(self.feed_join_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.feed_heartbeat_ms),
        }
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingVar { name })
}
