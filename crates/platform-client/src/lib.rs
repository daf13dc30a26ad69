#![cfg_attr(test, allow(clippy::expect_used))]
//! Typed client for the hosted data platform.
//!
//! This crate intentionally exposes a small surface:
//! - auth endpoints: principal lookup, token rotation, the OAuth handshake
//! - the bookmarks table over the platform's REST interface
//! - the realtime change feed over its Phoenix-style websocket
//!
//! Construct one [`PlatformClient`] at startup and hand it to whatever needs
//! platform access; the per-concern APIs are cheap views over it.

pub mod auth;
pub mod error;
pub mod realtime;
pub mod rest;
pub mod session_cookies;

use std::time::Duration;

use reqwest::StatusCode;
use uuid::Uuid;

pub use auth::{AuthApi, AuthSession, PkcePair};
pub use error::{PlatformError, Result};
pub use realtime::{FeedGuard, RealtimeClient, RealtimeConfig};
pub use rest::BookmarkApi;
pub use session_cookies::{
    ACCESS_TOKEN_COOKIE, CookieMutation, PKCE_VERIFIER_COOKIE, REFRESH_TOKEN_COOKIE, SessionCookies,
};

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: String,
    pub publishable_key: String,
    pub timeout_ms: u64,
}

impl PlatformConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            publishable_key: publishable_key.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Shared HTTP client plus the platform coordinates every API needs.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    base_url: String,
    publishable_key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            publishable_key: config.publishable_key,
            timeout: Duration::from_millis(config.timeout_ms.max(250)),
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn publishable_key(&self) -> &str {
        &self.publishable_key
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Request builder with the platform key, a request id, and the
    /// configured timeout already applied.
    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.publishable_key)
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
            .timeout(self.timeout)
    }
}

pub(crate) async fn decode_json_response<T>(response: reqwest::Response) -> Result<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let bytes = read_success_body(response).await?;
    serde_json::from_slice::<T>(&bytes).map_err(|error| PlatformError::Decode {
        message: error.to_string(),
    })
}

/// Consume a response where only the status matters.
pub(crate) async fn expect_success(response: reqwest::Response) -> Result<()> {
    read_success_body(response).await.map(|_| ())
}

async fn read_success_body(response: reqwest::Response) -> Result<Vec<u8>> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| PlatformError::Read {
            message: error.to_string(),
        })?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PlatformError::Unauthorized(body_excerpt(&bytes)));
    }
    if !status.is_success() {
        return Err(PlatformError::Http {
            status,
            body: body_excerpt(&bytes),
        });
    }
    Ok(bytes.to_vec())
}

pub(crate) fn request_error(error: reqwest::Error) -> PlatformError {
    PlatformError::Request {
        message: error.to_string(),
    }
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        "<empty>".to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(PlatformError::BaseUrlMissing);
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_builder_normalizes_paths() {
        let client = PlatformClient::new(PlatformConfig::new(
            "https://project.example.com/",
            "publishable-key",
        ))
        .expect("platform client");

        assert_eq!(
            client.endpoint("/auth/v1/user"),
            "https://project.example.com/auth/v1/user"
        );
        assert_eq!(
            client.endpoint("auth/v1/user"),
            "https://project.example.com/auth/v1/user"
        );
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let result = PlatformClient::new(PlatformConfig::new("   ", "key"));
        assert!(matches!(result, Err(PlatformError::BaseUrlMissing)));
    }

    #[test]
    fn rejection_classification_tracks_status() {
        assert!(PlatformError::Unauthorized("bad token".to_string()).is_rejection());
        assert!(
            PlatformError::Http {
                status: StatusCode::BAD_REQUEST,
                body: "invalid_grant".to_string(),
            }
            .is_rejection()
        );
        assert!(
            !PlatformError::Http {
                status: StatusCode::BAD_GATEWAY,
                body: "upstream".to_string(),
            }
            .is_rejection()
        );
        assert!(
            !PlatformError::Request {
                message: "connection refused".to_string(),
            }
            .is_rejection()
        );
    }
}
