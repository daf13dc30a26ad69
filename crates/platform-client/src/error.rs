//! Platform client error types.

use reqwest::StatusCode;
use thiserror::Error;

/// Platform client error type.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform base URL missing")]
    BaseUrlMissing,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("request failed: {message}")]
    Request { message: String },

    #[error("response read failed: {message}")]
    Read { message: String },

    #[error("platform returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("credentials rejected: {0}")]
    Unauthorized(String),

    #[error("JSON decode failed: {message}")]
    Decode { message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PlatformError {
    /// True when the platform itself rejected the credentials or request,
    /// as opposed to the platform being unreachable. Session handling
    /// treats rejection as final and everything else as transient.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Unauthorized(_) => true,
            Self::Http { status, .. } => status.is_client_error(),
            _ => false,
        }
    }
}

/// Platform client result type.
pub type Result<T> = std::result::Result<T, PlatformError>;
