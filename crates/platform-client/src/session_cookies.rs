//! Session cookie contract shared by the gate middleware and the auth routes.
//!
//! Cookie names follow the platform SDK convention so a session minted here
//! stays legible to its tooling. All cookies are host-only, `HttpOnly`, and
//! `SameSite=Lax`; the tokens never reach page scripts.

use crate::auth::AuthSession;

pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";
/// Short-lived carrier for the PKCE verifier between the sign-in redirect
/// and the callback.
pub const PKCE_VERIFIER_COOKIE: &str = "sb-pkce-code-verifier";

/// One `Set-Cookie` header the caller still has to attach to a response.
///
/// Session resolution computes these without touching any response so the
/// same mutations can ride on a page render or a redirect alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieMutation {
    Set {
        name: &'static str,
        value: String,
        max_age_seconds: u64,
    },
    Clear {
        name: &'static str,
    },
}

impl CookieMutation {
    #[must_use]
    pub fn set(name: &'static str, value: impl Into<String>, max_age_seconds: u64) -> Self {
        Self::Set {
            name,
            value: value.into(),
            max_age_seconds,
        }
    }

    #[must_use]
    pub fn clear(name: &'static str) -> Self {
        Self::Clear { name }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { name, .. } | Self::Clear { name } => name,
        }
    }

    /// Render the `Set-Cookie` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        match self {
            Self::Set {
                name,
                value,
                max_age_seconds,
            } => {
                format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}")
            }
            Self::Clear { name } => {
                format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
            }
        }
    }
}

/// Token pair read from a request's `Cookie` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionCookies {
    #[must_use]
    pub fn from_cookie_header(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return Self::default();
        };
        Self {
            access_token: extract_cookie_value(header, ACCESS_TOKEN_COOKIE),
            refresh_token: extract_cookie_value(header, REFRESH_TOKEN_COOKIE),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

#[must_use]
pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

/// Mutations that install a freshly minted or rotated session.
///
/// The access token expires with the token itself; the refresh token gets
/// the longer TTL the caller configures for re-authentication.
#[must_use]
pub fn set_session_cookies(session: &AuthSession, refresh_ttl_seconds: u64) -> Vec<CookieMutation> {
    vec![
        CookieMutation::set(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            session.expires_in,
        ),
        CookieMutation::set(
            REFRESH_TOKEN_COOKIE,
            session.refresh_token.clone(),
            refresh_ttl_seconds,
        ),
    ]
}

#[must_use]
pub fn clear_session_cookies() -> Vec<CookieMutation> {
    vec![
        CookieMutation::clear(ACCESS_TOKEN_COOKIE),
        CookieMutation::clear(REFRESH_TOKEN_COOKIE),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_mutation_renders_scoped_header() {
        let mutation = CookieMutation::set(ACCESS_TOKEN_COOKIE, "token-123", 3600);
        assert_eq!(
            mutation.header_value(),
            "sb-access-token=token-123; Path=/; HttpOnly; SameSite=Lax; Max-Age=3600"
        );
    }

    #[test]
    fn clear_mutation_expires_immediately() {
        let mutation = CookieMutation::clear(REFRESH_TOKEN_COOKIE);
        assert_eq!(
            mutation.header_value(),
            "sb-refresh-token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }

    #[test]
    fn cookie_header_parsing_picks_out_the_session_pair() {
        let header = "theme=dark; sb-access-token=at-1;sb-refresh-token=rt-1; other=x";
        let cookies = SessionCookies::from_cookie_header(Some(header));
        assert_eq!(cookies.access_token.as_deref(), Some("at-1"));
        assert_eq!(cookies.refresh_token.as_deref(), Some("rt-1"));
        assert!(!cookies.is_empty());
    }

    #[test]
    fn missing_header_and_empty_values_read_as_absent() {
        assert!(SessionCookies::from_cookie_header(None).is_empty());

        let cookies = SessionCookies::from_cookie_header(Some("sb-access-token=; theme=dark"));
        assert!(cookies.access_token.is_none());
        assert!(cookies.is_empty());
    }

    #[test]
    fn extract_requires_exact_name_match() {
        let header = "xsb-access-token=evil; sb-access-token=good";
        assert_eq!(
            extract_cookie_value(header, ACCESS_TOKEN_COOKIE).as_deref(),
            Some("good")
        );
        assert_eq!(extract_cookie_value(header, "absent"), None);
    }
}
