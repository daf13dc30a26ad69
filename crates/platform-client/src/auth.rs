//! Auth endpoints: principal lookup, token rotation, the OAuth handshake.
//!
//! Tokens are opaque here. A principal only ever comes back from the
//! platform's user endpoint, never from decoding a token locally, so a
//! forged or stale cookie cannot fabricate an identity.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shelfmark_client_core::AuthenticatedUser;
use url::Url;
use uuid::Uuid;

use crate::error::Result;
use crate::{PlatformClient, decode_json_response, expect_success, request_error};

const USER_PATH: &str = "/auth/v1/user";
const REFRESH_GRANT_PATH: &str = "/auth/v1/token?grant_type=refresh_token";
const PKCE_GRANT_PATH: &str = "/auth/v1/token?grant_type=pkce";
const LOGOUT_PATH: &str = "/auth/v1/logout";
const AUTHORIZE_PATH: &str = "/auth/v1/authorize";

/// Session payload returned by the token grant endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: WireUser,
}

/// User record as the auth endpoints ship it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: WireUserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireUserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl WireUser {
    #[must_use]
    pub fn into_principal(self) -> AuthenticatedUser {
        AuthenticatedUser {
            id: self.id,
            email: self.email,
            full_name: self.user_metadata.full_name,
            avatar_url: self.user_metadata.avatar_url,
        }
    }
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

/// PKCE verifier/challenge pair for one sign-in attempt.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    #[must_use]
    pub fn generate() -> Self {
        let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        Self {
            challenge: challenge_for(&verifier),
            verifier,
        }
    }
}

/// S256 code challenge for a verifier.
#[must_use]
pub fn challenge_for(verifier: &str) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Auth API view over a [`PlatformClient`].
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: PlatformClient,
}

impl PlatformClient {
    #[must_use]
    pub fn auth(&self) -> AuthApi {
        AuthApi {
            client: self.clone(),
        }
    }
}

impl AuthApi {
    /// Validate an access token and return its principal.
    pub async fn fetch_user(&self, access_token: &str) -> Result<AuthenticatedUser> {
        let response = self
            .client
            .request(Method::GET, USER_PATH)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;
        let user: WireUser = decode_json_response(response).await?;
        Ok(user.into_principal())
    }

    /// Trade a refresh token for a new session. Rotation invalidates the
    /// old pair; the caller has to persist the returned tokens.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let response = self
            .client
            .request(Method::POST, REFRESH_GRANT_PATH)
            .json(&RefreshGrant { refresh_token })
            .send()
            .await
            .map_err(request_error)?;
        decode_json_response(response).await
    }

    /// Complete the OAuth handshake: trade the callback code plus the
    /// PKCE verifier for a session.
    pub async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthSession> {
        let response = self
            .client
            .request(Method::POST, PKCE_GRANT_PATH)
            .json(&PkceGrant {
                auth_code,
                code_verifier,
            })
            .send()
            .await
            .map_err(request_error)?;
        decode_json_response(response).await
    }

    /// Revoke the session behind an access token.
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .request(Method::POST, LOGOUT_PATH)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;
        expect_success(response).await
    }

    /// Provider redirect that starts the OAuth handshake. `redirect_to` is
    /// the absolute callback URL on our side; the offline/consent pair asks
    /// the provider for a refreshable grant.
    pub fn authorize_url(
        &self,
        provider: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Url> {
        let mut url = Url::parse(&self.client.endpoint(AUTHORIZE_PATH))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_to)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlatformConfig;

    fn client() -> PlatformClient {
        PlatformClient::new(PlatformConfig::new("https://project.example.com", "pk-test"))
            .expect("platform client")
    }

    #[test]
    fn pkce_pair_is_well_formed() {
        let pair = PkcePair::generate();

        assert_eq!(pair.verifier.len(), 64);
        assert!(pair.verifier.chars().all(|c| c.is_ascii_hexdigit()));
        // Unpadded base64url of a 32-byte digest.
        assert_eq!(pair.challenge.len(), 43);
        assert!(
            pair.challenge
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(pair.challenge, challenge_for(&pair.verifier));
    }

    #[test]
    fn distinct_attempts_get_distinct_verifiers() {
        let first = PkcePair::generate();
        let second = PkcePair::generate();
        assert_ne!(first.verifier, second.verifier);
        assert_ne!(first.challenge, second.challenge);
    }

    #[test]
    fn authorize_url_carries_the_handshake_params() {
        let url = client()
            .auth()
            .authorize_url("google", "https://app.example.com/auth/callback", "chal-1")
            .expect("authorize url");

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(pairs.contains(&("provider".to_string(), "google".to_string())));
        assert!(pairs.contains(&(
            "redirect_to".to_string(),
            "https://app.example.com/auth/callback".to_string()
        )));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("prompt".to_string(), "consent".to_string())));
        assert!(pairs.contains(&("code_challenge".to_string(), "chal-1".to_string())));
        assert!(pairs.contains(&("code_challenge_method".to_string(), "s256".to_string())));
    }

    #[test]
    fn wire_user_decodes_with_sparse_metadata() {
        let user: WireUser =
            serde_json::from_str(r#"{"id":"user-1","email":"ada@example.com"}"#).expect("decode");
        let principal = user.into_principal();

        assert_eq!(principal.id, "user-1");
        assert_eq!(principal.email.as_deref(), Some("ada@example.com"));
        assert!(principal.full_name.is_none());
        assert!(principal.avatar_url.is_none());
    }

    #[test]
    fn auth_session_decodes_the_grant_shape() {
        let payload = r#"{
            "access_token": "at-1",
            "refresh_token": "rt-1",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {
                "id": "user-1",
                "email": "ada@example.com",
                "user_metadata": {"full_name": "Ada Lovelace", "avatar_url": "https://img.example.com/a.png"}
            }
        }"#;
        let session: AuthSession = serde_json::from_str(payload).expect("decode");

        assert_eq!(session.access_token, "at-1");
        assert_eq!(session.refresh_token, "rt-1");
        assert_eq!(session.expires_in, 3600);
        let principal = session.user.into_principal();
        assert_eq!(principal.display_name(), "Ada Lovelace");
    }
}
