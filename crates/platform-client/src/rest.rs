//! Bookmarks table over the platform's REST interface.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use shelfmark_client_core::{Bookmark, BookmarkStore, StoreError};

use crate::error::{PlatformError, Result};
use crate::{PlatformClient, decode_json_response, expect_success, request_error};

/// Rows come back newest first; the REST interface is the ordering
/// authority and clients preserve what it hands them.
const LIST_PATH: &str = "/rest/v1/bookmarks?select=*&order=created_at.desc";
const INSERT_PATH: &str = "/rest/v1/bookmarks";

/// Ask for the inserted row back, as a bare object rather than a
/// one-element array.
const PREFER_REPRESENTATION: &str = "return=representation";
const ACCEPT_SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

fn delete_path(id: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
    format!("/rest/v1/bookmarks?id=eq.{encoded}")
}

/// Insert payload. `created_at` is left to the table default so the
/// server clock stays the ordering authority.
#[derive(Serialize)]
struct InsertBookmark<'a> {
    id: &'a str,
    user_id: &'a str,
    url: &'a str,
    title: &'a str,
}

/// Bookmarks API bound to one caller's access token.
#[derive(Debug, Clone)]
pub struct BookmarkApi {
    client: PlatformClient,
    access_token: String,
}

impl PlatformClient {
    /// Table API scoped to one caller. Row-level security on the platform
    /// restricts every operation to that caller's rows.
    #[must_use]
    pub fn bookmarks(&self, access_token: impl Into<String>) -> BookmarkApi {
        BookmarkApi {
            client: self.clone(),
            access_token: access_token.into(),
        }
    }
}

impl BookmarkApi {
    /// All of the caller's bookmarks, newest first.
    pub async fn list(&self) -> Result<Vec<Bookmark>> {
        let response = self
            .client
            .request(Method::GET, LIST_PATH)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(request_error)?;
        decode_json_response(response).await
    }

    /// Insert one row and return the authoritative server row.
    pub async fn insert(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        let payload = InsertBookmark {
            id: &bookmark.id,
            user_id: &bookmark.user_id,
            url: &bookmark.url,
            title: &bookmark.title,
        };
        let response = self
            .client
            .request(Method::POST, INSERT_PATH)
            .bearer_auth(&self.access_token)
            .header("Prefer", PREFER_REPRESENTATION)
            .header("Accept", ACCEPT_SINGLE_OBJECT)
            .json(&payload)
            .send()
            .await
            .map_err(request_error)?;
        decode_json_response(response).await
    }

    /// Delete by id. The platform answers with no content either way, so
    /// deleting an absent row is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .request(Method::DELETE, &delete_path(id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(request_error)?;
        expect_success(response).await
    }
}

#[async_trait]
impl BookmarkStore for BookmarkApi {
    async fn insert(&self, bookmark: &Bookmark) -> std::result::Result<Bookmark, StoreError> {
        BookmarkApi::insert(self, bookmark).await.map_err(store_error)
    }

    async fn delete(&self, id: &str) -> std::result::Result<(), StoreError> {
        BookmarkApi::delete(self, id).await.map_err(store_error)
    }

    async fn list(&self) -> std::result::Result<Vec<Bookmark>, StoreError> {
        BookmarkApi::list(self).await.map_err(store_error)
    }
}

fn store_error(error: PlatformError) -> StoreError {
    match error {
        PlatformError::Decode { message } => StoreError::Decode(message),
        other => StoreError::Request(other.to_string()),
    }
}
