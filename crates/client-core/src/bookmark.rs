//! Bookmark rows, feed events, and validated create drafts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// One stored bookmark row. `created_at` is server-assigned and is the sole
/// sort key (descending); it never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Host part of the stored URL for display, falling back to the raw
    /// string when it no longer parses.
    #[must_use]
    pub fn display_host(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(ToString::to_string))
            .unwrap_or_else(|| self.url.clone())
    }

    /// Substring match over title and url. `needle` must already be
    /// lowercase; an empty needle matches everything.
    #[must_use]
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.title.to_lowercase().contains(needle)
            || self.url.to_lowercase().contains(needle)
    }
}

/// Validated principal resolved from the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthenticatedUser {
    /// Human-facing name: profile full name, else the email local part,
    /// else a generic placeholder.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = self.full_name.as_deref() {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
        if let Some(email) = self.email.as_deref() {
            if let Some((local, _)) = email.split_once('@') {
                if !local.is_empty() {
                    return local.to_string();
                }
            }
        }
        "User".to_string()
    }
}

/// Decoded change-feed notification. Insert and update carry the full row
/// image; delete carries only the row identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Bookmark),
    Update(Bookmark),
    Delete { id: String },
}

impl ChangeEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete { .. } => "delete",
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Insert(bookmark) | Self::Update(bookmark) => &bookmark.id,
            Self::Delete { id } => id,
        }
    }
}

/// Rejected create input. Checked before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("url is required")]
    EmptyUrl,
    #[error("url must be an absolute URL: {0}")]
    UrlUnparseable(String),
    #[error("url must include a host")]
    UrlMissingHost,
}

impl ValidationError {
    /// Form field the error belongs to.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyTitle => "title",
            Self::EmptyUrl | Self::UrlUnparseable(_) | Self::UrlMissingHost => "url",
        }
    }
}

/// A create draft that passed validation. Construction is the only gate:
/// holding a value of this type means the URL is absolute with a scheme and
/// a host and the title is non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    url: String,
    title: String,
}

impl NewBookmark {
    pub fn parse(url: &str, title: &str) -> Result<Self, ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let url = url.trim();
        if url.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        let parsed = Url::parse(url).map_err(|error| {
            ValidationError::UrlUnparseable(error.to_string())
        })?;
        if parsed.host_str().is_none() {
            return Err(ValidationError::UrlMissingHost);
        }

        Ok(Self {
            url: url.to_string(),
            title: title.to_string(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Materialize the draft as a full row owned by `user_id`. The caller
    /// supplies the identity; `created_at` is provisional until the server
    /// row comes back.
    #[must_use]
    pub fn into_bookmark(self, id: String, user_id: &str, created_at: DateTime<Utc>) -> Bookmark {
        Bookmark {
            id,
            user_id: user_id.to_string(),
            url: self.url,
            title: self.title,
            created_at,
        }
    }
}
