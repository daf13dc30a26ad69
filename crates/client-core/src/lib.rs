#![cfg_attr(test, allow(clippy::expect_used))]

//! Client-side bookmark state shared by every shell that renders a live list.
//!
//! This crate intentionally exposes a small surface:
//! - typed bookmark rows, feed events, and validated drafts
//! - the reconciling collection (optimistic mutations + feed merge)
//! - the async sync engine that owns one collection per viewer
//! - feed lifecycle status and the diagnostic ring log
//!
//! No I/O lives here. Persistence and the realtime socket are injected
//! through the traits and channels in [`engine`].

pub mod bookmark;
pub mod collection;
pub mod debug_log;
pub mod engine;
pub mod status;

pub use bookmark::{AuthenticatedUser, Bookmark, ChangeEvent, NewBookmark, ValidationError};
pub use collection::{BookmarkCollection, BookmarkEntry, MergeOutcome, RecordState};
pub use debug_log::{DebugLog, DebugLogEntry, LogLevel};
pub use engine::{BookmarkStore, FeedMessage, StoreError, SyncEngine, SyncView};
pub use status::FeedStatus;
