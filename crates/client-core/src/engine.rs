//! Async sync engine: one instance per viewer, owning the collection for
//! that viewer's lifetime.
//!
//! The engine is wired up with a snapshot, a [`BookmarkStore`] for
//! persistence, and an mpsc feed of decoded realtime messages. It publishes
//! an immutable [`SyncView`] over a watch channel after every state change;
//! shells render from the view and never reach into the collection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

use crate::bookmark::{Bookmark, ChangeEvent, NewBookmark};
use crate::collection::{BookmarkCollection, BookmarkEntry, MergeOutcome};
use crate::debug_log::{DebugLog, LogLevel};
use crate::status::FeedStatus;

/// Persistence failure as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("persist request failed: {0}")]
    Request(String),
    #[error("persist response invalid: {0}")]
    Decode(String),
}

/// Persistence seam. Implemented over the platform REST API in production
/// and by in-memory fakes in tests.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Insert one row and return the authoritative server row.
    async fn insert(&self, bookmark: &Bookmark) -> Result<Bookmark, StoreError>;
    /// Delete by id. Deleting an absent row is not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
    /// All rows for the caller, newest `created_at` first.
    async fn list(&self) -> Result<Vec<Bookmark>, StoreError>;
}

/// One decoded message from the realtime feed task.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Status(FeedStatus),
    Event(ChangeEvent),
}

/// Immutable render snapshot published after every state change.
#[derive(Debug, Clone)]
pub struct SyncView {
    pub entries: Vec<BookmarkEntry>,
    pub status: FeedStatus,
    /// Most recent user-facing failure, if any.
    pub notice: Option<String>,
}

impl SyncView {
    pub fn bookmarks(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.iter().map(|entry| &entry.bookmark)
    }
}

pub struct SyncEngine {
    user_id: String,
    store: Arc<dyn BookmarkStore>,
    collection: BookmarkCollection,
    status: FeedStatus,
    notice: Option<String>,
    log: DebugLog,
    view_tx: watch::Sender<SyncView>,
}

impl SyncEngine {
    /// Build an engine over an initial snapshot. The returned receiver
    /// observes every published view, starting with the snapshot itself.
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn BookmarkStore>,
        snapshot: Vec<Bookmark>,
    ) -> (Self, watch::Receiver<SyncView>) {
        let collection = BookmarkCollection::from_snapshot(snapshot);
        let mut log = DebugLog::new();
        log.push(
            LogLevel::Info,
            format!("loaded snapshot with {} bookmarks", collection.len()),
        );

        let view = SyncView {
            entries: collection.entries().to_vec(),
            status: FeedStatus::Connecting,
            notice: None,
        };
        let (view_tx, view_rx) = watch::channel(view);

        (
            Self {
                user_id: user_id.into(),
                store,
                collection,
                status: FeedStatus::Connecting,
                notice: None,
                log,
                view_tx,
            },
            view_rx,
        )
    }

    /// Create a bookmark from a validated draft: optimistic head insert,
    /// then the persist round trip. A failed persist rolls the pending
    /// entry back and surfaces the failure.
    pub async fn create(&mut self, draft: NewBookmark) -> Result<Bookmark, StoreError> {
        let id = Uuid::new_v4().to_string();
        let optimistic = draft.into_bookmark(id.clone(), &self.user_id, Utc::now());

        self.collection.insert_optimistic(optimistic.clone());
        self.log
            .push(LogLevel::Info, format!("saving \"{}\"", optimistic.title));
        self.notice = None;
        self.publish();

        match self.store.insert(&optimistic).await {
            Ok(row) => {
                self.collection.confirm(row.clone());
                self.log
                    .push(LogLevel::Success, format!("saved \"{}\"", row.title));
                self.publish();
                Ok(row)
            }
            Err(error) => {
                self.collection.roll_back(&id);
                self.log
                    .push(LogLevel::Error, format!("save failed: {error}"));
                self.notice = Some(format!("Could not save bookmark: {error}"));
                self.publish();
                Err(error)
            }
        }
    }

    /// Delete a bookmark: optimistic removal, then the delete round trip.
    /// Unknown ids are a local no-op with no network call.
    pub async fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let Some(removed) = self.collection.remove(id) else {
            return Ok(());
        };
        self.log
            .push(LogLevel::Info, format!("deleting \"{}\"", removed.title));
        self.publish();

        match self.store.delete(id).await {
            Ok(()) => {
                self.log
                    .push(LogLevel::Success, format!("deleted \"{}\"", removed.title));
                self.publish();
                Ok(())
            }
            Err(error) => {
                // The optimistic removal stands. A row the server still has
                // comes back with the next snapshot.
                self.log
                    .push(LogLevel::Error, format!("delete failed: {error}"));
                self.notice = Some(format!("Could not delete bookmark: {error}"));
                self.publish();
                Err(error)
            }
        }
    }

    /// Apply one decoded feed message.
    pub fn apply_feed(&mut self, message: FeedMessage) {
        match message {
            FeedMessage::Status(next) => self.transition_status(next),
            FeedMessage::Event(event) => {
                let kind = event.kind();
                let id = event.id().to_string();
                let outcome = self.collection.apply(event);
                debug!(kind, id, outcome = outcome.as_str(), "feed event applied");
                self.log.push(
                    level_for(outcome),
                    format!("realtime {kind} for {id}: {}", outcome.as_str()),
                );
                self.publish();
            }
        }
    }

    /// Drive the engine from a feed until it closes. A feed that closes
    /// while the status is still healthy means the socket died; that is a
    /// channel error for this subscription instance.
    pub async fn run(mut self, mut feed: mpsc::UnboundedReceiver<FeedMessage>) {
        while let Some(message) = feed.recv().await {
            self.apply_feed(message);
        }
        if !self.status.is_degraded() {
            self.transition_status(FeedStatus::ChannelError);
        }
    }

    /// Pure filter over the current sequence.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Bookmark> {
        self.collection.search(query)
    }

    #[must_use]
    pub fn view(&self) -> SyncView {
        SyncView {
            entries: self.collection.entries().to_vec(),
            status: self.status,
            notice: self.notice.clone(),
        }
    }

    #[must_use]
    pub fn status(&self) -> FeedStatus {
        self.status
    }

    #[must_use]
    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    fn transition_status(&mut self, next: FeedStatus) {
        // Degraded states are terminal for this subscription instance.
        if self.status.is_degraded() || self.status == next {
            return;
        }
        self.status = next;
        match next {
            FeedStatus::Connecting => {
                self.log.push(LogLevel::Info, "realtime channel connecting");
            }
            FeedStatus::Subscribed => {
                self.log
                    .push(LogLevel::Success, "realtime channel subscribed");
            }
            FeedStatus::ChannelError => {
                self.log.push(LogLevel::Error, "realtime channel error");
                self.notice = Some("Live updates are unavailable for this session".to_string());
            }
            FeedStatus::TimedOut => {
                self.log
                    .push(LogLevel::Error, "realtime subscription timed out");
                self.notice = Some("Live updates are unavailable for this session".to_string());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let _ = self.view_tx.send(self.view());
    }
}

fn level_for(outcome: MergeOutcome) -> LogLevel {
    match outcome {
        MergeOutcome::Inserted
        | MergeOutcome::ConfirmedPending
        | MergeOutcome::Updated
        | MergeOutcome::Removed => LogLevel::Success,
        MergeOutcome::Duplicate | MergeOutcome::UpdateIgnored | MergeOutcome::AlreadyAbsent => {
            LogLevel::Info
        }
    }
}
