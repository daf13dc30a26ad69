//! The reconciling bookmark collection.
//!
//! One collection backs one viewer. It merges three inputs into a single
//! deduplicated, recency-ordered sequence: the initial snapshot, local
//! optimistic mutations, and change-feed events. Merge rules are idempotent
//! and commutative with respect to the feed/acknowledgement race: applying
//! the same event twice, or in either order relative to the matching local
//! mutation, converges to the same state.

use std::collections::HashSet;

use crate::bookmark::{Bookmark, ChangeEvent};

/// Reconciliation state of one visible entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Locally inserted, not yet acknowledged by the server or the feed.
    Pending,
    /// Snapshot-loaded, feed-confirmed, or persist-acknowledged.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkEntry {
    pub bookmark: Bookmark,
    pub state: RecordState,
}

impl BookmarkEntry {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == RecordState::Pending
    }
}

/// What applying one feed event did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Insert for a new id; entry prepended.
    Inserted,
    /// Insert matched a pending optimistic entry; confirmed in place.
    ConfirmedPending,
    /// Insert for an id already present and confirmed; event discarded.
    Duplicate,
    /// Update replaced the matching entry in place.
    Updated,
    /// Update for an absent id; nothing to replace.
    UpdateIgnored,
    /// Delete removed the matching entry.
    Removed,
    /// Delete for an absent id; no-op.
    AlreadyAbsent,
}

impl MergeOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::ConfirmedPending => "confirmed_pending",
            Self::Duplicate => "duplicate",
            Self::Updated => "updated",
            Self::UpdateIgnored => "update_ignored",
            Self::Removed => "removed",
            Self::AlreadyAbsent => "already_absent",
        }
    }
}

/// Ordered bookmark sequence, newest `created_at` first.
///
/// Each id appears at most once. Optimistic inserts go to the head; their
/// true server timestamp is unknown until confirmation, and the head
/// placement is kept rather than re-sorting on confirm.
#[derive(Debug, Clone, Default)]
pub struct BookmarkCollection {
    entries: Vec<BookmarkEntry>,
}

impl BookmarkCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the initial snapshot query: sort by `created_at`
    /// descending (stable on ties) and drop duplicate ids, keeping the
    /// first occurrence. Snapshot rows are confirmed by definition.
    #[must_use]
    pub fn from_snapshot(mut rows: Vec<Bookmark>) -> Self {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut seen = HashSet::with_capacity(rows.len());
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            if seen.insert(row.id.clone()) {
                entries.push(BookmarkEntry {
                    bookmark: row,
                    state: RecordState::Confirmed,
                });
            }
        }

        Self { entries }
    }

    /// Insert a locally-created bookmark at the head as pending. Returns
    /// false without touching the sequence when the id is already present
    /// (the feed may have delivered the row first).
    pub fn insert_optimistic(&mut self, bookmark: Bookmark) -> bool {
        if self.contains(&bookmark.id) {
            return false;
        }
        self.entries.insert(
            0,
            BookmarkEntry {
                bookmark,
                state: RecordState::Pending,
            },
        );
        true
    }

    /// Remove an entry ahead of its delete request. Absence is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Bookmark> {
        let index = self.position(id)?;
        Some(self.entries.remove(index).bookmark)
    }

    /// Adopt the authoritative server row for a pending entry, in place.
    /// Returns false when the id is no longer present; a concurrent delete
    /// wins and the row is not resurrected.
    pub fn confirm(&mut self, row: Bookmark) -> bool {
        let Some(index) = self.position(&row.id) else {
            return false;
        };
        let entry = &mut self.entries[index];
        entry.bookmark = row;
        entry.state = RecordState::Confirmed;
        true
    }

    /// Undo a failed optimistic insert. Only pending entries are removed;
    /// an entry the feed already confirmed stays.
    pub fn roll_back(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) if self.entries[index].is_pending() => {
                self.entries.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Merge one decoded feed event.
    pub fn apply(&mut self, event: ChangeEvent) -> MergeOutcome {
        match event {
            ChangeEvent::Insert(row) => {
                if let Some(index) = self.position(&row.id) {
                    let entry = &mut self.entries[index];
                    if entry.is_pending() {
                        entry.bookmark = row;
                        entry.state = RecordState::Confirmed;
                        MergeOutcome::ConfirmedPending
                    } else {
                        MergeOutcome::Duplicate
                    }
                } else {
                    self.entries.insert(
                        0,
                        BookmarkEntry {
                            bookmark: row,
                            state: RecordState::Confirmed,
                        },
                    );
                    MergeOutcome::Inserted
                }
            }
            ChangeEvent::Update(row) => {
                if let Some(index) = self.position(&row.id) {
                    // Position is preserved: created_at is immutable, so an
                    // update never changes the sort key.
                    let entry = &mut self.entries[index];
                    entry.bookmark = row;
                    entry.state = RecordState::Confirmed;
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::UpdateIgnored
                }
            }
            ChangeEvent::Delete { id } => {
                if let Some(index) = self.position(&id) {
                    self.entries.remove(index);
                    MergeOutcome::Removed
                } else {
                    MergeOutcome::AlreadyAbsent
                }
            }
        }
    }

    /// Case-insensitive substring filter over title and url. Pure: the
    /// underlying sequence is never touched.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Bookmark> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.bookmarks().collect();
        }
        self.bookmarks()
            .filter(|bookmark| bookmark.matches_lowercase(&needle))
            .collect()
    }

    pub fn bookmarks(&self) -> impl Iterator<Item = &Bookmark> {
        self.entries.iter().map(|entry| &entry.bookmark)
    }

    #[must_use]
    pub fn entries(&self) -> &[BookmarkEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BookmarkEntry> {
        self.entries.iter().find(|entry| entry.bookmark.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.bookmark.id == id)
    }
}
