//! Diagnostic ring log for the sync engine. Never persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Most recent entries kept; older ones fall off the back.
pub const DEBUG_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Capped ring of diagnostic entries, newest first.
#[derive(Debug, Clone, Default)]
pub struct DebugLog {
    entries: VecDeque<DebugLogEntry>,
}

impl DebugLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.entries.push_front(DebugLogEntry {
            at: Utc::now(),
            level,
            message: message.into(),
        });
        self.entries.truncate(DEBUG_LOG_CAPACITY);
    }

    /// Entries newest first.
    pub fn entries(&self) -> impl Iterator<Item = &DebugLogEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
