//! User-facing notices and their dedup log
//!
//! The engine never renders anything; it hands [`Notice`] values to whoever
//! listens. Notices that should appear once per resource (prefetch progress)
//! are deduplicated through a [`NoticeLog`] owned by the session, so an
//! integration switch starts from a clean slate.

use ahash::AHashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Replacement key: a later notice with the same key supersedes this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            key: None,
            level,
            message: message.into(),
        }
    }
}

/// Scoped record of which keyed notices were already shown
#[derive(Debug, Default)]
pub struct NoticeLog {
    announced: Mutex<AHashSet<String>>,
    completed: Mutex<AHashSet<String>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as announced; true only the first time
    pub fn first_time(&self, key: &str) -> bool {
        self.announced.lock().insert(key.to_string())
    }

    /// Record `key` as completed; true only the first time
    pub fn mark_completed(&self, key: &str) -> bool {
        self.completed.lock().insert(key.to_string())
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.lock().contains(key)
    }

    /// Forget everything (integration switch)
    pub fn clear(&self) {
        self.announced.lock().clear();
        self.completed.lock().clear();
    }
}
