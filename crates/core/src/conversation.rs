//! Session and rolling-summary types
//!
//! A [`Session`] is owned by the session store. Pipeline runs only read it
//! and append to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm_types::Message;

/// Persistent conversation for one session id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Append-ordered history
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RollingSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, keeping at most `cap` of the most recent ones.
    ///
    /// Dropping only ever happens at the front, so a message that fell out
    /// of the window can never come back. The summary's covered count
    /// shrinks by the same amount so it keeps indexing the current history.
    pub fn append(&mut self, message: Message, cap: usize) {
        self.messages.push(message);
        self.enforce_cap(cap);
        self.updated_at = Utc::now();
    }

    /// Drop the oldest messages beyond `cap` (0 = unbounded)
    pub fn enforce_cap(&mut self, cap: usize) {
        if cap == 0 || self.messages.len() <= cap {
            return;
        }
        let overflow = self.messages.len() - cap;
        self.messages.drain(..overflow);
        if let Some(summary) = &mut self.summary {
            summary.message_count = summary.message_count.saturating_sub(overflow);
        }
    }

    /// Drop all history including the summary
    pub fn clear(&mut self) {
        self.messages.clear();
        self.summary = None;
        self.updated_at = Utc::now();
    }
}

/// Compressed digest of older messages.
///
/// A new summary replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingSummary {
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Number of leading messages this summary covers
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RollingSummary {
    pub fn new(
        content: impl Into<String>,
        key_points: Vec<String>,
        topics: Vec<String>,
        message_count: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            content: content.into(),
            key_points,
            topics,
            message_count,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Bounded view of a history handed to the generation stage
#[derive(Debug, Clone, Default)]
pub struct CompressedContext {
    pub summary: Option<RollingSummary>,
    pub recent_messages: Vec<Message>,
    pub total_messages: usize,
}

impl CompressedContext {
    /// Whole history passed through without summarization
    pub fn verbatim(messages: &[Message]) -> Self {
        Self {
            summary: None,
            recent_messages: messages.to_vec(),
            total_messages: messages.len(),
        }
    }
}
