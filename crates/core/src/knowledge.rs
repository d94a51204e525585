//! Knowledge records extracted from finished turns

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag for records produced from voice conversations
pub const VOICE_CHAT_SOURCE: &str = "voice_chat";

/// Source tag for records submitted directly through the API
pub const MANUAL_SOURCE: &str = "manual";

/// Named entities mentioned in a turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub companies: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

/// A stored knowledge entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
    pub id: String,
    pub title: String,
    pub content: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub entities: Entities,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: String,
    #[serde(default)]
    pub sentiment: String,
    pub source: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Knowledge {
    /// Case-insensitive keyword match over the text fields and tags
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return false;
        }

        [&self.title, &self.content, &self.summary]
            .into_iter()
            .chain(&self.key_points)
            .chain(&self.tags)
            .any(|field| field.to_lowercase().contains(&query))
    }
}
