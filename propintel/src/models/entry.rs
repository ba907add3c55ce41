//! Conversation entry model representing one answered question.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key recording whether retrieved context informed the answer.
pub const META_CONTEXT_USED: &str = "context_used";
/// Metadata key recording the token count reported for the answer.
pub const META_TOKEN_COUNT: &str = "token_count";

/// Identifier of a conversation entry, unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Generate a fresh identifier (UUIDv7, time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A question submitted by the user together with the analysis response.
///
/// Entries are immutable once appended; the store only ever removes them
/// wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Unique identifier for the entry.
    pub id: EntryId,
    /// Question text as submitted.
    pub question: String,
    /// Response text as received.
    pub response: String,
    /// When the entry was created.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary key/value metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ConversationEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(
        question: String,
        response: String,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            question,
            response,
            timestamp: Utc::now(),
            metadata,
        }
    }

    /// Whether retrieved context was used to produce the response.
    pub fn context_used(&self) -> bool {
        self.metadata
            .get(META_CONTEXT_USED)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Token count reported for the response, if any.
    pub fn token_count(&self) -> Option<u64> {
        self.metadata
            .get(META_TOKEN_COUNT)
            .and_then(serde_json::Value::as_u64)
    }
}
