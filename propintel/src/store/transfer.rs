//! Serialized forms of the session: the durable mirror and the
//! user-initiated export/import blob.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{ConversationEntry, GeneratedImage};

/// Version tag written into export blobs.
pub const EXPORT_VERSION: &str = "1.0";

const KEY_HISTORY: &str = "conversationHistory";
const KEY_GALLERY: &str = "imageGallery";

/// Document stored under the durable mirror key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorDocument {
    #[serde(default)]
    pub conversation_history: Vec<ConversationEntry>,
    #[serde(default)]
    pub image_gallery: Vec<GeneratedImage>,
    pub timestamp: DateTime<Utc>,
}

/// Blob produced by `export_data` and consumed by `import_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBlob {
    pub conversation_history: Vec<ConversationEntry>,
    pub image_gallery: Vec<GeneratedImage>,
    pub timestamp: DateTime<Utc>,
    pub export_timestamp: DateTime<Utc>,
    pub version: String,
}

/// What an import blob actually carried. A missing key is `None`, which
/// the replace strategy treats as an empty collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPayload {
    pub conversation_history: Option<Vec<ConversationEntry>>,
    pub image_gallery: Option<Vec<GeneratedImage>>,
}

impl ImportPayload {
    /// Parse and validate an import blob.
    ///
    /// The blob must be a JSON object carrying at least one of the two
    /// known collections, each of which must be a well-formed array.
    pub fn parse(blob: &str) -> AppResult<Self> {
        let value: serde_json::Value = serde_json::from_str(blob)
            .map_err(|e| AppError::Validation(format!("Invalid import format: {e}")))?;
        let Some(object) = value.as_object() else {
            return Err(AppError::Validation(
                "Invalid import format: expected a JSON object".into(),
            ));
        };

        if !object.contains_key(KEY_HISTORY) && !object.contains_key(KEY_GALLERY) {
            return Err(AppError::Validation(format!(
                "Invalid import format: expected {KEY_HISTORY} or {KEY_GALLERY}"
            )));
        }

        Ok(Self {
            conversation_history: field(object, KEY_HISTORY)?,
            image_gallery: field(object, KEY_GALLERY)?,
        })
    }
}

fn field<T: serde::de::DeserializeOwned>(
    object: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> AppResult<Option<Vec<T>>> {
    object
        .get(key)
        .map(|v| {
            serde_json::from_value(v.clone())
                .map_err(|e| AppError::Validation(format!("Invalid import format in {key}: {e}")))
        })
        .transpose()
}
