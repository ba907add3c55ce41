//! Session store: the ordered conversation history and image gallery of the
//! current session, mirrored to durable storage after every mutation.
//!
//! The mirror is a single JSON document under a fixed key. Loading fully
//! replaces in-memory state; storage failures are logged and never leave
//! the in-memory collections inconsistent.

mod durable;
mod transfer;

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::confirm::Confirm;
use crate::error::{AppError, AppResult};
use crate::models::{ConversationEntry, EntryId, GeneratedImage, ImageId, SessionSnapshot};

pub use durable::{DurableStorage, FileStorage};
#[cfg(test)]
pub use durable::MemoryStorage;
pub use transfer::{ImportPayload, MirrorDocument, TransferBlob, EXPORT_VERSION};

/// Fixed key of the durable mirror.
pub const DEFAULT_STORAGE_KEY: &str = "property_intelligence_session";

/// What changed in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    EntryAppended,
    ImageAppended,
    ImageDeleted,
    Cleared,
    Loaded,
    Imported,
}

/// Called directly after each successful mutation.
pub trait HistoryObserver {
    fn history_changed(&self, kind: ChangeKind, snapshot: &SessionSnapshot<'_>);
}

/// How imported collections combine with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Imported items go after the existing ones.
    Append,
    /// Existing collections are replaced outright.
    Replace,
}

/// Counts of items brought in by an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub entries: usize,
    pub images: usize,
}

/// Owner of the session's conversation entries and images.
pub struct SessionStore {
    storage: Box<dyn DurableStorage>,
    key: String,
    conversation_history: Vec<ConversationEntry>,
    image_gallery: Vec<GeneratedImage>,
    observers: Vec<Box<dyn HistoryObserver>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("entries", &self.conversation_history.len())
            .field("images", &self.image_gallery.len())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create an empty store mirrored under `key`. Nothing is read.
    pub fn new(storage: Box<dyn DurableStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            conversation_history: Vec::new(),
            image_gallery: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Create a store and populate it from the durable mirror.
    pub fn open(storage: Box<dyn DurableStorage>, key: impl Into<String>) -> Self {
        let mut store = Self::new(storage, key);
        store.load_from_durable_storage();
        store
    }

    /// Register an observer for history changes.
    pub fn subscribe(&mut self, observer: Box<dyn HistoryObserver>) {
        self.observers.push(observer);
    }

    /// Append an answered question and return its id.
    pub fn append_conversation_entry(
        &mut self,
        question: impl Into<String>,
        response: impl Into<String>,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> EntryId {
        let entry = ConversationEntry::new(question.into(), response.into(), metadata);
        let id = entry.id.clone();
        self.conversation_history.push(entry);
        debug!(%id, total = self.conversation_history.len(), "appended conversation entry");
        self.commit(ChangeKind::EntryAppended);
        id
    }

    /// Append a generated image and return its id.
    pub fn append_image(
        &mut self,
        image_data: impl Into<String>,
        prompt: impl Into<String>,
        style: impl Into<String>,
        seed: Option<u64>,
        is_auto_generated: bool,
    ) -> ImageId {
        let image = GeneratedImage::new(
            image_data.into(),
            prompt.into(),
            style.into(),
            seed,
            is_auto_generated,
        );
        let id = image.id.clone();
        self.image_gallery.push(image);
        debug!(%id, total = self.image_gallery.len(), "appended image");
        self.commit(ChangeKind::ImageAppended);
        id
    }

    /// Delete an image after the user confirms.
    ///
    /// Returns `false` without prompting when the id is unknown, and
    /// `false` without mutating when the user declines.
    pub fn delete_image(&mut self, id: &ImageId, confirm: &dyn Confirm) -> bool {
        if !self.image_gallery.iter().any(|img| &img.id == id) {
            debug!(%id, "delete requested for unknown image");
            return false;
        }
        if !confirm.confirm("Are you sure you want to delete this image?") {
            return false;
        }

        self.image_gallery.retain(|img| &img.id != id);
        info!(%id, "deleted image");
        self.commit(ChangeKind::ImageDeleted);
        true
    }

    /// Empty both collections and remove the durable mirror.
    ///
    /// Clearing an empty store succeeds without prompting. Returns `false`
    /// only when the user declines.
    pub fn clear_all(&mut self, confirm: &dyn Confirm) -> bool {
        if !self.snapshot().is_empty()
            && !confirm.confirm("Clear all conversation history and images?")
        {
            return false;
        }

        self.conversation_history.clear();
        self.image_gallery.clear();
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(error = %e, "failed to remove durable mirror; continuing in memory");
        }
        info!("cleared session");
        self.notify(ChangeKind::Cleared);
        true
    }

    /// Borrowed view of the current state.
    pub fn snapshot(&self) -> SessionSnapshot<'_> {
        SessionSnapshot::new(&self.conversation_history, &self.image_gallery)
    }

    /// Replace in-memory state with the durable mirror.
    ///
    /// A missing or corrupt record yields empty collections; this never
    /// fails.
    pub fn load_from_durable_storage(&mut self) {
        let doc = match self.storage.read(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<MirrorDocument>(&raw) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!(error = %e, key = %self.key, "corrupt durable mirror; starting empty");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, key = %self.key, "failed to read durable mirror; starting empty");
                None
            }
        };

        match doc {
            Some(doc) => {
                self.conversation_history = doc.conversation_history;
                self.image_gallery = doc.image_gallery;
            }
            None => {
                self.conversation_history.clear();
                self.image_gallery.clear();
            }
        }
        debug!(
            entries = self.conversation_history.len(),
            images = self.image_gallery.len(),
            "loaded session"
        );
        self.notify(ChangeKind::Loaded);
    }

    /// Write the full state to the durable mirror.
    ///
    /// Returns whether the write took effect; failures are logged only.
    pub fn save_to_durable_storage(&self) -> bool {
        let doc = MirrorDocument {
            conversation_history: self.conversation_history.clone(),
            image_gallery: self.image_gallery.clone(),
            timestamp: Utc::now(),
        };
        let result = serde_json::to_string(&doc)
            .map_err(AppError::from)
            .and_then(|raw| self.storage.write(&self.key, &raw));

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, key = %self.key, "failed to save durable mirror; operating in memory");
                false
            }
        }
    }

    /// Serialize the session for the user to keep.
    pub fn export_data(&self) -> AppResult<String> {
        if self.snapshot().is_empty() {
            return Err(AppError::Validation("No data to export".into()));
        }
        let now = Utc::now();
        let blob = TransferBlob {
            conversation_history: self.conversation_history.clone(),
            image_gallery: self.image_gallery.clone(),
            timestamp: now,
            export_timestamp: now,
            version: EXPORT_VERSION.to_string(),
        };
        Ok(serde_json::to_string_pretty(&blob)?)
    }

    /// Load a previously exported blob.
    ///
    /// Validation happens before any mutation, so a rejected blob leaves the
    /// store untouched.
    pub fn import_data(&mut self, blob: &str, strategy: MergeStrategy) -> AppResult<ImportSummary> {
        let payload = ImportPayload::parse(blob)?;
        let entries = payload.conversation_history.unwrap_or_default();
        let images = payload.image_gallery.unwrap_or_default();
        let summary = ImportSummary {
            entries: entries.len(),
            images: images.len(),
        };

        match strategy {
            MergeStrategy::Append => {
                self.conversation_history.extend(entries);
                self.image_gallery.extend(images);
            }
            MergeStrategy::Replace => {
                self.conversation_history = entries;
                self.image_gallery = images;
            }
        }
        info!(?strategy, entries = summary.entries, images = summary.images, "imported session data");
        self.commit(ChangeKind::Imported);
        Ok(summary)
    }

    fn commit(&self, kind: ChangeKind) {
        self.save_to_durable_storage();
        self.notify(kind);
    }

    fn notify(&self, kind: ChangeKind) {
        let snapshot = self.snapshot();
        for observer in &self.observers {
            observer.history_changed(kind, &snapshot);
        }
    }
}
