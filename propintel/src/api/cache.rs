//! Response cache with per-entry expiry, optionally mirrored to durable storage.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::DurableStorage;

/// Storage shared between the session mirror and the response caches.
pub type SharedStorage = Arc<dyn DurableStorage + Send + Sync>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

type Entries<V> = HashMap<String, CacheEntry<V>>;

struct Mirror {
    storage: SharedStorage,
    key: String,
}

/// Caches values by key for a fixed time-to-live.
///
/// Expired entries are evicted lazily on lookup. When mirrored, every change
/// rewrites the whole map under the mirror key so later processes see it.
pub struct ResponseCache<V> {
    ttl: Duration,
    entries: Mutex<Entries<V>>,
    mirror: Option<Mirror>,
}

impl<V> fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("mirror", &self.mirror.as_ref().map(|m| m.key.as_str()))
            .finish_non_exhaustive()
    }
}

impl<V: Clone + Serialize + DeserializeOwned> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            mirror: None,
        }
    }

    /// Load entries stored under `key` and keep mirroring changes there.
    ///
    /// Unreadable or malformed mirrors start the cache empty.
    pub fn mirrored(mut self, storage: SharedStorage, key: impl Into<String>) -> Self {
        let key = key.into();
        let loaded = match storage.read(&key) {
            Ok(Some(json)) => serde_json::from_str::<Entries<V>>(&json).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "discarding malformed response cache");
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(key = %key, error = %e, "response cache unavailable");
                HashMap::new()
            }
        };
        self.entries = Mutex::new(loaded);
        self.mirror = Some(Mirror { storage, key });

        let purged = self.purge_expired();
        debug!(entries = self.len(), purged, "response cache loaded");
        self
    }

    /// Cached value for `key`, if present and not yet expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => {
                debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                debug!(key, "cache entry expired");
                self.save(&entries);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        if self.ttl.is_zero() {
            return;
        }
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.lock();
        entries.insert(key.into(), CacheEntry { value, expires_at });
        self.save(&entries);
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let purged = before - entries.len();
        if purged > 0 {
            self.save(&entries);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn save(&self, entries: &Entries<V>) {
        let Some(mirror) = &self.mirror else {
            return;
        };
        let result = serde_json::to_string(entries)
            .map_err(crate::error::AppError::from)
            .and_then(|json| mirror.storage.write(&mirror.key, &json));
        if let Err(e) = result {
            warn!(key = %mirror.key, error = %e, "failed to persist response cache");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries<V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::store::MemoryStorage;

    #[test]
    fn returns_fresh_values() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("questions", vec!["a".to_string()]);
        assert_eq!(cache.get("questions"), Some(vec!["a".to_string()]));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expires_values() {
        let cache = ResponseCache::new(Duration::from_millis(5));
        cache.insert("a", 1);
        cache.insert("b", 2);
        thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_ttl_disables_caching() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.insert("a", 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn mirrored_entries_outlive_the_cache() {
        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let first = ResponseCache::new(Duration::from_secs(60)).mirrored(Arc::clone(&storage), "rc");
        first.insert("q", "answer".to_string());
        drop(first);

        let second: ResponseCache<String> =
            ResponseCache::new(Duration::from_secs(60)).mirrored(Arc::clone(&storage), "rc");
        assert_eq!(second.get("q").as_deref(), Some("answer"));
    }

    #[test]
    fn expired_mirror_entries_are_dropped_on_load() {
        let storage = Arc::new(MemoryStorage::new());
        let first = ResponseCache::new(Duration::from_millis(5)).mirrored(storage.clone(), "rc");
        first.insert("q", 1_u32);
        thread::sleep(Duration::from_millis(20));

        let second: ResponseCache<u32> =
            ResponseCache::new(Duration::from_secs(60)).mirrored(storage.clone(), "rc");
        assert_eq!(second.len(), 0);
        assert_eq!(storage.read("rc").unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn malformed_mirror_starts_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write("rc", "not json").unwrap();
        let cache: ResponseCache<u32> =
            ResponseCache::new(Duration::from_secs(60)).mirrored(storage, "rc");
        assert_eq!(cache.len(), 0);
        cache.insert("q", 3);
        assert_eq!(cache.get("q"), Some(3));
    }
}
