//! Durable key/value storage backing the session mirror.

#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(test)]
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{AppError, AppResult};

/// Storage holding whole JSON documents under string keys.
pub trait DurableStorage {
    /// Read the document stored under `key`, or `None` if absent.
    fn read(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the document stored under `key`.
    fn write(&self, key: &str, value: &str) -> AppResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the storage directory; it is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location: `<data_dir>/propintel`.
    pub fn default_dir() -> AppResult<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join("propintel"))
            .ok_or_else(|| AppError::Storage("could not determine data directory".into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DurableStorage for FileStorage {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Storage(format!("failed to create {}: {e}", self.dir.display()))
        })?;

        // Write to a sibling temp file, then rename over the target.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp)
            .map_err(|e| AppError::Storage(format!("failed to create {}: {e}", tmp.display())))?;
        file.write_all(value.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| AppError::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| AppError::Storage(format!("failed to replace {}: {e}", path.display())))?;

        debug!(path = %path.display(), bytes = value.len(), "wrote durable mirror");
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed durable mirror");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }
}

/// In-process storage, lost when dropped.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[cfg(test)]
impl DurableStorage for MemoryStorage {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

impl<T: DurableStorage + ?Sized> DurableStorage for Arc<T> {
    fn read(&self, key: &str) -> AppResult<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str) -> AppResult<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        (**self).remove(key)
    }
}
