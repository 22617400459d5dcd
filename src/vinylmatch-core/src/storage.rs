//! String-keyed, JSON-valued persistent storage.
//!
//! All callers treat storage as best-effort: the `*_json` helpers log and
//! swallow failures so a broken disk degrades features instead of failing
//! the page.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create storage directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("failed to serialize value for {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Minimal key/value contract shared by the on-disk and in-memory stores.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Reads and parses a JSON value; missing, unreadable or malformed data
/// yields `None`.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read stored value");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring malformed stored value");
            None
        }
    }
}

/// Serializes and stores a JSON value, logging failures.
pub fn write_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(source) => {
            let e = StorageError::Serialize {
                key: key.to_string(),
                source,
            };
            tracing::warn!(error = %e, "failed to serialize stored value");
            return false;
        }
    };
    match store.set(key, &raw) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to persist value");
            false
        }
    }
}

pub fn remove_quietly(store: &dyn KeyValueStore, key: &str) {
    if let Err(e) = store.remove(key) {
        tracing::warn!(key, error = %e, "failed to remove stored value");
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        // Full-value overwrite through a temp file so readers never see a torn write.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|source| StorageError::Write {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StorageError::Write { path, source })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove { path, source }),
        }
    }
}

/// Process-local store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .lock()
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .values
            .lock()
            .ok()
            .and_then(|values| values.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("storage"));

        assert_eq!(store.get("vm:recentPlaylists").unwrap(), None);
        store.set("vm:recentPlaylists", "[]").unwrap();
        assert_eq!(store.get("vm:recentPlaylists").unwrap().as_deref(), Some("[]"));

        store.remove("vm:recentPlaylists").unwrap();
        store.remove("vm:recentPlaylists").unwrap();
        assert_eq!(store.get("vm:recentPlaylists").unwrap(), None);
    }

    #[test]
    fn file_store_sanitizes_key_names() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("vm:playlistCache:../../etc", "{}").unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(store.get("vm:playlistCache:../../etc").unwrap().is_some());
    }

    #[test]
    fn malformed_json_reads_as_none() {
        let store = MemoryStore::new();
        store.set("broken", "{not json").unwrap();
        let value: Option<Vec<String>> = read_json(&store, "broken");
        assert!(value.is_none());
    }

    #[test]
    fn write_json_then_read_json() {
        let store = MemoryStore::new();
        assert!(write_json(&store, "list", &vec!["a", "b"]));
        let value: Option<Vec<String>> = read_json(&store, "list");
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(store.keys(), vec!["list".to_string()]);
    }
}
