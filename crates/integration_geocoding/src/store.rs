//! Persistent key-value storage port
//!
//! The geocoding cache persists itself as one serialized blob under a single
//! key. Hosts inject whichever [`KeyValueStore`] fits their platform; two
//! adapters ship with the crate:
//! - [`InMemoryStore`]: process-local, for tests and ephemeral hosts
//! - [`FileStore`]: one file per key inside a directory

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Errors raised by a storage adapter
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the underlying medium failed
    #[error("I/O error for key {key}: {message}")]
    Io {
        /// Key being accessed
        key: String,
        /// Underlying error text
        message: String,
    },

    /// The key cannot be mapped onto the medium
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// String key-value storage capability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never written
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value; removing a missing key is not an error
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.lock().remove(key);
        Ok(())
    }
}

/// Whether `key` can be stored by every bundled adapter
///
/// Keys are ASCII alphanumerics plus `_`, `-` and `.`, and must not start
/// with a dot.
#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Directory-backed store: each key lives in `<dir>/<key>.json`
///
/// Writes go through a uniquely named temp file and are serialized, so
/// concurrent writers of one key never see each other's partial files.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
    sequence: Arc<AtomicU64>,
}

impl FileStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Root directory of the store
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{key}.json.{}.{n}.tmp", std::process::id()))
    }
}

fn io_error(key: &str, err: &std::io::Error) -> StorageError {
    StorageError::Io {
        key: key.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key, &e)),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(key, &e))?;

        // Write to a sibling file first so a crash never leaves half a blob
        let tmp = self.temp_path_for(key);
        if let Err(e) = tokio::fs::write(&tmp, value).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(key, &e));
        }
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(key, &e))?;

        debug!(path = %path.display(), bytes = value.len(), "Stored item");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key, &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_roundtrip() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        store.set_item("k", "v").await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.len(), 1);

        store.remove_item("k").await.unwrap();
        assert!(store.get_item("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_remove_missing_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.remove_item("missing").await.is_ok());
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert!(store.get_item("nominatim_cache").await.unwrap().is_none());

        store.set_item("nominatim_cache", "{}").await.unwrap();
        assert_eq!(
            store.get_item("nominatim_cache").await.unwrap().as_deref(),
            Some("{}")
        );
        assert!(dir.path().join("nested/nominatim_cache.json").exists());

        store.set_item("nominatim_cache", "{\"a\":1}").await.unwrap();
        assert_eq!(
            store.get_item("nominatim_cache").await.unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.remove_item("nominatim_cache").await.unwrap();
        assert!(store.get_item("nominatim_cache").await.unwrap().is_none());
        assert!(store.remove_item("nominatim_cache").await.is_ok());
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(
                matches!(
                    store.set_item(key, "x").await,
                    Err(StorageError::InvalidKey(_))
                ),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn file_store_concurrent_writes_to_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .set_item("nominatim_cache", &format!("{{\"writer\":{i}}}"))
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get_item("nominatim_cache").await.unwrap().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert!(parsed["writer"].as_u64().is_some_and(|w| w < 64));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn key_validation() {
        assert!(is_valid_key("nominatim_cache"));
        assert!(is_valid_key("cache-v2.blob"));
        assert!(!is_valid_key("search:lagos"));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key(".hidden"));
        assert!(!is_valid_key(""));
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::Io {
            key: "nominatim_cache".to_string(),
            message: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("nominatim_cache"));
        assert!(err.to_string().contains("permission denied"));
    }
}
