//! Declaration storage
//!
//! A small key/value blob store holding the last accepted declaration under
//! one key. The file backend keeps all keys in a single JSON document and
//! rewrites it atomically (write-then-rename) on save.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{ControllerError, Result};

/// The key the declaration blob lives under
pub const CONFIG_KEY: &str = "config";

/// Key/value blob storage
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load a value, `None` when the key is absent
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Save a value under a key
    async fn save(&self, key: &str, value: &Value) -> Result<()>;

    /// Remove a key; absent keys are fine
    async fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed storage: one JSON document of key → value
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write of the backing file
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create storage over the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ControllerError::storage(format!("corrupt state file: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(ControllerError::storage(e.to_string())),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ControllerError::storage(e.to_string()))?;
        }
        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| ControllerError::storage(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| ControllerError::storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| ControllerError::storage(e.to_string()))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.clone());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

/// In-memory storage for tests
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));

        assert!(storage.load(CONFIG_KEY).await.unwrap().is_none());

        let value = json!({"raw": {"class": "Telemetry"}});
        storage.save(CONFIG_KEY, &value).await.unwrap();
        assert_eq!(storage.load(CONFIG_KEY).await.unwrap(), Some(value));

        storage.remove(CONFIG_KEY).await.unwrap();
        assert!(storage.load(CONFIG_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_storage_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));

        storage.save("a", &json!(1)).await.unwrap();
        storage.save("b", &json!(2)).await.unwrap();
        storage.remove("a").await.unwrap();

        assert_eq!(storage.load("b").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_corrupt_file_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();

        let storage = FileStorage::new(path);
        assert!(storage.load(CONFIG_KEY).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state.json"));
        storage.remove("absent").await.unwrap();
    }
}
