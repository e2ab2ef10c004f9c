//! Key-value store persisted to a JSON file.
//!
//! The whole map is loaded at start and rewritten after every change. Write failures are logged
//! and otherwise ignored; the in-memory view stays authoritative.

use super::KeyValueStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
}

impl FileStorage {
    /// Load store from path; if file missing or invalid, starts empty.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                log::warn!("storage file {} is not valid JSON, starting empty: {}", path.display(), e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self) -> std::io::Result<()> {
        let entries = self.entries.read().await;
        let json = serde_json::to_string_pretty(&*entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            log::warn!("failed to persist storage to {}: {}", self.path.display(), e);
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStorage {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.entries.write().await.insert(key.to_string(), value);
        self.persist().await;
    }

    async fn delete(&self, key: &str) {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            self.persist().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("deskbot-storage-test-{}", uuid::Uuid::new_v4()))
            .join("state.json")
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let s = FileStorage::load(temp_path()).await;
        assert!(s.get("c1").await.is_none());
    }

    #[tokio::test]
    async fn values_survive_reload() {
        let path = temp_path();
        {
            let s = FileStorage::load(&path).await;
            s.set("c1", json!({ "count": 3 })).await;
            s.set("c2", json!({ "count": 1 })).await;
            s.delete("c2").await;
        }
        let s = FileStorage::load(&path).await;
        assert_eq!(s.get("c1").await, Some(json!({ "count": 3 })));
        assert!(s.get("c2").await.is_none());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn invalid_file_starts_empty() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();
        let s = FileStorage::load(&path).await;
        assert!(s.get("anything").await.is_none());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
