//! In-process key-value store.

use super::KeyValueStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Values live only as long as the process.
pub struct MemoryStorage {
    inner: RwLock<HashMap<String, Value>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: Value) {
        self.inner.write().await.insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) {
        self.inner.write().await.remove(key);
    }
}
