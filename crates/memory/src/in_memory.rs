//! In-memory key-value store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use deo_core::error::StoreError;
use deo_core::store::KeyValueStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A store that keeps values in a HashMap and forgets them on drop.
pub struct InMemoryStore {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryStore::new();
        store.put("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_or_falls_back_to_default() {
        let store = InMemoryStore::new();
        let value = store.get_or("missing", json!([])).await.unwrap();
        assert_eq!(value, json!([]));
    }
}
