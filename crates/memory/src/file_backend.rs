//! File-based key-value store: one JSON document on disk.
//!
//! The whole map is loaded on creation and rewritten on every `put`, so a
//! crash never loses more than the write in flight. The file is
//! human-inspectable and needs no database.
//!
//! Storage location: `~/.deo/sessions.json` by default.

use async_trait::async_trait;
use deo_core::error::StoreError;
use deo_core::store::KeyValueStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed store holding a single JSON object of key → value.
pub struct FileStore {
    path: PathBuf,
    values: Arc<RwLock<Map<String, Value>>>,
}

impl FileStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty (created on first write). A file that is
    /// not a JSON object is logged and ignored; it is replaced on the next
    /// write.
    pub fn new(path: PathBuf) -> Self {
        let values = Self::load_from_disk(&path);
        debug!(path = %path.display(), keys = values.len(), "File store loaded");
        Self {
            path,
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Map<String, Value> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Map::new(),
        };
        if content.trim().is_empty() {
            return Map::new();
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                warn!(path = %path.display(), kind = json_kind(&other), "Store file is not a JSON object, starting empty");
                Map::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Store file is corrupt, starting empty");
                Map::new()
            }
        }
    }

    /// Write the whole map through a temp file and rename it into place.
    async fn flush(&self) -> Result<(), StoreError> {
        let body = {
            let values = self.values.read().await;
            serde_json::to_string_pretty(&*values)
                .map_err(|e| StoreError::Storage(format!("Failed to serialize store: {e}")))?
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to replace store file: {e}")))?;

        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.write().await.insert(key.to_string(), value);
        self.flush().await
    }
}
