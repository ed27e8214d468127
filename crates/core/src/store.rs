//! KeyValueStore trait: the host's persistent key-value storage.
//!
//! Sessions are persisted as JSON values under fixed keys. Backends decide
//! where the bytes live (memory, a JSON file).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Key holding the serialized session list.
pub const SESSIONS_KEY: &str = "deo.sessions";

/// Key holding the id of the active session.
pub const ACTIVE_SESSION_KEY: &str = "deo.activeSessionId";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// A human-readable name for this backend (e.g., "memory", "file").
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> std::result::Result<Option<Value>, StoreError>;

    /// Read a key, falling back to `default` when it is absent.
    async fn get_or(&self, key: &str, default: Value) -> std::result::Result<Value, StoreError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Write a key. Implementations persist before returning.
    async fn put(&self, key: &str, value: Value) -> std::result::Result<(), StoreError>;
}
