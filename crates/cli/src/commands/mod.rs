//! Subcommand implementations.

pub mod agent;
pub mod models;
pub mod onboard;
pub mod render;
pub mod sessions;
pub mod status;

use std::sync::Arc;

use deo_config::AppConfig;
use deo_memory::{FileStore, SessionStore};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<AppConfig> {
    AppConfig::load().map_err(|e| format!("Failed to load config: {e}").into())
}

/// Open the JSON-file session store named by `config`.
pub async fn open_sessions(config: &AppConfig) -> CliResult<SessionStore> {
    let backend = Arc::new(FileStore::new(config.sessions.resolved_store_path()));
    let store = SessionStore::load(
        backend,
        config.sessions.max_sessions,
        config.sessions.max_messages,
    )
    .await?;
    Ok(store)
}
