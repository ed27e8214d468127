//! EditSurface trait: the document the user is currently editing.
//!
//! `insert_code` actions write into whatever surface the host injects. A host
//! with no open document simply injects nothing.

use async_trait::async_trait;

#[async_trait]
pub trait EditSurface: Send + Sync {
    /// Short description shown in progress output (e.g. a file name).
    fn label(&self) -> String;

    /// Insert text at the current cursor position.
    async fn insert_at_cursor(&self, text: &str) -> std::result::Result<(), String>;
}
