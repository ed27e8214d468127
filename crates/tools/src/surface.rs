//! `EditSurface` implementations.
//!
//! `FileSurface` stands in for an open editor: a file on disk plus a cursor
//! offset. `MemorySurface` keeps the buffer in memory and is used by tests.

use async_trait::async_trait;
use deo_core::editor::EditSurface;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// A file on disk treated as the active document.
///
/// The cursor is a character offset; `None` means end of file. After each
/// insert the cursor moves past the inserted text, like typing.
pub struct FileSurface {
    path: PathBuf,
    cursor: Mutex<Option<usize>>,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>, cursor: Option<usize>) -> Self {
        Self {
            path: path.into(),
            cursor: Mutex::new(cursor),
        }
    }

    /// Parse `FILE` or `FILE:OFFSET`.
    pub fn parse(spec: &str) -> Self {
        if let Some((file, offset)) = spec.rsplit_once(':')
            && !file.is_empty()
            && let Ok(offset) = offset.parse::<usize>()
        {
            return Self::new(file, Some(offset));
        }
        Self::new(spec, None)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl EditSurface for FileSurface {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    async fn insert_at_cursor(&self, text: &str) -> Result<(), String> {
        let mut cursor = self.cursor.lock().await;

        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(format!("Failed to read {}: {e}", self.path.display())),
        };

        let (updated, next) = splice(&existing, *cursor, text);
        tokio::fs::write(&self.path, updated)
            .await
            .map_err(|e| format!("Failed to write {}: {e}", self.path.display()))?;

        *cursor = Some(next);
        Ok(())
    }
}

/// An in-memory document.
#[derive(Default)]
pub struct MemorySurface {
    label: String,
    state: Mutex<(String, Option<usize>)>,
}

impl MemorySurface {
    pub fn new(label: impl Into<String>, content: impl Into<String>, cursor: Option<usize>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new((content.into(), cursor)),
        }
    }

    pub async fn content(&self) -> String {
        self.state.lock().await.0.clone()
    }
}

#[async_trait]
impl EditSurface for MemorySurface {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn insert_at_cursor(&self, text: &str) -> Result<(), String> {
        let mut state = self.state.lock().await;
        let (updated, next) = splice(&state.0, state.1, text);
        *state = (updated, Some(next));
        Ok(())
    }
}

/// Insert `text` at character offset `cursor` (clamped to the end).
/// Returns the new buffer and the character offset just past the insertion.
fn splice(existing: &str, cursor: Option<usize>, text: &str) -> (String, usize) {
    let total = existing.chars().count();
    let at = cursor.unwrap_or(total).min(total);
    let byte_at = existing
        .char_indices()
        .nth(at)
        .map(|(i, _)| i)
        .unwrap_or(existing.len());

    let mut out = String::with_capacity(existing.len() + text.len());
    out.push_str(&existing[..byte_at]);
    out.push_str(text);
    out.push_str(&existing[byte_at..]);
    (out, at + text.chars().count())
}
