//! Action executor: applies one `ActionSpec` to the workspace.
//!
//! Every path-bearing action is checked against the sandbox before any
//! filesystem call. Failures never propagate as `Err`: they come back as an
//! `ExecutionOutcome` with `success: false` so the loop can record them and
//! move on to the next action.
//!
//! Writes auto-create missing parent directories, so `create_file a/b/c.txt`
//! succeeds even when the model emits it before `create_folder a/b`.

use std::path::PathBuf;
use std::sync::Arc;

use deo_core::action::{ActionKind, ActionSpec, ExecutionOutcome};
use deo_core::editor::EditSurface;
use deo_core::error::ActionError;
use deo_security::{PathValidationError, WorkspacePath, resolve_in_workspace};
use tracing::{debug, warn};

use crate::normalize::decode_escapes;

pub struct ActionExecutor {
    root: Option<PathBuf>,
    editor: Option<Arc<dyn EditSurface>>,
}

impl ActionExecutor {
    /// Create an executor rooted at `root`. With no root, every path-bearing
    /// action fails with `NoWorkspace`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root, editor: None }
    }

    /// Attach the document `insert_code` writes into.
    pub fn with_editor(mut self, editor: Arc<dyn EditSurface>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    pub fn has_editor(&self) -> bool {
        self.editor.is_some()
    }

    /// Execute one action.
    pub async fn execute(&self, action: &ActionSpec) -> ExecutionOutcome {
        let kind = action.kind();
        debug!(action = %kind, target = action.target_label(), "Executing action");

        match action {
            ActionSpec::CreateFolder { path } => match self.sandbox(kind, path) {
                Ok(target) => self.create_folder(target).await,
                Err(outcome) => outcome,
            },
            ActionSpec::CreateFile { path, content } | ActionSpec::EditFile { path, content } => {
                match self.sandbox(kind, path) {
                    Ok(target) => self.write_file(kind, target, content).await,
                    Err(outcome) => outcome,
                }
            }
            ActionSpec::InsertCode { content } => self.insert_code(content).await,
            ActionSpec::Done => ExecutionOutcome::ok(ActionKind::Done, "Task marked as done", None),
        }
    }

    /// Resolve `path` inside the workspace, or build the failing outcome.
    fn sandbox(&self, kind: ActionKind, path: &str) -> Result<WorkspacePath, ExecutionOutcome> {
        let Some(root) = &self.root else {
            return Err(ExecutionOutcome::failed(
                kind,
                Some(path.to_string()),
                ActionError::NoWorkspace,
            ));
        };

        resolve_in_workspace(root, path).map_err(|e| {
            let error = match e {
                PathValidationError::RootUnavailable { .. } => ActionError::NoWorkspace,
                PathValidationError::Empty => {
                    ActionError::Invalid(format!("{kind} requires a non-empty path"))
                }
                other => {
                    warn!(action = %kind, path, reason = other.reason(), "Sandbox violation");
                    ActionError::SandboxViolation {
                        path: path.to_string(),
                        reason: other.reason().to_string(),
                    }
                }
            };
            ExecutionOutcome::failed(kind, Some(path.to_string()), error)
        })
    }

    async fn create_folder(&self, target: WorkspacePath) -> ExecutionOutcome {
        match tokio::fs::create_dir_all(&target.absolute).await {
            Ok(()) => ExecutionOutcome::ok(
                ActionKind::CreateFolder,
                format!("Success: Created folder {}", target.relative),
                Some(target.relative),
            ),
            Err(e) => execution_failure(ActionKind::CreateFolder, target.relative, e),
        }
    }

    async fn write_file(&self, kind: ActionKind, target: WorkspacePath, content: &str) -> ExecutionOutcome {
        if let Some(parent) = target.absolute.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return execution_failure(kind, target.relative, e);
        }

        let decoded = decode_escapes(content);
        match tokio::fs::write(&target.absolute, decoded.as_bytes()).await {
            Ok(()) => {
                debug!(path = %target.relative, bytes = decoded.len(), "File written");
                ExecutionOutcome::ok(
                    kind,
                    format!("Success: Wrote to {}", target.relative),
                    Some(target.relative),
                )
            }
            Err(e) => execution_failure(kind, target.relative, e),
        }
    }

    async fn insert_code(&self, content: &str) -> ExecutionOutcome {
        let Some(editor) = &self.editor else {
            return ExecutionOutcome::failed(ActionKind::InsertCode, None, ActionError::NoEditTarget);
        };

        let decoded = decode_escapes(content);
        match editor.insert_at_cursor(&decoded).await {
            Ok(()) => ExecutionOutcome::ok(
                ActionKind::InsertCode,
                format!("Success: Inserted code into {}", editor.label()),
                None,
            ),
            Err(reason) => ExecutionOutcome::failed(
                ActionKind::InsertCode,
                None,
                ActionError::Execution {
                    action: ActionKind::InsertCode.to_string(),
                    path: editor.label(),
                    reason,
                },
            ),
        }
    }
}

fn execution_failure(kind: ActionKind, path: String, err: std::io::Error) -> ExecutionOutcome {
    warn!(action = %kind, path = %path, error = %err, "Action failed");
    ExecutionOutcome::failed(
        kind,
        Some(path.clone()),
        ActionError::Execution {
            action: kind.to_string(),
            path,
            reason: err.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    fn executor(dir: &tempfile::TempDir) -> ActionExecutor {
        ActionExecutor::new(Some(dir.path().to_path_buf()))
    }

    #[tokio::test]
    async fn create_folder_is_recursive_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(&dir);
        let action = ActionSpec::CreateFolder { path: "a/b/c".into() };

        let first = exec.execute(&action).await;
        assert!(first.success, "{}", first.message);
        assert_eq!(first.message, "Success: Created folder a/b/c");
        assert!(dir.path().join("a/b/c").is_dir());

        let second = exec.execute(&action).await;
        assert!(second.success);
    }

    #[tokio::test]
    async fn create_file_writes_decoded_content() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(&dir);

        let outcome = exec
            .execute(&ActionSpec::CreateFile {
                path: "index.html".into(),
                content: "<h1>Hi</h1>\\n<p>there</p>".into(),
            })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.message, "Success: Wrote to index.html");
        assert_eq!(outcome.path.as_deref(), Some("index.html"));
        let written = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert_eq!(written, "<h1>Hi</h1>\n<p>there</p>");
    }

    #[tokio::test]
    async fn edit_file_fully_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "a much longer original body").unwrap();
        let exec = executor(&dir);

        let outcome = exec
            .execute(&ActionSpec::EditFile {
                path: "notes.md".into(),
                content: "short".into(),
            })
            .await;

        assert!(outcome.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.md")).unwrap(), "short");
    }

    #[tokio::test]
    async fn folder_then_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(&dir);

        assert!(exec.execute(&ActionSpec::CreateFolder { path: "a/b".into() }).await.success);
        let file = exec
            .execute(&ActionSpec::CreateFile {
                path: "a/b/c.txt".into(),
                content: "x".into(),
            })
            .await;
        assert!(file.success);
        assert!(dir.path().join("a/b/c.txt").is_file());
    }

    #[tokio::test]
    async fn file_before_its_folder_auto_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(&dir);

        let file = exec
            .execute(&ActionSpec::CreateFile {
                path: "a/b/c.txt".into(),
                content: "x".into(),
            })
            .await;
        assert!(file.success);

        let folder = exec.execute(&ActionSpec::CreateFolder { path: "a/b".into() }).await;
        assert!(folder.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(), "x");
    }

    #[tokio::test]
    async fn traversal_is_rejected_without_touching_disk() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("project");
        std::fs::create_dir(&root).unwrap();
        let exec = ActionExecutor::new(Some(root.clone()));

        let outcome = exec
            .execute(&ActionSpec::CreateFile {
                path: "../outside.txt".into(),
                content: "pwned".into(),
            })
            .await;

        assert!(!outcome.success);
        assert!(outcome.message.contains("Access denied"));
        assert!(matches!(outcome.error, Some(ActionError::SandboxViolation { .. })));
        assert!(!parent.path().join("outside.txt").exists());
    }

    #[tokio::test]
    async fn absolute_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(&dir);

        let outcome = exec.execute(&ActionSpec::CreateFolder { path: "/tmp/evil".into() }).await;
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(ActionError::SandboxViolation { .. })));
    }

    #[tokio::test]
    async fn no_workspace_is_turn_fatal() {
        let exec = ActionExecutor::new(None);
        let outcome = exec
            .execute(&ActionSpec::CreateFile {
                path: "a.txt".into(),
                content: String::new(),
            })
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ActionError::NoWorkspace));
        assert!(outcome.is_turn_fatal());
    }

    #[tokio::test]
    async fn filesystem_error_becomes_failed_outcome() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("taken"), "i am a file").unwrap();
        let exec = executor(&dir);

        let outcome = exec
            .execute(&ActionSpec::CreateFile {
                path: "taken/child.txt".into(),
                content: "x".into(),
            })
            .await;

        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(ActionError::Execution { .. })));
        assert!(!outcome.is_turn_fatal());
    }

    #[tokio::test]
    async fn insert_code_without_editor_reports_no_target() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(&dir);

        let outcome = exec
            .execute(&ActionSpec::InsertCode {
                content: "let x = 1;".into(),
            })
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error, Some(ActionError::NoEditTarget));
        assert!(!outcome.is_turn_fatal());
    }

    #[tokio::test]
    async fn insert_code_uses_editor() {
        let surface = Arc::new(MemorySurface::new("main.rs", "fn main() {}", Some(0)));
        let exec = ActionExecutor::new(None).with_editor(surface.clone());

        let outcome = exec
            .execute(&ActionSpec::InsertCode {
                content: "use std::io;\\n".into(),
            })
            .await;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(surface.content().await, "use std::io;\nfn main() {}");
    }

    #[tokio::test]
    async fn done_never_touches_filesystem() {
        let exec = ActionExecutor::new(None);
        let outcome = exec.execute(&ActionSpec::Done).await;
        assert!(outcome.success);
        assert_eq!(outcome.action, ActionKind::Done);
    }
}
