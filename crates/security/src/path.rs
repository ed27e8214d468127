//! Path validation: filesystem sandboxing to the workspace root.
//!
//! Every path the model names is relative to the workspace root. A path is
//! accepted only if it stays under the root both lexically (after `.`/`..`
//! folding) and physically (after resolving symlinks on the part of the path
//! that already exists).

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path is empty")]
    Empty,

    #[error("Absolute path '{path}' is not allowed")]
    Absolute { path: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' escapes the workspace through a symlink")]
    SymlinkEscape { path: String },

    #[error("Workspace root '{root}' is unavailable: {reason}")]
    RootUnavailable { root: String, reason: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

impl PathValidationError {
    /// Short machine-friendly reason, used in sandbox violation messages.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Empty => "empty path",
            Self::Absolute { .. } => "absolute path",
            Self::PathTraversal { .. } => "path traversal",
            Self::SymlinkEscape { .. } => "symlink escape",
            Self::RootUnavailable { .. } => "workspace unavailable",
            Self::CanonicalizeFailed { .. } => "unresolvable path",
        }
    }
}

/// A path proven to lie inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePath {
    /// Absolute location on disk, under the canonical root.
    pub absolute: PathBuf,

    /// Normalized workspace-relative form with `/` separators.
    pub relative: String,
}

/// Resolve a model-supplied relative path against `root`.
///
/// Checks:
/// 1. Not empty, not absolute (Unix root, Windows drive or UNC prefix)
/// 2. Lexically normalized form never climbs above the root
/// 3. The nearest existing ancestor canonicalizes under the canonical root
///
/// Nothing on disk is created or modified.
pub fn resolve_in_workspace(root: &Path, path: &str) -> Result<WorkspacePath, PathValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(PathValidationError::Empty);
    }

    // Models emit Windows separators often enough to fold them everywhere.
    let unified = trimmed.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathValidationError::Absolute { path: path.into() });
    }

    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathValidationError::PathTraversal { path: path.into() });
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathValidationError::Absolute { path: path.into() });
            }
        }
    }

    let canonical_root =
        root.canonicalize()
            .map_err(|e| PathValidationError::RootUnavailable {
                root: root.display().to_string(),
                reason: e.to_string(),
            })?;

    let absolute = parts
        .iter()
        .fold(canonical_root.clone(), |acc, part| acc.join(part));

    check_existing_ancestor(&canonical_root, &absolute, path)?;

    let relative = if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    };

    Ok(WorkspacePath { absolute, relative })
}

/// Canonicalize the deepest part of `candidate` that exists and make sure it
/// is still under `root`. `symlink_metadata` is used so a dangling link is
/// treated as existing and then fails to canonicalize.
fn check_existing_ancestor(
    root: &Path,
    candidate: &Path,
    original: &str,
) -> Result<(), PathValidationError> {
    let mut probe = candidate;
    loop {
        if probe.symlink_metadata().is_ok() {
            let resolved =
                probe
                    .canonicalize()
                    .map_err(|e| PathValidationError::CanonicalizeFailed {
                        path: original.into(),
                        reason: e.to_string(),
                    })?;
            if resolved.starts_with(root) {
                return Ok(());
            }
            tracing::debug!(
                path = original,
                resolved = %resolved.display(),
                "Rejected path escaping workspace via symlink"
            );
            return Err(PathValidationError::SymlinkEscape {
                path: original.into(),
            });
        }
        match probe.parent() {
            Some(parent) if parent.starts_with(root) => probe = parent,
            _ => return Ok(()),
        }
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
