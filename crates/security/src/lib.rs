//! Security module for Deo: filesystem sandboxing to the workspace root.
//!
//! Provides:
//! - **Path validation**: every model-supplied path is resolved against the
//!   workspace root and rejected if it escapes, lexically or through a symlink

pub mod path;

pub use path::{PathValidationError, WorkspacePath, resolve_in_workspace};
