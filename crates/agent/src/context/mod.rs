//! Prompt context: everything the model sees besides the request itself.
//!
//! | Part | Source | Bound |
//! |------|--------|-------|
//! | Workspace | files on disk | depth, file count, char budget |
//! | Memory digest | session history | last N messages |
//! | Action history | this turn's rounds | last K entries |

pub mod digest;
pub mod history;
pub mod prompt;
pub mod workspace;

pub use digest::{NO_PREVIOUS_CONTEXT, summarize_history};
pub use history::ActionHistory;
pub use prompt::{PromptParts, build_prompt};
pub use workspace::{WorkspaceContextBuilder, WorkspaceSnapshot};
