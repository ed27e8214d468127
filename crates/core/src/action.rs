//! Actions the model can request, and the outcome of executing one.
//!
//! `ActionSpec` is a closed sum type. Decoding from untrusted model text goes
//! through `ActionKind::from_tag`, which never guesses: an unknown tag is
//! reported to the caller instead of being mapped onto some default.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// The tag of an action, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateFolder,
    CreateFile,
    EditFile,
    InsertCode,
    Done,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::CreateFolder,
        ActionKind::CreateFile,
        ActionKind::EditFile,
        ActionKind::InsertCode,
        ActionKind::Done,
    ];

    /// The wire tag used in model output and persisted step messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateFolder => "create_folder",
            Self::CreateFile => "create_file",
            Self::EditFile => "edit_file",
            Self::InsertCode => "insert_code",
            Self::Done => "done",
        }
    }

    /// Match a raw tag exactly. `None` means the tag is not one we know.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == tag)
    }

    /// Whether this action operates on a workspace path.
    pub fn requires_path(&self) -> bool {
        matches!(self, Self::CreateFolder | Self::CreateFile | Self::EditFile)
    }

    /// Whether this action writes file content.
    pub fn writes_content(&self) -> bool {
        matches!(self, Self::CreateFile | Self::EditFile)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    CreateFolder { path: String },
    CreateFile { path: String, content: String },
    EditFile { path: String, content: String },
    InsertCode { content: String },
    Done,
}

impl ActionSpec {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::CreateFolder { .. } => ActionKind::CreateFolder,
            Self::CreateFile { .. } => ActionKind::CreateFile,
            Self::EditFile { .. } => ActionKind::EditFile,
            Self::InsertCode { .. } => ActionKind::InsertCode,
            Self::Done => ActionKind::Done,
        }
    }

    /// The workspace-relative path, for path-bearing actions.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::CreateFolder { path }
            | Self::CreateFile { path, .. }
            | Self::EditFile { path, .. } => Some(path),
            Self::InsertCode { .. } | Self::Done => None,
        }
    }

    /// The raw (not yet escape-decoded) content, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::CreateFile { content, .. }
            | Self::EditFile { content, .. }
            | Self::InsertCode { content } => Some(content),
            Self::CreateFolder { .. } | Self::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Compact JSON form, used when replaying actions into a prompt.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"action\":\"{}\"}}", self.kind()))
    }

    /// Short label for progress output: the path, or where code went.
    pub fn target_label(&self) -> &str {
        match self {
            Self::InsertCode { .. } => "active editor",
            Self::Done => "-",
            _ => self.path().unwrap_or_default(),
        }
    }
}

/// An ordered list of actions produced by one inference round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Optional one-line description of what the plan does.
    pub description: Option<String>,

    pub actions: Vec<ActionSpec>,
}

impl Plan {
    pub fn new(description: Option<String>, actions: Vec<ActionSpec>) -> Self {
        Self {
            description,
            actions,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// The result of executing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub action: ActionKind,

    pub success: bool,

    /// Human-readable result text.
    pub message: String,

    /// Normalized workspace-relative path written, for write actions.
    pub path: Option<String>,

    /// The scoped failure, when `success` is false.
    pub error: Option<ActionError>,
}

impl ExecutionOutcome {
    pub fn ok(action: ActionKind, message: impl Into<String>, path: Option<String>) -> Self {
        Self {
            action,
            success: true,
            message: message.into(),
            path,
            error: None,
        }
    }

    pub fn failed(action: ActionKind, path: Option<String>, error: ActionError) -> Self {
        Self {
            action,
            success: false,
            message: format!("Error: {error}"),
            path,
            error: Some(error),
        }
    }

    /// Whether this outcome must abort the whole turn.
    pub fn is_turn_fatal(&self) -> bool {
        self.error.as_ref().is_some_and(ActionError::is_turn_fatal)
    }
}
