//! Session and message domain types.
//!
//! These are the value objects persisted across runs:
//! User sends a request → `user` message → agent executes actions → one `step`
//! message per action → `ai` messages for plan, summary, or error text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ActionKind;

/// Title given to a session before its first user message.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Longest auto-derived title, in characters.
const TITLE_MAX_CHARS: usize = 40;

/// Unique identifier for a session.
///
/// Backed by a UUID v7 so ids sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single entry in a session's message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionMessage {
    /// A request typed by the user.
    User { text: String },

    /// Response or status text from the agent (plan, summary, error).
    Ai { text: String },

    /// Record of one executed action.
    Step {
        action: ActionKind,
        path: String,
        #[serde(default = "default_true")]
        success: bool,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        detail: String,
    },
}

fn default_true() -> bool {
    true
}

impl SessionMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self::Ai { text: text.into() }
    }

    pub fn step(
        action: ActionKind,
        path: impl Into<String>,
        success: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self::Step {
            action,
            path: path.into(),
            success,
            detail: detail.into(),
        }
    }
}

/// A chat session: an ordered message log plus a short human label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub messages: Vec<SessionMessage>,

    pub created_at: DateTime<Utc>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Session {
    /// Create a new empty session.
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            title: default_title(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a message, dropping the oldest entries beyond `max_messages`.
    ///
    /// The first user message also names the session. Returns how many
    /// messages were evicted.
    pub fn push(&mut self, message: SessionMessage, max_messages: usize) -> usize {
        if let SessionMessage::User { text } = &message
            && self.title == DEFAULT_TITLE
            && !self.messages.iter().any(|m| matches!(m, SessionMessage::User { .. }))
        {
            self.title = derive_title(text);
        }

        self.messages.push(message);

        let overflow = self.messages.len().saturating_sub(max_messages.max(1));
        if overflow > 0 {
            self.messages.drain(..overflow);
        }
        overflow
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a one-line title from the first user message.
pub fn derive_title(text: &str) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.is_empty() {
        return default_title();
    }
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", cut.trim_end())
}
