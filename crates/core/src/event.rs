//! Presentation events: what the agent loop tells whoever is watching.
//!
//! Rendering is an external concern. The loop publishes `AgentEvent`s on an
//! `EventBus`; a CLI, a test, or a log sink subscribes and renders them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::action::ActionKind;

/// Progress events published during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The loop is waiting on the model for the given step (1-based).
    Thinking { step: usize, max_steps: usize },

    /// The model described what it is about to do.
    Plan { description: String },

    /// One action finished.
    Action {
        step: usize,
        action: ActionKind,
        path: String,
        success: bool,
        message: String,
    },

    /// The turn ended; `touched` lists every path written.
    Summary { text: String, touched: Vec<String> },

    /// A fault the user should see.
    Error { message: String },
}

impl AgentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Plan { .. } => "plan",
            Self::Action { .. } => "action",
            Self::Summary { .. } => "summary",
            Self::Error { .. } => "error",
        }
    }
}

/// A broadcast-based event bus for agent events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow subscribers
/// lag and lose old events; the loop never blocks on them.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
