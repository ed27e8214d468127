//! Terminal rendering of agent progress events.

use std::sync::Arc;

use deo_core::event::AgentEvent;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// One printable block per event.
pub fn format_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::Thinking { step, max_steps } if *max_steps > 1 => {
            format!("  ... thinking (step {step}/{max_steps})")
        }
        AgentEvent::Thinking { .. } => "  ... thinking".to_string(),
        AgentEvent::Plan { description } => format!("  Plan: {description}"),
        AgentEvent::Action {
            action,
            path,
            success,
            message,
            ..
        } => {
            let mark = if *success { "ok" } else { "FAILED" };
            format!("  [{mark}] {action} {path}: {message}")
        }
        AgentEvent::Summary { text, .. } => format!("\n  {text}\n"),
        AgentEvent::Error { message } => format!("  [Error] {message}"),
    }
}

/// Prints events from the bus as they arrive.
pub struct Renderer {
    task: JoinHandle<()>,
    turns: mpsc::UnboundedReceiver<()>,
}

impl Renderer {
    pub fn spawn(mut events: broadcast::Receiver<Arc<AgentEvent>>) -> Self {
        let (tx, turns) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        println!("{}", format_event(&event));
                        if matches!(*event, AgentEvent::Summary { .. }) {
                            let _ = tx.send(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Renderer fell behind, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { task, turns }
    }

    /// Wait until the summary of the current turn has been printed.
    pub async fn turn_finished(&mut self) {
        let _ = self.turns.recv().await;
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}
