//! `deo sessions`: inspect and switch chat sessions.

use deo_core::message::{Session, SessionMessage};
use deo_memory::SessionStore;

use super::{CliResult, load_config, open_sessions};

async fn store() -> CliResult<SessionStore> {
    let config = load_config()?;
    open_sessions(&config).await
}

pub async fn list() -> CliResult {
    let sessions = store().await?;
    let active = sessions.active_id().clone();

    println!("Sessions ({})", sessions.len());
    for session in sessions.list().rev() {
        let marker = if session.id == active { "*" } else { " " };
        println!("{}", session_line(marker, session));
    }
    Ok(())
}

pub async fn new() -> CliResult {
    let mut sessions = store().await?;
    let session = sessions.new_session().await?;
    println!("Started session {}", session.id);
    Ok(())
}

pub async fn switch(id: &str) -> CliResult {
    let mut sessions = store().await?;
    let session = sessions.switch(id).await?;
    println!("Active session: {} ({})", session.title, session.id);
    Ok(())
}

pub async fn show(id: Option<&str>) -> CliResult {
    let sessions = store().await?;
    let session = match id {
        Some(id) => sessions
            .list()
            .find(|s| s.id.0 == id || s.id.0.starts_with(id))
            .ok_or_else(|| format!("Session not found: {id}"))?,
        None => sessions.active(),
    };

    println!("{} ({})", session.title, session.id);
    if session.messages.is_empty() {
        println!("  (no messages)");
    }
    for message in &session.messages {
        println!("{}", message_line(message));
    }
    Ok(())
}

fn session_line(marker: &str, session: &Session) -> String {
    format!(
        "{marker} {}  {}  {:>4} msgs  {}",
        session.id,
        session.created_at.format("%Y-%m-%d %H:%M"),
        session.messages.len(),
        session.title
    )
}

fn message_line(message: &SessionMessage) -> String {
    match message {
        SessionMessage::User { text } => format!("  You > {text}"),
        SessionMessage::Ai { text } => format!("  Deo > {text}"),
        SessionMessage::Step {
            action,
            path,
            success,
            detail,
        } => {
            let mark = if *success { "ok" } else { "FAILED" };
            if detail.is_empty() {
                format!("    [{mark}] {action} {path}")
            } else {
                format!("    [{mark}] {action} {path}: {detail}")
            }
        }
    }
}
