//! Memory digest: a compact rendering of recent session history.

use deo_core::message::SessionMessage;

/// Digest used when the session has no earlier messages.
pub const NO_PREVIOUS_CONTEXT: &str = "No previous context.";

/// Summarize the last `window` messages, one line each.
///
/// `user` messages are kept whole, `ai` messages keep their first line and
/// `step` messages become "action on path".
pub fn summarize_history(messages: &[SessionMessage], window: usize) -> String {
    let start = messages.len().saturating_sub(window);
    let lines: Vec<String> = messages[start..].iter().filter_map(digest_line).collect();

    if lines.is_empty() {
        return NO_PREVIOUS_CONTEXT.to_string();
    }
    lines.join("\n")
}

fn digest_line(message: &SessionMessage) -> Option<String> {
    match message {
        SessionMessage::User { text } => Some(format!("User: {}", text.trim())),
        SessionMessage::Ai { text } => {
            let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;
            Some(format!("AI: {first}"))
        }
        SessionMessage::Step {
            action,
            path,
            success,
            ..
        } => {
            let suffix = if *success { "" } else { " (failed)" };
            Some(format!("Step: {action} on {path}{suffix}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deo_core::action::ActionKind;

    #[test]
    fn empty_history_uses_placeholder() {
        assert_eq!(summarize_history(&[], 15), NO_PREVIOUS_CONTEXT);
    }

    #[test]
    fn each_kind_renders_one_line() {
        let messages = vec![
            SessionMessage::user("make a landing page"),
            SessionMessage::ai("Plan: create index.html\nthen style it"),
            SessionMessage::step(ActionKind::CreateFile, "index.html", true, "Success: Wrote to index.html"),
            SessionMessage::step(ActionKind::CreateFile, "../x", false, "Access denied"),
        ];

        let digest = summarize_history(&messages, 15);
        assert_eq!(
            digest,
            "User: make a landing page\n\
             AI: Plan: create index.html\n\
             Step: create_file on index.html\n\
             Step: create_file on ../x (failed)"
        );
    }

    #[test]
    fn only_recent_window_is_considered() {
        let messages: Vec<SessionMessage> =
            (0..20).map(|i| SessionMessage::user(format!("request {i}"))).collect();

        let digest = summarize_history(&messages, 15);
        assert_eq!(digest.lines().count(), 15);
        assert!(digest.starts_with("User: request 5"));
        assert!(digest.ends_with("User: request 19"));
    }

    #[test]
    fn blank_ai_message_is_dropped() {
        let messages = vec![SessionMessage::ai("   \n  ")];
        assert_eq!(summarize_history(&messages, 15), NO_PREVIOUS_CONTEXT);
    }
}
