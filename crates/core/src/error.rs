//! Error types for the Deo domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` is the turn-level
//! error the orchestrator can return to its caller.

use thiserror::Error;

/// The turn-level error type.
///
/// Transport, plan and action failures are recorded in the turn report
/// instead, so only the conditions that stop a turn from being recorded
/// at all surface here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Request is empty")]
    EmptyRequest,

    // --- Persistence errors ---
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to the inference endpoint. Never retried by the client.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Inference endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Inference request failed: {message} (status: {status_code})")]
    Status { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed response body: {0}")]
    Decode(String),
}

/// The model's output did not match any recognised plan shape.
///
/// Carries the offending raw text for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct PlanParseError {
    pub reason: String,
    pub raw: String,
}

impl PlanParseError {
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// Action-scoped failures. All but `NoWorkspace` are recorded and the plan
/// continues with its next action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Access denied: '{path}' resolves outside the workspace ({reason})")]
    SandboxViolation { path: String, reason: String },

    #[error("{action} failed for '{path}': {reason}")]
    Execution {
        action: String,
        path: String,
        reason: String,
    },

    #[error("No workspace folder is open")]
    NoWorkspace,

    #[error("No active editor to insert code into")]
    NoEditTarget,

    #[error("Invalid action: {0}")]
    Invalid(String),
}

impl ActionError {
    /// Whether this failure aborts the whole turn rather than one action.
    pub fn is_turn_fatal(&self) -> bool {
        matches!(self, Self::NoWorkspace)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt value under key '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_correctly() {
        let err = TransportError::Status {
            status_code: 404,
            message: "model 'llama9' not found".into(),
        };
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("llama9"));
    }

    #[test]
    fn store_errors_convert_into_turn_errors() {
        fn record() -> Result<()> {
            let write: std::result::Result<(), StoreError> =
                Err(StoreError::SessionNotFound("0192".into()));
            write?;
            Ok(())
        }
        let err = record().unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::SessionNotFound(_))));
        assert_eq!(err.to_string(), "Session store error: Session not found: 0192");
    }

    #[test]
    fn sandbox_violation_mentions_access_denied() {
        let err = ActionError::SandboxViolation {
            path: "../outside.txt".into(),
            reason: "path traversal".into(),
        };
        assert!(err.to_string().starts_with("Access denied"));
        assert!(!err.is_turn_fatal());
    }

    #[test]
    fn only_missing_workspace_is_turn_fatal() {
        assert!(ActionError::NoWorkspace.is_turn_fatal());
        assert!(!ActionError::NoEditTarget.is_turn_fatal());
        assert!(!ActionError::Invalid("x".into()).is_turn_fatal());
    }

    #[test]
    fn plan_parse_error_keeps_raw_text() {
        let err = PlanParseError::new("unexpected end of input", "{\"action\": \"crea");
        assert_eq!(err.to_string(), "unexpected end of input");
        assert!(err.raw.starts_with("{\"action\""));
    }
}
