//! Session store: the ordered collection of chat sessions.
//!
//! Invariants held at every public boundary:
//! - at least one session exists and exactly one is active
//! - at most `max_sessions` sessions, oldest evicted first
//! - at most `max_messages` messages per session, oldest evicted first
//!
//! Every mutation is written through to the `KeyValueStore` before the call
//! returns. Mutating methods take `&mut self`, so two turns can never append
//! to the same store concurrently.

use std::sync::Arc;

use deo_core::error::StoreError;
use deo_core::message::{Session, SessionId, SessionMessage};
use deo_core::store::{ACTIVE_SESSION_KEY, KeyValueStore, SESSIONS_KEY};
use serde_json::Value;
use tracing::{debug, info, warn};

pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    /// Every session but the newest, oldest first.
    older: Vec<Session>,
    /// Held apart from `older` so the store can never be empty.
    newest: Session,
    active: SessionId,
    max_sessions: usize,
    max_messages: usize,
}

impl SessionStore {
    /// Load sessions from `backend`.
    ///
    /// Entries that fail to deserialize are skipped with a warning. If nothing
    /// usable remains a fresh session is created, so the store is never
    /// empty.
    pub async fn load(
        backend: Arc<dyn KeyValueStore>,
        max_sessions: usize,
        max_messages: usize,
    ) -> Result<Self, StoreError> {
        let max_sessions = max_sessions.max(1);
        let max_messages = max_messages.max(1);

        let raw = backend.get_or(SESSIONS_KEY, Value::Array(Vec::new())).await?;
        let mut sessions = decode_sessions(raw);

        for session in &mut sessions {
            let overflow = session.messages.len().saturating_sub(max_messages);
            if overflow > 0 {
                session.messages.drain(..overflow);
            }
        }
        let overflow = sessions.len().saturating_sub(max_sessions);
        if overflow > 0 {
            sessions.drain(..overflow);
        }

        let stored_active = backend
            .get(ACTIVE_SESSION_KEY)
            .await?
            .and_then(|v| v.as_str().map(SessionId::from));

        let (newest, created) = match sessions.pop() {
            Some(newest) => (newest, false),
            None => (Session::new(), true),
        };

        let active = match stored_active {
            Some(id) if newest.id == id || sessions.iter().any(|s| s.id == id) => id,
            _ => newest.id.clone(),
        };

        let store = Self {
            backend,
            older: sessions,
            newest,
            active,
            max_sessions,
            max_messages,
        };
        info!(
            backend = store.backend.name(),
            sessions = store.len(),
            active = %store.active,
            "Session store loaded"
        );
        if created {
            store.persist().await?;
        }
        Ok(store)
    }

    /// The active session.
    pub fn active(&self) -> &Session {
        self.list().find(|s| s.id == self.active).unwrap_or(&self.newest)
    }

    pub fn active_id(&self) -> &SessionId {
        &self.active
    }

    /// All sessions, oldest first.
    pub fn list(&self) -> impl DoubleEndedIterator<Item = &Session> {
        self.older.iter().chain(std::iter::once(&self.newest))
    }

    pub fn len(&self) -> usize {
        self.older.len() + 1
    }

    /// Always false: a loaded store holds at least one session.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.list().find(|s| s.id.0 == id)
    }

    /// Start a new empty session and make it active, evicting the oldest
    /// sessions beyond the cap.
    pub async fn new_session(&mut self) -> Result<&Session, StoreError> {
        let previous = std::mem::replace(&mut self.newest, Session::new());
        self.older.push(previous);
        self.active = self.newest.id.clone();

        let overflow = self
            .len()
            .saturating_sub(self.max_sessions)
            .min(self.older.len());
        if overflow > 0 {
            let evicted: Vec<SessionId> = self.older.drain(..overflow).map(|s| s.id).collect();
            debug!(?evicted, "Evicted oldest sessions");
        }

        self.persist().await?;
        info!(session = %self.active, "Started new session");
        Ok(self.active())
    }

    /// Make the session whose id is `id` (or uniquely starts with `id`)
    /// active.
    pub async fn switch(&mut self, id: &str) -> Result<&Session, StoreError> {
        let target = self.resolve(id)?;
        self.active = target;
        self.persist().await?;
        Ok(self.active())
    }

    /// Append a message to the active session and persist.
    pub async fn append(&mut self, message: SessionMessage) -> Result<(), StoreError> {
        let max_messages = self.max_messages;
        let active = self.active.clone();
        let session = self
            .older
            .iter_mut()
            .chain(std::iter::once(&mut self.newest))
            .find(|s| s.id == active)
            .ok_or_else(|| StoreError::SessionNotFound(active.0.clone()))?;

        let evicted = session.push(message, max_messages);
        if evicted > 0 {
            debug!(session = %active, evicted, "Trimmed session history");
        }
        self.persist().await
    }

    /// The active session's messages, minus the one just appended.
    pub fn history_excluding_last(&self) -> &[SessionMessage] {
        let messages = &self.active().messages;
        &messages[..messages.len().saturating_sub(1)]
    }

    /// Write sessions and the active id to the backend.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let all: Vec<&Session> = self.list().collect();
        let value = serde_json::to_value(&all).map_err(|e| StoreError::Corrupt {
            key: SESSIONS_KEY.into(),
            reason: e.to_string(),
        })?;
        self.backend.put(SESSIONS_KEY, value).await?;
        self.backend
            .put(ACTIVE_SESSION_KEY, Value::String(self.active.0.clone()))
            .await
    }

    fn resolve(&self, id: &str) -> Result<SessionId, StoreError> {
        if let Some(exact) = self.get(id) {
            return Ok(exact.id.clone());
        }
        let mut matches = self.list().filter(|s| !id.is_empty() && s.id.0.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Ok(only.id.clone()),
            _ => Err(StoreError::SessionNotFound(id.to_string())),
        }
    }
}

fn decode_sessions(raw: Value) -> Vec<Session> {
    let Value::Array(items) = raw else {
        warn!(key = SESSIONS_KEY, "Persisted sessions are not a list, ignoring them");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Session>(item) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(index, error = %e, "Skipping corrupted session");
                None
            }
        })
        .collect()
}
