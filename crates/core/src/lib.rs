//! # Deo Core
//!
//! Domain types, traits, and error definitions for the Deo coding-agent
//! orchestrator. This crate has **no I/O of its own**; it defines the domain
//! model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in their
//! respective crates:
//! - `InferenceClient`: the local model endpoint (`deo-providers`)
//! - `KeyValueStore`: session persistence (`deo-memory`)
//! - `EditSurface`: the active editing document (`deo-tools`, CLI)
//!
//! This keeps the agent loop testable with scripted fakes and no network.

pub mod action;
pub mod editor;
pub mod error;
pub mod event;
pub mod inference;
pub mod message;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use action::{ActionKind, ActionSpec, ExecutionOutcome, Plan};
pub use editor::EditSurface;
pub use error::{ActionError, Error, PlanParseError, Result, StoreError, TransportError};
pub use event::{AgentEvent, EventBus};
pub use inference::{GenerateOptions, GenerateRequest, GenerateResponse, InferenceClient};
pub use message::{Session, SessionId, SessionMessage};
pub use store::{ACTIVE_SESSION_KEY, KeyValueStore, SESSIONS_KEY};
