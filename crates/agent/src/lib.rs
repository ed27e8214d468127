//! The agent loop, the heart of Deo.
//!
//! One user request becomes one *turn*:
//!
//! 1. **Record** the request in the active session
//! 2. **Build context**: workspace snapshot + memory digest (+ action history)
//! 3. **Ask the model** for a plan through the `InferenceClient`
//! 4. **Parse** the plan; iterative mode retries once per bad reply
//! 5. **Execute** each action in order inside the workspace sandbox
//!
//! Iterative mode repeats 3-5 until the model says `done` or the step budget
//! runs out. Single-shot mode runs them once.

pub mod context;
pub mod loop_runner;
pub mod plan_parser;
pub mod state;

pub use context::{ActionHistory, PromptParts, WorkspaceContextBuilder, WorkspaceSnapshot, build_prompt};
pub use loop_runner::{AgentLoop, TurnReport, TurnStatus};
pub use plan_parser::{ActionTag, parse_plan, strip_fences};
pub use state::{TurnEvent, TurnState};
