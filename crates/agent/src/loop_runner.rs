//! The agent loop implementation.

use std::sync::Arc;

use deo_config::{AppConfig, ContextConfig, InferenceConfig, LoopMode};
use deo_core::action::{ExecutionOutcome, Plan};
use deo_core::error::{Error, Result};
use deo_core::event::{AgentEvent, EventBus};
use deo_core::inference::{GenerateOptions, GenerateRequest, InferenceClient};
use deo_core::message::SessionMessage;
use deo_memory::SessionStore;
use deo_tools::ActionExecutor;
use tracing::{debug, info, warn};

use crate::context::{ActionHistory, PromptParts, WorkspaceContextBuilder, build_prompt, summarize_history};
use crate::plan_parser::parse_plan;
use crate::state::{TurnEvent, TurnState};

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// The model signalled `done`, or a single-shot plan ran to its end.
    Completed,
    /// Iterative mode ran out of steps.
    StepLimit,
    Aborted { reason: String },
}

/// What a turn did, returned to the caller.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub status: TurnStatus,

    /// Inference rounds consumed.
    pub steps: usize,

    pub corrective_notes: usize,

    /// Paths written, in first-touch order.
    pub touched: Vec<String>,

    pub outcomes: Vec<ExecutionOutcome>,

    /// The closing text recorded as the last `ai` message.
    pub summary: String,
}

impl TurnReport {
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}

/// Per-turn scratch state.
struct Turn {
    steps: usize,
    raw: String,
    plan: Option<Plan>,
    history: ActionHistory,
    outcomes: Vec<ExecutionOutcome>,
    touched: Vec<String>,
    done_signalled: bool,
    abort_reason: Option<String>,
}

impl Turn {
    fn new(history_window: usize) -> Self {
        Self {
            steps: 0,
            raw: String::new(),
            plan: None,
            history: ActionHistory::new(history_window),
            outcomes: Vec::new(),
            touched: Vec::new(),
            done_signalled: false,
            abort_reason: None,
        }
    }

    fn touch(&mut self, path: &str) {
        if !self.touched.iter().any(|p| p == path) {
            self.touched.push(path.to_string());
        }
    }
}

/// Drives one user request through context, inference, parsing and
/// execution until the turn reaches `Done` or `Aborted`.
pub struct AgentLoop {
    client: Arc<dyn InferenceClient>,

    executor: ActionExecutor,

    event_bus: Arc<EventBus>,

    context: WorkspaceContextBuilder,

    mode: LoopMode,

    /// Inference rounds allowed per iterative turn
    max_steps: usize,

    /// Action/result pairs replayed into each iterative prompt
    history_window: usize,

    /// Session messages summarized into the memory digest
    memory_window: usize,

    /// Model override; `None` lets the client resolve one
    model: Option<String>,

    stream: bool,

    format: Option<String>,

    temperature: f32,
}

impl AgentLoop {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        executor: ActionExecutor,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            executor,
            event_bus,
            context: WorkspaceContextBuilder::default(),
            mode: LoopMode::default(),
            max_steps: 15,
            history_window: 10,
            memory_window: 15,
            model: None,
            stream: true,
            format: Some("json".into()),
            temperature: GenerateOptions::default().temperature,
        }
    }

    /// Build a loop with every knob taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn InferenceClient>,
        executor: ActionExecutor,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(client, executor, event_bus)
            .with_mode(config.agent.mode)
            .with_max_steps(config.agent.max_steps)
            .with_history_window(config.agent.history_window)
            .with_memory_window(config.agent.memory_window)
            .with_context_limits(config.context.clone())
            .with_inference(&config.inference)
    }

    pub fn with_mode(mut self, mode: LoopMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_memory_window(mut self, window: usize) -> Self {
        self.memory_window = window;
        self
    }

    pub fn with_context_limits(mut self, limits: ContextConfig) -> Self {
        self.context = WorkspaceContextBuilder::new(limits);
        self
    }

    pub fn with_inference(mut self, config: &InferenceConfig) -> Self {
        self.model = config.model.clone();
        self.stream = config.stream;
        self.format = Some(config.format.clone()).filter(|f| !f.is_empty());
        self.temperature = config.temperature;
        self
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Run one turn for `request` against the active session.
    ///
    /// Only a failure to record the request itself is returned as `Err`.
    /// Transport faults, unparseable plans and failed actions all end up in
    /// the `TurnReport` and in the session log.
    pub async fn process(&self, sessions: &mut SessionStore, request: &str) -> Result<TurnReport> {
        let request = request.trim();
        if request.is_empty() {
            return Err(Error::EmptyRequest);
        }

        info!(
            session = %sessions.active_id(),
            mode = %self.mode,
            "Processing request"
        );

        let mut state = self.advance(TurnState::Idle, TurnEvent::Submit)?;

        sessions.append(SessionMessage::user(request)).await?;
        let memory = summarize_history(sessions.history_excluding_last(), self.memory_window);
        let workspace = self.workspace_context().await;
        state = self.advance(state, TurnEvent::ContextBuilt)?;

        let mut turn = Turn::new(self.history_window);
        let budget = self.step_budget();

        while !state.is_terminal() {
            let event = match state {
                TurnState::AwaitingInference => {
                    turn.steps += 1;
                    let parts = PromptParts {
                        request,
                        workspace: &workspace,
                        memory: &memory,
                        history: &turn.history.render(),
                        step: turn.steps,
                        max_steps: budget,
                    };
                    let prompt = build_prompt(self.mode, &parts);
                    self.infer(prompt, &mut turn).await
                }
                TurnState::ParsingPlan => self.parse(&mut turn),
                TurnState::ExecutingActions => self.execute_plan(sessions, &mut turn).await,
                TurnState::Continue => TurnEvent::NextRound,
                TurnState::Idle
                | TurnState::BuildingContext
                | TurnState::Done
                | TurnState::Aborted => {
                    return Err(Error::Internal(format!("turn stalled in {state:?}")));
                }
            };
            state = self.advance(state, event)?;
        }

        Ok(self.finish(sessions, state, turn).await)
    }

    fn advance(&self, state: TurnState, event: TurnEvent) -> Result<TurnState> {
        state
            .next(event, self.mode)
            .ok_or_else(|| Error::Internal(format!("invalid transition {state:?} on {event:?}")))
    }

    fn step_budget(&self) -> usize {
        match self.mode {
            LoopMode::Iterative => self.max_steps,
            LoopMode::SingleShot => 1,
        }
    }

    async fn workspace_context(&self) -> String {
        let builder = self.context.clone();
        let root = self.executor.root().cloned();
        match tokio::task::spawn_blocking(move || builder.build(root.as_deref())).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Workspace scan did not finish");
                String::new()
            }
        }
    }

    async fn infer(&self, prompt: String, turn: &mut Turn) -> TurnEvent {
        let max_steps = self.step_budget();
        self.event_bus.publish(AgentEvent::Thinking {
            step: turn.steps,
            max_steps,
        });
        debug!(step = turn.steps, prompt_chars = prompt.len(), "Requesting plan");

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: self.stream,
            format: self.format.clone(),
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        match self.client.generate(request).await {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    fragments = response.fragments,
                    skipped = response.skipped_fragments,
                    "Model responded"
                );
                turn.raw = response.text;
                TurnEvent::ResponseReceived
            }
            Err(e) => {
                warn!(client = self.client.name(), error = %e, "Inference failed");
                turn.abort_reason = Some(e.to_string());
                TurnEvent::TransportFailed
            }
        }
    }

    fn parse(&self, turn: &mut Turn) -> TurnEvent {
        match parse_plan(&turn.raw) {
            Ok(plan) => {
                debug!(actions = plan.len(), "Plan accepted");
                turn.plan = Some(plan);
                TurnEvent::PlanAccepted
            }
            Err(e) => {
                let preview: String = e.raw.chars().take(200).collect();
                warn!(reason = %e.reason, raw = %preview, "Unparseable model output");
                match self.mode {
                    LoopMode::Iterative => turn.history.record_correction(&e.reason),
                    LoopMode::SingleShot => {
                        turn.abort_reason = Some(format!("Could not parse the model's plan: {e}"));
                    }
                }
                TurnEvent::PlanRejected {
                    budget_left: turn.steps < self.step_budget(),
                }
            }
        }
    }

    async fn execute_plan(&self, sessions: &mut SessionStore, turn: &mut Turn) -> TurnEvent {
        let plan = turn.plan.take().unwrap_or_default();

        if let Some(description) = plan.description.as_deref().map(str::trim)
            && !description.is_empty()
        {
            self.event_bus.publish(AgentEvent::Plan {
                description: description.to_string(),
            });
            record(sessions, SessionMessage::ai(format!("Plan: {description}"))).await;
        }

        let mut fatal = false;
        for action in &plan.actions {
            if action.is_done() {
                turn.done_signalled = true;
                break;
            }

            let outcome = self.executor.execute(action).await;
            let target = outcome
                .path
                .clone()
                .unwrap_or_else(|| action.target_label().to_string());

            record(
                sessions,
                SessionMessage::step(action.kind(), target.clone(), outcome.success, outcome.message.clone()),
            )
            .await;
            self.event_bus.publish(AgentEvent::Action {
                step: turn.steps,
                action: action.kind(),
                path: target,
                success: outcome.success,
                message: outcome.message.clone(),
            });

            if self.mode == LoopMode::Iterative {
                turn.history.record_action(action, &outcome);
            }
            if outcome.success
                && let Some(path) = &outcome.path
            {
                turn.touch(path);
            }

            fatal = outcome.is_turn_fatal();
            if fatal {
                turn.abort_reason = Some(outcome.message.clone());
            }
            turn.outcomes.push(outcome);
            if fatal {
                break;
            }
        }

        TurnEvent::ActionsApplied {
            done_signalled: turn.done_signalled,
            budget_left: turn.steps < self.step_budget(),
            fatal,
        }
    }

    async fn finish(&self, sessions: &mut SessionStore, state: TurnState, turn: Turn) -> TurnReport {
        let status = match (state, turn.abort_reason) {
            (TurnState::Aborted, reason) => TurnStatus::Aborted {
                reason: reason.unwrap_or_else(|| "turn aborted".into()),
            },
            _ if turn.done_signalled || self.mode == LoopMode::SingleShot => TurnStatus::Completed,
            _ => TurnStatus::StepLimit,
        };

        let headline = match &status {
            TurnStatus::Completed => "Task completed.".to_string(),
            TurnStatus::StepLimit => format!("Max steps reached ({}).", self.max_steps),
            TurnStatus::Aborted { reason } => {
                self.event_bus.publish(AgentEvent::Error {
                    message: reason.clone(),
                });
                format!("Error: {reason}")
            }
        };
        let summary = if turn.touched.is_empty() {
            format!("{headline} No files were changed.")
        } else {
            format!("{headline} Touched: {}", turn.touched.join(", "))
        };

        info!(
            steps = turn.steps,
            actions = turn.outcomes.len(),
            touched = turn.touched.len(),
            status = ?status,
            "Turn finished"
        );

        record(sessions, SessionMessage::ai(summary.clone())).await;
        self.event_bus.publish(AgentEvent::Summary {
            text: summary.clone(),
            touched: turn.touched.clone(),
        });

        TurnReport {
            status,
            steps: turn.steps,
            corrective_notes: turn.history.notes_issued(),
            touched: turn.touched,
            outcomes: turn.outcomes,
            summary,
        }
    }
}

/// Append to the session mid-turn. A store failure here is logged and the
/// turn goes on: the filesystem has already changed.
async fn record(sessions: &mut SessionStore, message: SessionMessage) {
    if let Err(e) = sessions.append(message).await {
        warn!(error = %e, "Failed to record session message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deo_core::action::ActionKind;
    use deo_core::error::TransportError;
    use deo_core::inference::GenerateResponse;
    use deo_memory::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::context::history::INVALID_JSON_NOTE;

    /// Replays canned responses in order and remembers every prompt.
    struct ScriptedClient {
        responses: Mutex<VecDeque<std::result::Result<String, TransportError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<std::result::Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn ok(responses: &[&str]) -> Arc<Self> {
            Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: GenerateRequest,
        ) -> std::result::Result<GenerateResponse, TransportError> {
            self.prompts.lock().unwrap().push(request.prompt);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(r#"{"action":"done"}"#.into()));
            next.map(|text| GenerateResponse::new(text, "scripted-model"))
        }
    }

    async fn sessions() -> SessionStore {
        SessionStore::load(Arc::new(InMemoryStore::new()), 20, 200).await.unwrap()
    }

    fn agent(client: Arc<ScriptedClient>, root: &std::path::Path, mode: LoopMode) -> (AgentLoop, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        let executor = ActionExecutor::new(Some(root.to_path_buf()));
        (AgentLoop::new(client, executor, bus.clone()).with_mode(mode), bus)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Arc<AgentEvent>>) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    #[tokio::test]
    async fn single_shot_writes_planned_file() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&[
            r#"{"plan":"add index.html","actions":[{"action":"create_file","path":"index.html","content":"<html></html>"}]}"#,
        ]);
        let (agent, bus) = agent(client, dir.path(), LoopMode::SingleShot);
        let mut rx = bus.subscribe();
        let mut store = sessions().await;

        let report = agent.process(&mut store, "create a hello world html file").await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.steps, 1);
        assert_eq!(report.touched, vec!["index.html".to_string()]);
        assert!(report.summary.contains("index.html"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<html></html>"
        );

        let messages = &store.active().messages;
        let steps = messages
            .iter()
            .filter(|m| matches!(m, SessionMessage::Step { .. }))
            .count();
        assert_eq!(steps, 1);
        assert!(matches!(messages.first(), Some(SessionMessage::User { .. })));
        assert!(matches!(messages.last(), Some(SessionMessage::Ai { text }) if text.contains("index.html")));

        let kinds: Vec<&str> = drain(&mut rx).iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["thinking", "plan", "action", "summary"]);
    }

    #[tokio::test]
    async fn sandbox_violation_is_scoped_to_one_action() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&[
            r#"[{"action":"create_file","path":"../outside.txt","content":"x"},{"action":"create_file","path":"inside.txt","content":"y"}]"#,
        ]);
        let (agent, _bus) = agent(client, dir.path(), LoopMode::SingleShot);
        let mut store = sessions().await;

        let report = agent.process(&mut store, "write two files").await.unwrap();

        assert!(report.is_completed());
        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.outcomes[0].success);
        assert!(report.outcomes[0].message.contains("Access denied"));
        assert!(report.outcomes[1].success);
        assert!(!dir.path().parent().unwrap().join("outside.txt").exists());
        assert!(dir.path().join("inside.txt").exists());
        assert_eq!(report.touched, vec!["inside.txt".to_string()]);
    }

    #[tokio::test]
    async fn iterative_runs_until_done() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&[
            r#"{"action":"create_folder","path":"src"}"#,
            r#"{"action":"create_file","path":"src/app.js","content":"console.log(1);\\n"}"#,
            r#"{"action":"done"}"#,
        ]);
        let (agent, _bus) = agent(client.clone(), dir.path(), LoopMode::Iterative);
        let mut store = sessions().await;

        let report = agent.process(&mut store, "scaffold an app").await.unwrap();

        assert_eq!(report.status, TurnStatus::Completed);
        assert_eq!(report.steps, 3);
        assert_eq!(report.touched, vec!["src".to_string(), "src/app.js".to_string()]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/app.js")).unwrap(),
            "console.log(1);\n"
        );

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("No actions taken yet."));
        assert!(prompts[1].contains("System Result: Success: Created folder src"));
        assert!(prompts[2].contains("step 3 of 15"));
    }

    #[tokio::test]
    async fn invalid_json_gets_one_corrective_note() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&[r#"{"action": "create_fi"#, r#"{"action":"done"}"#]);
        let (agent, _bus) = agent(client.clone(), dir.path(), LoopMode::Iterative);
        let mut store = sessions().await;

        let report = agent.process(&mut store, "do something").await.unwrap();

        assert_eq!(report.status, TurnStatus::Completed);
        assert_eq!(report.steps, 2);
        assert_eq!(report.corrective_notes, 1);
        assert!(report.summary.starts_with("Task completed"));
        assert!(client.prompts()[1].contains(INVALID_JSON_NOTE));
    }

    #[tokio::test]
    async fn single_shot_aborts_on_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&["not json at all"]);
        let (agent, bus) = agent(client, dir.path(), LoopMode::SingleShot);
        let mut rx = bus.subscribe();
        let mut store = sessions().await;

        let report = agent.process(&mut store, "do something").await.unwrap();

        assert!(matches!(report.status, TurnStatus::Aborted { .. }));
        assert!(report.outcomes.is_empty());
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, AgentEvent::Error { .. })));
    }

    #[tokio::test]
    async fn transport_failure_aborts_and_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::new(vec![Err(TransportError::Unreachable(
            "connection refused".into(),
        ))]);
        let (agent, _bus) = agent(client, dir.path(), LoopMode::Iterative);
        let mut store = sessions().await;

        let report = agent.process(&mut store, "make a file").await.unwrap();

        match &report.status {
            TurnStatus::Aborted { reason } => assert!(reason.contains("connection refused")),
            other => panic!("Expected Aborted, got {other:?}"),
        }
        assert_eq!(report.steps, 1);
        assert!(matches!(
            store.active().messages.last(),
            Some(SessionMessage::Ai { text }) if text.contains("connection refused")
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn iterative_stops_at_step_limit() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&[
            r#"{"action":"create_folder","path":"a"}"#,
            r#"{"action":"create_folder","path":"b"}"#,
            r#"{"action":"create_folder","path":"c"}"#,
            r#"{"action":"create_folder","path":"d"}"#,
        ]);
        let (agent, _bus) = agent(client.clone(), dir.path(), LoopMode::Iterative);
        let agent = agent.with_max_steps(3);
        let mut store = sessions().await;

        let report = agent.process(&mut store, "keep going").await.unwrap();

        assert_eq!(report.status, TurnStatus::StepLimit);
        assert_eq!(report.steps, 3);
        assert_eq!(client.prompts().len(), 3);
        assert!(!dir.path().join("d").exists());
        assert!(report.summary.starts_with("Max steps reached"));
    }

    #[tokio::test]
    async fn missing_workspace_is_turn_fatal() {
        let client = ScriptedClient::ok(&[
            r#"[{"action":"create_file","path":"a.txt","content":"x"},{"action":"create_file","path":"b.txt","content":"y"}]"#,
        ]);
        let bus = Arc::new(EventBus::default());
        let agent = AgentLoop::new(client, ActionExecutor::new(None), bus).with_mode(LoopMode::SingleShot);
        let mut store = sessions().await;

        let report = agent.process(&mut store, "write files").await.unwrap();

        assert!(matches!(report.status, TurnStatus::Aborted { .. }));
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].action, ActionKind::CreateFile);
    }

    #[tokio::test]
    async fn earlier_turns_feed_the_memory_digest() {
        let dir = tempfile::tempdir().unwrap();
        let client = ScriptedClient::ok(&[r#"{"action":"done"}"#, r#"{"action":"done"}"#]);
        let (agent, _bus) = agent(client.clone(), dir.path(), LoopMode::Iterative);
        let mut store = sessions().await;

        agent.process(&mut store, "first request").await.unwrap();
        agent.process(&mut store, "second request").await.unwrap();

        let prompts = client.prompts();
        assert!(prompts[0].contains("No previous context."));
        assert!(prompts[1].contains("User: first request"));
        assert!(!prompts[1].contains("User: second request"));
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (agent, _bus) = agent(ScriptedClient::ok(&[]), dir.path(), LoopMode::Iterative);
        let mut store = sessions().await;

        assert!(matches!(
            agent.process(&mut store, "   ").await,
            Err(Error::EmptyRequest)
        ));
        assert!(store.active().messages.is_empty());
    }
}
