//! `deo agent`: interactive or single-request mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use deo_agent::{AgentLoop, TurnStatus};
use deo_config::LoopMode;
use deo_core::event::EventBus;
use deo_memory::SessionStore;
use deo_providers::OllamaClient;
use deo_tools::{ActionExecutor, FileSurface};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::render::Renderer;
use super::{CliResult, load_config, open_sessions};

pub struct AgentArgs {
    pub message: Option<String>,
    pub mode: Option<LoopMode>,
    pub workspace: Option<PathBuf>,
    pub editor: Option<String>,
}

pub async fn run(args: AgentArgs) -> CliResult {
    let mut config = load_config()?;
    if let Some(mode) = args.mode {
        config.agent.mode = mode;
    }
    if let Some(workspace) = args.workspace {
        config.workspace = Some(workspace);
    }

    let root = config.workspace_root();
    let surface = args.editor.as_deref().map(FileSurface::parse);
    let editor_label = surface.as_ref().map(|s| s.path().display().to_string());
    let mut executor = ActionExecutor::new(root.clone());
    if let Some(surface) = surface {
        executor = executor.with_editor(Arc::new(surface));
    }

    let client = Arc::new(OllamaClient::from_config(&config.inference));
    let event_bus = Arc::new(EventBus::default());
    let mut renderer = Renderer::spawn(event_bus.subscribe());
    let agent = AgentLoop::from_config(&config, client, executor, event_bus);
    let mut sessions = open_sessions(&config).await?;

    if let Some(message) = args.message {
        let status = run_turn(&agent, &mut sessions, &message, &mut renderer).await;
        renderer.shutdown();
        return match status? {
            TurnStatus::Aborted { reason } => Err(reason.into()),
            TurnStatus::Completed | TurnStatus::StepLimit => Ok(()),
        };
    }

    println!();
    println!("  Deo Agent, interactive mode");
    println!();
    println!("  Endpoint:  {}", config.inference.endpoint);
    println!(
        "  Model:     {}",
        config.inference.model.as_deref().unwrap_or("auto")
    );
    println!("  Mode:      {}", agent.mode());
    println!(
        "  Workspace: {}",
        root.as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".into())
    );
    println!("  Editor:    {}", editor_label.as_deref().unwrap_or("(none)"));
    println!("  Session:   {} ({})", sessions.active().title, sessions.active_id());
    println!();
    println!("  Type a request and press Enter. /new starts a fresh session.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "exit" | "quit" => break,
            "/new" => {
                let session = sessions.new_session().await?;
                println!("  Started session {}", session.id);
            }
            request => {
                if let Err(e) = run_turn(&agent, &mut sessions, request, &mut renderer).await {
                    eprintln!("  [Error] {e}");
                }
            }
        }
        prompt()?;
    }

    renderer.shutdown();
    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

async fn run_turn(
    agent: &AgentLoop,
    sessions: &mut SessionStore,
    request: &str,
    renderer: &mut Renderer,
) -> CliResult<TurnStatus> {
    let report = agent.process(sessions, request).await?;
    renderer.turn_finished().await;
    Ok(report.status)
}

fn prompt() -> CliResult {
    print!("  You > ");
    std::io::stdout().flush()?;
    Ok(())
}
