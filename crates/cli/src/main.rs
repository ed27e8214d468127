//! Deo CLI, the main entry point.
//!
//! Commands:
//! - `onboard`   Write a default config file
//! - `agent`     Interactive or single-request mode
//! - `sessions`  List, create, switch or show chat sessions
//! - `models`    List models at the inference endpoint
//! - `status`    Show configuration and endpoint health

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deo_config::LoopMode;

mod commands;

#[derive(Parser)]
#[command(
    name = "deo",
    about = "Deo: an autonomous coding agent backed by a local model",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Ask the agent to change your project
    Agent {
        /// Run a single request instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Loop mode: iterative or single_shot
        #[arg(long)]
        mode: Option<LoopMode>,

        /// Workspace root (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// File that receives insert_code actions, as FILE or FILE:OFFSET
        #[arg(long)]
        editor: Option<String>,
    },

    /// Manage chat sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// List models available at the inference endpoint
    Models,

    /// Show configuration and endpoint health
    Status,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List sessions, newest first
    List,

    /// Start a new session and make it active
    New,

    /// Make a session active (full id or unique prefix)
    Switch { id: String },

    /// Print a session's messages (the active one by default)
    Show { id: Option<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with agent output.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent {
            message,
            mode,
            workspace,
            editor,
        } => {
            commands::agent::run(commands::agent::AgentArgs {
                message,
                mode,
                workspace,
                editor,
            })
            .await?
        }
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list().await?,
            SessionsAction::New => commands::sessions::new().await?,
            SessionsAction::Switch { id } => commands::sessions::switch(&id).await?,
            SessionsAction::Show { id } => commands::sessions::show(id.as_deref()).await?,
        },
        Commands::Models => commands::models::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
