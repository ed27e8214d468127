//! `deo status`: show configuration and endpoint health.

use deo_config::AppConfig;
use deo_core::inference::InferenceClient;
use deo_providers::OllamaClient;

use super::{CliResult, load_config, open_sessions};

pub async fn run() -> CliResult {
    let config = load_config()?;

    println!("Deo Status");
    println!("==========");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!(
        "  Workspace:    {}",
        config
            .workspace_root()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".into())
    );
    println!("  Endpoint:     {}", config.inference.endpoint);
    println!(
        "  Model:        {}",
        config.inference.model.as_deref().unwrap_or("auto")
    );
    println!("  Fallback:     {}", config.inference.fallback_model);
    println!("  Streaming:    {}", if config.inference.stream { "on" } else { "off" });
    println!("  Temperature:  {}", config.inference.temperature);
    println!("  Mode:         {}", config.agent.mode);
    println!("  Max steps:    {}", config.agent.max_steps);
    println!(
        "  Session file: {}",
        config.sessions.resolved_store_path().display()
    );

    let sessions = open_sessions(&config).await?;
    println!(
        "  Sessions:     {} (active: {})",
        sessions.len(),
        sessions.active().title
    );

    let client = OllamaClient::from_config(&config.inference);
    match client.health_check().await {
        Ok(true) => println!("\n  Endpoint reachable"),
        Ok(false) => println!("\n  Endpoint answered but reported a problem"),
        Err(e) => println!("\n  Endpoint unreachable: {e}"),
    }

    if !AppConfig::config_dir().join("config.toml").exists() {
        println!("  No config file, run `deo onboard` to create one");
    }

    Ok(())
}
