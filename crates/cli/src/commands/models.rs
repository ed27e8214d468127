//! `deo models`: list models served by the inference endpoint.

use deo_core::inference::InferenceClient;
use deo_providers::OllamaClient;

use super::{CliResult, load_config};

pub async fn run() -> CliResult {
    let config = load_config()?;
    let client = OllamaClient::from_config(&config.inference);

    println!("Models at {}", client.base_url());
    let models = client
        .list_models()
        .await
        .map_err(|e| format!("Could not list models: {e}"))?;

    if models.is_empty() {
        println!("  (none installed, try: ollama pull {})", config.inference.fallback_model);
    }
    for model in &models {
        let marker = if config.inference.model.as_deref() == Some(model.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {model}");
    }
    Ok(())
}
