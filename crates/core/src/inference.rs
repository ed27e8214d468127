//! InferenceClient trait: the abstraction over the local model endpoint.
//!
//! An InferenceClient sends one prompt and returns the full generated text.
//! Whether the wire is buffered or streamed is an implementation detail: the
//! agent loop only ever sees the concatenated result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Sampling options forwarded to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model to use. `None` lets the client resolve one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub prompt: String,

    /// Use the newline-delimited streaming transport.
    #[serde(default)]
    pub stream: bool,

    /// Output format hint, typically `"json"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default)]
    pub options: GenerateOptions,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            stream: true,
            format: Some("json".into()),
            options: GenerateOptions::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = temperature;
        self
    }
}

/// The complete generated text plus a few transport statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,

    /// Which model actually answered.
    pub model: String,

    /// Stream fragments received (1 for buffered responses).
    #[serde(default)]
    pub fragments: usize,

    /// Malformed fragments that were skipped.
    #[serde(default)]
    pub skipped_fragments: usize,
}

impl GenerateResponse {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            fragments: 1,
            skipped_fragments: 0,
        }
    }
}

/// The core InferenceClient trait.
///
/// The agent loop calls `generate()` without knowing which backend is in use.
/// Implementations must not retry: a failed call is surfaced to the loop,
/// which aborts the turn.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// A human-readable name for this client (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send one prompt and wait for the full text.
    async fn generate(
        &self,
        request: GenerateRequest,
    ) -> std::result::Result<GenerateResponse, TransportError>;

    /// List models available at the endpoint.
    async fn list_models(&self) -> std::result::Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    /// Can we reach the endpoint?
    async fn health_check(&self) -> std::result::Result<bool, TransportError> {
        Ok(true)
    }
}
