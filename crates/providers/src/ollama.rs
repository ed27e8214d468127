//! Ollama provider implementation.
//!
//! Speaks the native Ollama HTTP API:
//! - `POST /api/generate`, buffered (`stream: false`) or newline-delimited
//!   JSON streaming (`stream: true`)
//! - `GET /api/tags` for model listing
//!
//! No retries and no request timeout: a slow local model is waited on, a
//! failed call is surfaced to the agent loop.

use async_trait::async_trait;
use deo_config::InferenceConfig;
use deo_core::error::TransportError;
use deo_core::inference::{GenerateOptions, GenerateRequest, GenerateResponse, InferenceClient};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// Client for a local Ollama server.
pub struct OllamaClient {
    base_url: String,
    configured_model: Option<String>,
    fallback_model: String,
    /// Model picked by the first resolution, reused afterwards.
    resolved_model: Mutex<Option<String>>,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for the server at `base_url` (e.g. `http://127.0.0.1:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            configured_model: None,
            fallback_model: "qwen2.5:latest".into(),
            resolved_model: Mutex::new(None),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        let mut client = Self::new(config.endpoint.clone()).with_fallback_model(config.fallback_model.clone());
        if let Some(model) = config.model.as_ref().filter(|m| !m.is_empty()) {
            client = client.with_model(model.clone());
        }
        client
    }

    /// Always use `model` instead of asking the server.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.configured_model = Some(model.into());
        self
    }

    /// Model used when none is configured and the server lists none.
    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pick the model: configured, else the first listed, else the fallback.
    /// The answer is cached for the lifetime of the client.
    pub async fn resolve_model(&self) -> String {
        if let Some(model) = &self.configured_model {
            return model.clone();
        }

        let mut cached = self.resolved_model.lock().await;
        if let Some(model) = cached.as_ref() {
            return model.clone();
        }

        let model = match self.list_models().await {
            Ok(models) => match models.into_iter().next() {
                Some(first) => first,
                None => {
                    debug!(fallback = %self.fallback_model, "Server lists no models");
                    self.fallback_model.clone()
                }
            },
            Err(e) => {
                warn!(error = %e, fallback = %self.fallback_model, "Model listing failed");
                self.fallback_model.clone()
            }
        };

        debug!(model = %model, "Resolved model");
        *cached = Some(model.clone());
        model
    }

    async fn send_generate(
        &self,
        body: &ApiGenerateRequest<'_>,
    ) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Ollama generate error");
            return Err(TransportError::Status {
                status_code: status.as_u16(),
                message: error_message(&error_body),
            });
        }
        Ok(response)
    }

    async fn read_buffered(
        response: reqwest::Response,
        model: String,
    ) -> Result<GenerateResponse, TransportError> {
        let body: ApiGenerateChunk = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(TransportError::Decode(error));
        }

        Ok(GenerateResponse {
            text: body.response.unwrap_or_default(),
            model: body.model.unwrap_or(model),
            fragments: 1,
            skipped_fragments: 0,
        })
    }

    async fn read_stream(
        response: reqwest::Response,
        model: String,
    ) -> Result<GenerateResponse, TransportError> {
        let mut byte_stream = response.bytes_stream();
        let mut decoder = NdjsonDecoder::new();

        while let Some(chunk) = byte_stream.next().await {
            let bytes = chunk.map_err(|e| TransportError::StreamInterrupted(e.to_string()))?;
            decoder.push(&bytes);
        }

        let decoded = decoder.finish();
        Ok(GenerateResponse {
            text: decoded.text,
            model: decoded.model.unwrap_or(model),
            fragments: decoded.fragments,
            skipped_fragments: decoded.skipped,
        })
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, TransportError> {
        let model = match request.model.as_ref().filter(|m| !m.is_empty()) {
            Some(model) => model.clone(),
            None => self.resolve_model().await,
        };

        let body = ApiGenerateRequest {
            model: &model,
            prompt: &request.prompt,
            stream: request.stream,
            format: request.format.as_deref(),
            options: request.options,
        };

        debug!(
            model = %model,
            stream = request.stream,
            prompt_chars = request.prompt.len(),
            "Sending generate request"
        );

        let response = self.send_generate(&body).await?;
        let result = if request.stream {
            Self::read_stream(response, model).await?
        } else {
            Self::read_buffered(response, model).await?
        };

        debug!(
            model = %result.model,
            chars = result.text.len(),
            fragments = result.fragments,
            skipped = result.skipped_fragments,
            "Generate complete"
        );
        Ok(result)
    }

    async fn list_models(&self) -> Result<Vec<String>, TransportError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status_code: status.as_u16(),
                message: error_message(&error_body),
            });
        }

        let tags: ApiTagsResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn health_check(&self) -> Result<bool, TransportError> {
        self.list_models().await.map(|_| true)
    }
}

/// Incremental decoder for Ollama's newline-delimited JSON stream.
///
/// Bytes are buffered until a full line is available, so fragments split
/// across network chunks (or in the middle of a UTF-8 sequence) decode
/// correctly. Malformed lines are logged and skipped; tokens decoded so far
/// are kept.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    text: String,
    model: Option<String>,
    fragments: usize,
    skipped: usize,
    done: bool,
}

/// What an `NdjsonDecoder` accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStream {
    pub text: String,
    pub model: Option<String>,
    pub fragments: usize,
    pub skipped: usize,
    pub done: bool,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the wire.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.handle_line(&line);
        }
    }

    /// Flush any trailing unterminated line and return the result.
    pub fn finish(mut self) -> DecodedStream {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.handle_line(&rest);
        }
        DecodedStream {
            text: self.text,
            model: self.model,
            fragments: self.fragments,
            skipped: self.skipped,
            done: self.done,
        }
    }

    fn handle_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<ApiGenerateChunk>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    warn!(error = %error, "Stream fragment carried an error");
                    self.skipped += 1;
                    return;
                }
                self.fragments += 1;
                if let Some(token) = chunk.response {
                    self.text.push_str(&token);
                }
                if self.model.is_none() {
                    self.model = chunk.model;
                }
                if chunk.done {
                    self.done = true;
                }
            }
            Err(e) => {
                warn!(error = %e, fragment = %truncate(line, 120), "Skipping malformed stream fragment");
                self.skipped += 1;
            }
        }
    }
}

/// Pull `error` out of an Ollama error body, or return the body as-is.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiGenerateChunk>(body) {
        Ok(ApiGenerateChunk { error: Some(error), .. }) => error,
        _ => {
            trace!(body, "Error body is not Ollama JSON");
            body.to_string()
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max).collect::<String>())
    }
}

// ── Ollama API types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: GenerateOptions,
}

/// Both the buffered body and each streamed line have this shape.
#[derive(Debug, Deserialize)]
struct ApiGenerateChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTagsResponse {
    #[serde(default)]
    models: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    name: String,
}
