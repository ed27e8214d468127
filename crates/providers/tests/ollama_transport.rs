//! Transport tests for the Ollama client against a fake server.
//!
//! An axum app on an ephemeral port plays the part of Ollama, so both the
//! buffered and the newline-delimited streaming paths run over real HTTP.

use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use deo_core::error::TransportError;
use deo_core::inference::{GenerateRequest, InferenceClient};
use deo_providers::OllamaClient;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct FakeOllama {
    /// Bodies received on /api/generate, in order.
    requests: Arc<Mutex<Vec<Value>>>,
    models: Vec<&'static str>,
}

impl FakeOllama {
    fn with_models(models: Vec<&'static str>) -> Self {
        Self {
            models,
            ..Self::default()
        }
    }

    fn last_request(&self) -> Value {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

async fn tags(State(state): State<FakeOllama>) -> Json<Value> {
    let models: Vec<Value> = state.models.iter().map(|m| json!({ "name": m })).collect();
    Json(json!({ "models": models }))
}

async fn generate(State(state): State<FakeOllama>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(body.clone());

    if body["model"] == "missing:latest" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "model 'missing:latest' not found" })),
        )
            .into_response();
    }

    if body["stream"] == true {
        // Second line is split across chunks, third is garbage.
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                b"{\"model\":\"fake\",\"response\":\"{\\\"action\\\":\",\"done\":false}\n{\"resp",
            )),
            Ok(Bytes::from_static(b"onse\":\" \\\"done\\\"\",\"done\":false}\n")),
            Ok(Bytes::from_static(b"<<garbage>>\n")),
            Ok(Bytes::from_static(b"{\"response\":\"}\",\"done\":true}\n")),
        ];
        return Response::builder()
            .header("content-type", "application/x-ndjson")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap();
    }

    Json(json!({
        "model": body["model"],
        "response": "{\"action\": \"done\"}",
        "done": true
    }))
    .into_response()
}

async fn spawn(state: FakeOllama) -> String {
    serve(
        Router::new()
            .route("/api/tags", get(tags))
            .route("/api/generate", post(generate))
            .with_state(state),
    )
    .await
}

/// A server that answers generate calls but has no model listing.
async fn spawn_without_tags(state: FakeOllama) -> String {
    serve(Router::new().route("/api/generate", post(generate)).with_state(state)).await
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn buffered_generate_returns_full_text() {
    let state = FakeOllama::default();
    let url = spawn(state.clone()).await;
    let client = OllamaClient::new(url).with_model("qwen2.5:latest");

    let response = client
        .generate(GenerateRequest::new("make a file").with_stream(false).with_temperature(0.3))
        .await
        .unwrap();

    assert_eq!(response.text, r#"{"action": "done"}"#);
    assert_eq!(response.model, "qwen2.5:latest");

    let body = state.last_request();
    assert_eq!(body["prompt"], "make a file");
    assert_eq!(body["stream"], false);
    assert_eq!(body["format"], "json");
    assert!(body["options"]["temperature"].as_f64().unwrap() < 0.31);
}

#[tokio::test]
async fn streaming_generate_concatenates_and_skips_garbage() {
    let state = FakeOllama::default();
    let url = spawn(state.clone()).await;
    let client = OllamaClient::new(url).with_model("qwen2.5:latest");

    let response = client
        .generate(GenerateRequest::new("go").with_stream(true))
        .await
        .unwrap();

    assert_eq!(response.text, r#"{"action": "done"}"#);
    assert_eq!(response.model, "fake");
    assert_eq!(response.fragments, 3);
    assert_eq!(response.skipped_fragments, 1);
    assert_eq!(state.last_request()["stream"], true);
}

#[tokio::test]
async fn model_resolves_to_first_listed_and_is_cached() {
    let state = FakeOllama::with_models(vec!["llama3.2:latest", "qwen2.5:latest"]);
    let url = spawn(state.clone()).await;
    let client = OllamaClient::new(url);

    client
        .generate(GenerateRequest::new("one").with_stream(false))
        .await
        .unwrap();
    assert_eq!(state.last_request()["model"], "llama3.2:latest");
    assert_eq!(client.resolve_model().await, "llama3.2:latest");
}

#[tokio::test]
async fn model_falls_back_when_server_lists_none() {
    let state = FakeOllama::with_models(vec![]);
    let url = spawn(state.clone()).await;
    let client = OllamaClient::new(url).with_fallback_model("qwen2.5:latest");

    client
        .generate(GenerateRequest::new("one").with_stream(false))
        .await
        .unwrap();
    assert_eq!(state.last_request()["model"], "qwen2.5:latest");
}

#[tokio::test]
async fn model_falls_back_when_listing_fails() {
    let state = FakeOllama::with_models(vec!["llama3:8b"]);
    let url = spawn_without_tags(state.clone()).await;
    let client = OllamaClient::new(url);

    assert!(matches!(
        client.list_models().await,
        Err(TransportError::Status { status_code: 404, .. })
    ));
    client
        .generate(GenerateRequest::new("one").with_stream(false))
        .await
        .unwrap();
    assert_eq!(state.last_request()["model"], "qwen2.5:latest");
}

#[tokio::test]
async fn list_models_reads_tags() {
    let url = spawn(FakeOllama::with_models(vec!["a:1", "b:2"])).await;
    let client = OllamaClient::new(url);
    assert_eq!(client.list_models().await.unwrap(), vec!["a:1", "b:2"]);
    assert!(client.health_check().await.unwrap());
}

#[tokio::test]
async fn non_success_status_is_transport_error() {
    let url = spawn(FakeOllama::default()).await;
    let client = OllamaClient::new(url).with_model("missing:latest");

    let err = client
        .generate(GenerateRequest::new("x").with_stream(false))
        .await
        .unwrap_err();

    match err {
        TransportError::Status {
            status_code,
            message,
        } => {
            assert_eq!(status_code, 404);
            assert!(message.contains("not found"));
        }
        other => panic!("Expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_transport_error() {
    // Grab a free port, then close it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OllamaClient::new(format!("http://{addr}")).with_model("qwen2.5:latest");
    let err = client.generate(GenerateRequest::new("x")).await.unwrap_err();
    assert!(matches!(err, TransportError::Unreachable(_)));
}
