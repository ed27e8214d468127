//! Inference client implementations for Deo.
//!
//! All clients implement the `deo_core::InferenceClient` trait.

pub mod ollama;

pub use ollama::{DecodedStream, NdjsonDecoder, OllamaClient};
