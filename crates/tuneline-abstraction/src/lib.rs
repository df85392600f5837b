//! Generation abstraction layer for Tuneline.
//!
//! This module defines the core trait and types the inference stage uses to talk
//! to a text generator, whether that is a locally trained adapter or a remote
//! model-serving endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// Transport failure or a non-success HTTP status.
    #[error("generation request failed: {0}")]
    RequestError(String),

    /// The server answered with an `{"error": ...}` payload.
    #[error("generator rejected request: {0}")]
    ModelResponseError(String),

    /// A request body or response payload did not match the wire contract.
    #[error("malformed generation payload: {0}")]
    SerializationError(String),

    /// The adapter directory could not be loaded.
    #[error("adapter unavailable: {0}")]
    ArtifactError(String),

    #[error("generation failed: {0}")]
    Other(String),
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender ("user" or "assistant").
    pub role: String,
    /// Turn text.
    pub content: String,
}

/// Parameters for controlling generation.
///
/// Mirrors the `parameters` object of the model-serving request contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Upper bound on generated tokens.
    pub max_new_tokens: u32,

    /// Sampling temperature. Ignored when `do_sample` is false.
    pub temperature: f32,

    /// Nucleus sampling mass. Ignored when `do_sample` is false.
    pub top_p: f32,

    /// Sample stochastically (true) or decode greedily (false).
    pub do_sample: bool,

    /// Seed for local samplers. Remote endpoints ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self { max_new_tokens: 200, temperature: 0.7, top_p: 0.95, do_sample: true, seed: None }
    }
}

/// A single generation request.
///
/// `prompt` is the user turn already rendered through the chat template.
/// `user_input` is the raw user turn, for generators that apply their own
/// template server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Raw user message.
    pub user_input: String,
    /// Template-rendered prompt ending in the assistant-start marker.
    pub prompt: String,
}

/// What a generator produced for one request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelResponse {
    /// Raw decoded text. May include the prompt and control markers.
    pub content: String,

    /// Model that answered, when the backend reports it.
    pub model_id: Option<String>,

    /// Token counts, when the backend reports them.
    pub usage: Option<ModelUsage>,
}

/// Token accounting for one generation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelUsage {
    pub prompt_tokens: u32,
    pub generated_tokens: u32,
}

/// A trait for text generators used by the inference stage.
///
/// All generators must be `Send + Sync` so one instance can serve a whole stage.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for one request.
    ///
    /// # Errors
    /// Returns a `ModelError` if generation fails. Callers in the inference
    /// stage absorb this into the prediction record rather than aborting.
    async fn generate(
        &self,
        request: &GenerationRequest,
        parameters: &GenerationParameters,
    ) -> Result<ModelResponse, ModelError>;

    /// Identifier reported in logs and prediction metadata.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_parameters_default() {
        let params = GenerationParameters::default();
        assert_eq!(params.max_new_tokens, 200);
        assert!(params.do_sample);
        assert!((params.top_p - 0.95).abs() < f32::EPSILON);
        assert_eq!(params.seed, None);
    }

    #[test]
    fn test_generation_parameters_skip_seed_when_unset() {
        let json = serde_json::to_value(GenerationParameters::default()).unwrap();
        assert!(json.get("seed").is_none());
        assert_eq!(json["max_new_tokens"], 200);
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::ModelResponseError("Empty prompt".to_string());
        assert_eq!(err.to_string(), "generator rejected request: Empty prompt");
    }
}
