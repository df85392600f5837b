//! Model-serving endpoint client.
//!
//! Speaks the custom prediction contract of the deployed fine-tuned model:
//! `POST {"instances": [{"prompt": ...}], "parameters": {...}}` answered by
//! `{"predictions": [{"generated_text": ...}]}` or `{"predictions": [{"error": ...}]}`.
//! The server applies the chat template, so the raw user turn is sent.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use tuneline_abstraction::{
    GenerationParameters, GenerationRequest, ModelError, ModelResponse, TextGenerator,
};

/// Remote generator behind an HTTP prediction endpoint.
#[derive(Debug, Clone)]
pub struct EndpointModel {
    /// Identifier reported in responses.
    model_id: String,
    /// Full prediction URL (e.g. `http://localhost:8080/predict`).
    endpoint_url: String,
    /// HTTP client for making requests.
    client: Client,
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: Vec<PredictInstance<'a>>,
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
struct PredictParameters {
    max_new_tokens: u32,
    temperature: f32,
    top_p: f32,
    do_sample: bool,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    #[serde(default)]
    generated_text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl EndpointModel {
    #[must_use]
    pub fn new(model_id: String, endpoint_url: String) -> Self {
        Self { model_id, endpoint_url, client: Client::new() }
    }

    /// Parameters the serving handler applies when a request omits them.
    #[must_use]
    pub fn handler_defaults() -> GenerationParameters {
        GenerationParameters {
            max_new_tokens: 256,
            temperature: 0.7,
            top_p: 0.9,
            do_sample: true,
            seed: None,
        }
    }

    #[must_use]
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }
}

#[async_trait]
impl TextGenerator for EndpointModel {
    async fn generate(
        &self,
        request: &GenerationRequest,
        parameters: &GenerationParameters,
    ) -> Result<ModelResponse, ModelError> {
        if request.user_input.trim().is_empty() {
            return Err(ModelError::ModelResponseError("Empty prompt".to_string()));
        }

        debug!(
            model_id = %self.model_id,
            endpoint = %self.endpoint_url,
            prompt_len = request.user_input.len(),
            "EndpointModel generating text"
        );

        let body = PredictRequest {
            instances: vec![PredictInstance { prompt: &request.user_input }],
            parameters: PredictParameters {
                max_new_tokens: parameters.max_new_tokens,
                temperature: parameters.temperature,
                top_p: parameters.top_p,
                do_sample: parameters.do_sample,
            },
        };

        let response = self
            .client
            .post(&self.endpoint_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    endpoint = %self.endpoint_url,
                    "Failed to reach prediction endpoint"
                );
                if e.is_connect() {
                    ModelError::RequestError(format!(
                        "endpoint not reachable at {}",
                        self.endpoint_url
                    ))
                } else {
                    ModelError::RequestError(format!("Network error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "Prediction endpoint returned error status"
            );
            return Err(ModelError::ModelResponseError(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: PredictResponse = response.json().await.map_err(|e| {
            ModelError::SerializationError(format!("Failed to parse prediction response: {}", e))
        })?;

        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| {
                ModelError::ModelResponseError("No predictions in response".to_string())
            })?;

        if let Some(err) = prediction.error {
            return Err(ModelError::ModelResponseError(err));
        }

        let content = prediction.generated_text.ok_or_else(|| {
            ModelError::ModelResponseError("Prediction has no generated_text".to_string())
        })?;

        Ok(ModelResponse { content, model_id: Some(self.model_id.clone()), usage: None })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
