//! Generator implementations for Tuneline.
//!
//! This crate provides concrete implementations of the `TextGenerator` trait.
//!
//! # Supported Generators
//!
//! - **Mock**: Testing and development
//! - **Bigram**: Locally trained low-rank bigram adapter (no external services)
//! - **Endpoint**: Deployed fine-tuned model behind an HTTP prediction endpoint

pub mod bigram;
pub mod endpoint;
pub mod factory;

use async_trait::async_trait;
use tracing::debug;
use tuneline_abstraction::{
    GenerationParameters, GenerationRequest, ModelError, ModelResponse, ModelUsage, TextGenerator,
};

pub use bigram::{AdapterWeights, BigramModel, TokenizerConfig};
pub use endpoint::EndpointModel;
pub use factory::{GeneratorConfig, GeneratorFactory, GeneratorKind};

/// A mock implementation of the `TextGenerator` trait for testing and demonstration.
///
/// Echoes the rendered prompt followed by a canned answer and the end marker, the
/// same shape a local model decode produces.
#[derive(Debug, Clone)]
pub struct MockGenerator {
    id: String,
}

impl MockGenerator {
    /// Creates a new `MockGenerator` with the given ID.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self { id }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        parameters: &GenerationParameters,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            user_input = %request.user_input,
            parameters = ?parameters,
            "MockGenerator generating text"
        );

        let answer = format!("Mock response for: {}", request.user_input);
        let content = format!("{}{}{}", request.prompt, answer, bigram::END_MARKER);

        Ok(ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens: request.prompt.split_whitespace().count() as u32,
                generated_tokens: answer.split_whitespace().count() as u32,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_generator_appends_answer() {
        let model = MockGenerator::new("mock".to_string());
        let request = GenerationRequest {
            user_input: "hi".to_string(),
            prompt: "<|user|>\nhi<|end|>\n<|assistant|>\n".to_string(),
        };
        let response = model.generate(&request, &GenerationParameters::default()).await.unwrap();
        assert_eq!(
            response.content,
            "<|user|>\nhi<|end|>\n<|assistant|>\nMock response for: hi<|end|>"
        );
        assert_eq!(response.model_id, Some("mock".to_string()));
    }
}
