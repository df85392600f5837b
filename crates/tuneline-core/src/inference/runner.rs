//! Prediction generation over a test set.

use super::extract::{extract_response, ExtractionOutcome};
use super::template::render_prompt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use tuneline_abstraction::{GenerationParameters, GenerationRequest, TextGenerator};
use tuneline_training::ConversationExample;

/// One row of the predictions table. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub user_input: String,
    pub reference: String,
    pub extracted_response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceReport {
    /// One record per processed example, in input order.
    pub predictions: Vec<PredictionRecord>,
    pub outcomes: Vec<ExtractionOutcome>,
    pub num_predictions: usize,
    /// Mean length of extracted responses, in characters.
    pub avg_response_length: f64,
    /// Records not extracted from a clean assistant span.
    pub degraded: usize,
}

impl InferenceReport {
    /// Count of records per outcome.
    #[must_use]
    pub fn outcome_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for outcome in &self.outcomes {
            let key = serde_json::to_value(outcome)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }
}

/// Number of examples to run: negative `max_samples` means all.
#[must_use]
pub fn sample_count(available: usize, max_samples: i64) -> usize {
    usize::try_from(max_samples).map_or(available, |cap| available.min(cap))
}

pub struct InferenceRunner {
    generator: Arc<dyn TextGenerator>,
    parameters: GenerationParameters,
}

impl InferenceRunner {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, parameters: GenerationParameters) -> Self {
        Self { generator, parameters }
    }

    /// Generate a prediction for the first `sample_count(.., max_samples)` examples.
    ///
    /// Generation errors never abort the run: the record keeps `Error: <message>`
    /// as its response.
    pub async fn run(&self, examples: &[ConversationExample], max_samples: i64) -> InferenceReport {
        let total = sample_count(examples.len(), max_samples);
        info!(
            model_id = %self.generator.model_id(),
            samples = total,
            available = examples.len(),
            "generating predictions"
        );

        let mut predictions = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);

        for (i, example) in examples.iter().take(total).enumerate() {
            let prompt = render_prompt(example.user());
            let request = GenerationRequest { user_input: example.user().to_string(), prompt };

            let (text, outcome) = match self.generator.generate(&request, &self.parameters).await {
                Ok(response) => extract_response(&response.content, &request.prompt),
                Err(e) => {
                    warn!(index = i, error = %e, "generation failed");
                    (format!("Error: {e}"), ExtractionOutcome::Failed)
                }
            };

            predictions.push(PredictionRecord {
                user_input: request.user_input,
                reference: example.assistant().to_string(),
                extracted_response: text,
            });
            outcomes.push(outcome);

            if (i + 1) % 10 == 0 {
                info!(processed = i + 1, total, "inference progress");
            }
        }

        for (i, record) in predictions.iter().take(3).enumerate() {
            info!(
                sample = i + 1,
                user = %record.user_input,
                reference = %record.reference,
                prediction = %record.extracted_response,
                "sample prediction"
            );
        }

        let num_predictions = predictions.len();
        let avg_response_length = if num_predictions == 0 {
            0.0
        } else {
            predictions.iter().map(|p| p.extracted_response.chars().count()).sum::<usize>() as f64
                / num_predictions as f64
        };
        let degraded = outcomes.iter().filter(|o| !o.is_clean()).count();

        InferenceReport { predictions, outcomes, num_predictions, avg_response_length, degraded }
    }
}
