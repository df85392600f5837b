//! Worked scenarios for the individual stages.

mod common;

use async_trait::async_trait;
use common::{fast_config, write_nutrition_csv, write_translation_csv};
use std::sync::Arc;
use tempfile::TempDir;
use tuneline_abstraction::{
    GenerationParameters, GenerationRequest, ModelError, ModelResponse, TextGenerator,
};
use tuneline_core::evaluation::Evaluator;
use tuneline_core::pipeline::DATA_TRANSFORMATION;
use tuneline_core::{ExtractionOutcome, InferenceRunner, PipelineRunner, PredictionRecord};
use tuneline_training::{read_jsonl_dataset, ConversationExample, DatasetFormat};

/// Returns the same text for every request.
struct Parrot(&'static str);

#[async_trait]
impl TextGenerator for Parrot {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        _parameters: &GenerationParameters,
    ) -> Result<ModelResponse, ModelError> {
        Ok(ModelResponse { content: self.0.to_string(), model_id: None, usage: None })
    }

    fn model_id(&self) -> &str {
        "parrot"
    }
}

#[tokio::test]
async fn test_ten_rows_split_into_eight_and_two() {
    let temp = TempDir::new().unwrap();
    let source = write_translation_csv(temp.path(), 10);
    let config = fast_config(temp.path(), &source, DatasetFormat::Translation);
    let runner = PipelineRunner::new(config).unwrap();

    let outcome = runner.run_stage("run-1", DATA_TRANSFORMATION, Default::default()).await.unwrap();
    let train = read_jsonl_dataset(&outcome.outputs["train_dataset"]).unwrap();
    let test = read_jsonl_dataset(&outcome.outputs["test_dataset"]).unwrap();
    assert_eq!((train.len(), test.len()), (8, 2));

    let mut users: Vec<&str> = train.iter().chain(&test).map(ConversationExample::user).collect();
    users.sort_unstable();
    users.dedup();
    assert_eq!(users.len(), 10);
}

#[test]
fn test_identical_prediction_scores_exact_match_one() {
    let records = vec![PredictionRecord {
        user_input: "Translate: I am happy.".to_string(),
        reference: "Happy, I am.".to_string(),
        extracted_response: "Happy, I am.".to_string(),
    }];
    let report = Evaluator::default().evaluate(&records);
    assert_eq!(report.aggregated["ExactMatch"], 1.0);
    assert!((report.aggregated["BleuScore"] - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unmarked_output_is_kept_verbatim() {
    let runner =
        InferenceRunner::new(Arc::new(Parrot("Happy, I am.")), GenerationParameters::default());
    let examples = vec![ConversationExample::new("I am happy.", "Happy, I am.")];

    let report = runner.run(&examples, -1).await;
    assert_eq!(report.num_predictions, 1);
    assert_eq!(report.predictions[0].extracted_response, "Happy, I am.");
    assert_eq!(report.outcomes, vec![ExtractionOutcome::Unmarked]);
    assert_eq!(report.degraded, 1);
}

#[tokio::test]
async fn test_nutrition_answer_omits_zero_fields() {
    let temp = TempDir::new().unwrap();
    let source = write_nutrition_csv(temp.path());
    let mut config = fast_config(temp.path(), &source, DatasetFormat::Nutrition);
    config.data.test_fraction = 0.5;
    let runner = PipelineRunner::new(config).unwrap();

    let outcome = runner.run_stage("run-1", DATA_TRANSFORMATION, Default::default()).await.unwrap();
    assert_eq!(outcome.stats["total_samples"], 5);

    let mut all = read_jsonl_dataset(&outcome.outputs["train_dataset"]).unwrap();
    all.extend(read_jsonl_dataset(&outcome.outputs["test_dataset"]).unwrap());

    let lentils = all.iter().find(|e| e.assistant().starts_with("lentils")).unwrap();
    assert_eq!(
        lentils.assistant(),
        "lentils contains: Calories: 100 kcal, Protein: 5g, Carbohydrates: 20g"
    );
    assert!(lentils.user().contains("lentils"));

    let water = all.iter().find(|e| e.assistant().contains("water")).unwrap();
    assert_eq!(water.assistant(), "No nutritional information is available for water.");
}
