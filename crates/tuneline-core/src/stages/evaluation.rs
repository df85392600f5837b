//! Evaluation: score predictions against references and aggregate.

use super::{Stage, StageContext, StageOutcome, StageSummary};
use crate::error::PipelineResult;
use crate::evaluation::tables::{
    read_predictions, write_aggregated_metrics, write_evaluation_results, AGGREGATED_METRICS_FILE,
    EVALUATION_RESULTS_FILE,
};
use crate::evaluation::Evaluator;
use crate::pipeline::spec::EVALUATION;
use async_trait::async_trait;
use tracing::info;

#[derive(Default)]
pub struct EvaluationStage {
    evaluator: Evaluator,
}

impl EvaluationStage {
    #[must_use]
    pub const fn new(evaluator: Evaluator) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Stage for EvaluationStage {
    fn name(&self) -> &'static str {
        EVALUATION
    }

    async fn run(&self, ctx: &StageContext<'_>) -> PipelineResult<StageOutcome> {
        let predictions = read_predictions(ctx.input("predictions")?)?;
        let report = self.evaluator.evaluate(&predictions);

        let results_path = ctx.stage_dir.join(EVALUATION_RESULTS_FILE);
        let metrics_path = ctx.stage_dir.join(AGGREGATED_METRICS_FILE);
        write_evaluation_results(&results_path, &report.metric_names, &report.records)?;
        write_aggregated_metrics(&metrics_path, &report.aggregated)?;

        info!(
            records = report.records.len(),
            average_score = report.average_score,
            metric_failures = report.metric_failures,
            "evaluation complete"
        );

        let summary = StageSummary {
            clean: report.records.len() - report.degraded,
            degraded: report.degraded,
        };
        let mut outcome = StageOutcome::new(EVALUATION, summary)
            .output("evaluation_results", results_path)
            .output("aggregated_metrics", metrics_path)
            .stat("metric_failures", report.metric_failures);
        for (key, value) in &report.aggregated {
            outcome = outcome.stat(key, *value);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::evaluation::tables::{read_aggregated_metrics, write_predictions};
    use crate::evaluation::AVERAGE_SCORE_KEY;
    use crate::inference::PredictionRecord;
    use crate::storage::LocalObjectStore;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn record(reference: &str, response: &str) -> PredictionRecord {
        PredictionRecord {
            user_input: "q".to_string(),
            reference: reference.to_string(),
            extracted_response: response.to_string(),
        }
    }

    async fn evaluate(temp: &TempDir, records: &[PredictionRecord]) -> StageOutcome {
        let predictions = temp.path().join("predictions.csv");
        write_predictions(&predictions, records).unwrap();
        let config = PipelineConfig::default();
        let store = LocalObjectStore::default();
        let mut inputs = BTreeMap::new();
        inputs.insert("predictions".to_string(), predictions);
        let stage_dir = temp.path().join("evaluation");
        let ctx = StageContext::new(&config, &store, "run-1", stage_dir, inputs);
        EvaluationStage::default().run(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_identical_response_scores_one() {
        let temp = TempDir::new().unwrap();
        let answer = "Kale contains: Protein: 4.3g";
        let outcome = evaluate(&temp, &[record(answer, answer)]).await;

        assert_eq!(outcome.stats["ExactMatch"], 1.0);
        assert_eq!(outcome.stats["metric_failures"], 0);
        let metrics = read_aggregated_metrics(&outcome.outputs["aggregated_metrics"]).unwrap();
        assert!((metrics["RougeScore"] - 1.0).abs() < 1e-9);
        assert!((metrics[AVERAGE_SCORE_KEY] - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_reference_counts_as_failure() {
        let temp = TempDir::new().unwrap();
        let outcome = evaluate(&temp, &[record("yes", "yes"), record("", "anything")]).await;

        assert_eq!(outcome.summary, StageSummary { clean: 1, degraded: 1 });
        assert_eq!(outcome.stats["ExactMatch"], 0.5);
        let text = std::fs::read_to_string(&outcome.outputs["evaluation_results"]).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "user_input,reference,response,ExactMatch,RougeScore,BleuScore");
    }
}
