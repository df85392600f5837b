//! Inference: generate a response for each held-out question.

use super::{Stage, StageContext, StageOutcome, StageSummary};
use crate::config::InferenceBackend;
use crate::error::PipelineResult;
use crate::evaluation::tables::{write_predictions, PREDICTIONS_FILE};
use crate::inference::InferenceRunner;
use crate::pipeline::spec::INFERENCE;
use async_trait::async_trait;
use tracing::info;
use tuneline_models::{GeneratorConfig, GeneratorFactory};
use tuneline_training::{read_jsonl_dataset, trained_model_id_for_run};

#[derive(Debug, Default)]
pub struct InferenceStage;

impl InferenceStage {
    fn generator_config(ctx: &StageContext<'_>) -> PipelineResult<GeneratorConfig> {
        let inference = &ctx.config.inference;
        let mut config =
            GeneratorConfig::new(inference.backend.into(), trained_model_id_for_run(ctx.run_id));
        match inference.backend {
            InferenceBackend::Local => {
                config = config.with_adapter_dir(ctx.input("fine_tuned_model")?.to_path_buf());
            }
            InferenceBackend::Endpoint => {
                if let Some(url) = &inference.endpoint_url {
                    config = config.with_endpoint_url(url.clone());
                }
            }
            InferenceBackend::Mock => {}
        }
        Ok(config)
    }
}

#[async_trait]
impl Stage for InferenceStage {
    fn name(&self) -> &'static str {
        INFERENCE
    }

    async fn run(&self, ctx: &StageContext<'_>) -> PipelineResult<StageOutcome> {
        let test = read_jsonl_dataset(ctx.input("test_dataset")?)?;
        let generator = GeneratorFactory::create(Self::generator_config(ctx)?)?;
        info!(
            backend = ?ctx.config.inference.backend,
            model_id = generator.model_id(),
            available = test.len(),
            max_samples = ctx.config.generation.max_samples,
            "running inference"
        );

        let runner = InferenceRunner::new(generator, ctx.config.generation.parameters());
        let report = runner.run(&test, ctx.config.generation.max_samples).await;

        let predictions_path = ctx.stage_dir.join(PREDICTIONS_FILE);
        write_predictions(&predictions_path, &report.predictions)?;
        info!(
            predictions = report.num_predictions,
            degraded = report.degraded,
            outcomes = ?report.outcome_counts(),
            path = %predictions_path.display(),
            "wrote predictions"
        );

        let summary = StageSummary {
            clean: report.num_predictions - report.degraded,
            degraded: report.degraded,
        };
        Ok(StageOutcome::new(INFERENCE, summary)
            .output("predictions", predictions_path)
            .stat("total_predictions", report.num_predictions)
            .stat("samples_processed", report.num_predictions)
            .stat("avg_response_length", report.avg_response_length))
    }
}
