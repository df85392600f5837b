//! Fine-tuning: train the adapter on the training split.

use super::{Stage, StageContext, StageOutcome, StageSummary};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::spec::FINE_TUNING;
use crate::training::BigramAdapterBackend;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use tuneline_training::artifacts::write_json;
use tuneline_training::{
    read_jsonl_dataset, FineTuner, ProgressSink, TracingProgressSink, TrainingError,
};

pub const TRAINING_METRICS_FILE: &str = "training_metrics.json";

/// Engines this stage can train. The adapter format is shared with `BigramModel`.
const SUPPORTED_ENGINES: [&str; 1] = ["bigram"];

pub struct FineTuningStage {
    progress: Arc<dyn ProgressSink>,
}

impl Default for FineTuningStage {
    fn default() -> Self {
        Self::new(Arc::new(TracingProgressSink))
    }
}

impl FineTuningStage {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressSink>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl Stage for FineTuningStage {
    fn name(&self) -> &'static str {
        FINE_TUNING
    }

    async fn run(&self, ctx: &StageContext<'_>) -> PipelineResult<StageOutcome> {
        let train = read_jsonl_dataset(ctx.input("train_dataset")?)?;
        let job = ctx.config.job_spec();
        if !SUPPORTED_ENGINES.contains(&job.base_model.engine.as_str()) {
            return Err(PipelineError::Training(TrainingError::InvalidSpec(format!(
                "unsupported training engine: {}",
                job.base_model.engine
            ))));
        }
        let architecture = ctx.config.architecture();
        info!(
            job_id = %job.job_id,
            base_model = %job.base_model.model_id,
            architecture = %architecture.name,
            examples = train.len(),
            "fine-tuning adapter"
        );

        let mut backend = BigramAdapterBackend::new(&train, &job.lora, &job.training);
        let outcome = FineTuner::new(&job, &architecture).run(
            &mut backend,
            &train,
            &ctx.stage_dir,
            self.progress.as_ref(),
        )?;

        let metrics_path = ctx.stage_dir.join(TRAINING_METRICS_FILE);
        write_json(&metrics_path, &outcome.metrics)?;

        let m = &outcome.metrics;
        Ok(StageOutcome::new(FINE_TUNING, StageSummary { clean: train.len(), degraded: 0 })
            .output("fine_tuned_model", ctx.stage_dir.clone())
            .output("training_metrics", metrics_path)
            .stat("train_loss", m.final_train_loss)
            .stat("eval_loss", m.final_eval_loss)
            .stat("trainable_params_pct", m.trainable_pct)
            .stat("trainable_params", m.trainable_params)
            .stat("global_steps", m.global_steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::storage::LocalObjectStore;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tuneline_training::artifacts::{read_manifest, MANIFEST_FILE};
    use tuneline_training::{write_jsonl_dataset, ConversationExample};

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.lora.r = 2;
        config.training.num_train_epochs = 2;
        config.training.warmup_steps = 1;
        config.training.logging_steps = 1;
        config.training.eval_steps = 2;
        config.training.save_steps = 100;
        config.training.validation_fraction = 0.25;
        config.training.learning_rate = 0.05;
        config
    }

    fn write_train(dir: &std::path::Path, n: usize) -> PathBuf {
        let examples: Vec<ConversationExample> = (0..n)
            .map(|i| ConversationExample::new(format!("Say {i}"), format!("{i} say I do")))
            .collect();
        let path = dir.join("train.jsonl");
        write_jsonl_dataset(&path, &examples).unwrap();
        path
    }

    #[tokio::test]
    async fn test_fine_tuning_writes_adapter() {
        let temp = TempDir::new().unwrap();
        let config = small_config();
        let store = LocalObjectStore::default();
        let mut inputs = BTreeMap::new();
        inputs.insert("train_dataset".to_string(), write_train(temp.path(), 8));
        let stage_dir = temp.path().join("fine-tuning");
        let ctx = StageContext::new(&config, &store, "run-1", stage_dir.clone(), inputs);

        let outcome = FineTuningStage::default().run(&ctx).await.unwrap();

        assert_eq!(outcome.outputs["fine_tuned_model"], stage_dir);
        assert!(outcome.stats["train_loss"].as_f64().unwrap() > 0.0);
        assert!(outcome.stats["trainable_params_pct"].as_f64().unwrap() > 0.0);
        let manifest = read_manifest(&stage_dir.join(MANIFEST_FILE)).unwrap();
        assert_eq!(manifest.artifacts.len(), 4);
        assert!(stage_dir.join(TRAINING_METRICS_FILE).is_file());
    }

    #[tokio::test]
    async fn test_single_example_is_fatal() {
        let temp = TempDir::new().unwrap();
        let config = small_config();
        let store = LocalObjectStore::default();
        let mut inputs = BTreeMap::new();
        inputs.insert("train_dataset".to_string(), write_train(temp.path(), 1));
        let ctx = StageContext::new(&config, &store, "run-1", temp.path().join("ft"), inputs);

        let err = FineTuningStage::default().run(&ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }
}
