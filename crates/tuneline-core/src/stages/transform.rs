//! Data transformation: raw CSV to train/test conversation JSONL.

use super::{Stage, StageContext, StageOutcome, StageSummary};
use crate::error::PipelineResult;
use crate::pipeline::spec::DATA_TRANSFORMATION;
use crate::storage::ObjectUri;
use async_trait::async_trait;
use tracing::{info, warn};
use tuneline_training::artifacts::write_json;
use tuneline_training::{
    format_table, load_csv_bytes, split_dataset, write_jsonl_dataset, TrainingError,
};

pub const TRAIN_FILE: &str = "train.jsonl";
pub const TEST_FILE: &str = "test.jsonl";
pub const DEGRADATIONS_FILE: &str = "formatting_degradations.json";

#[derive(Debug, Default)]
pub struct DataTransformationStage;

#[async_trait]
impl Stage for DataTransformationStage {
    fn name(&self) -> &'static str {
        DATA_TRANSFORMATION
    }

    async fn run(&self, ctx: &StageContext<'_>) -> PipelineResult<StageOutcome> {
        let data = &ctx.config.data;
        let source = ObjectUri::parse(&data.source_uri)?;
        info!(source = %source, format = %data.format, "loading dataset");

        let bytes = ctx
            .store
            .read(&source)
            .map_err(|e| TrainingError::DataLoad(format!("failed to read {source}: {e}")))?;
        let table = load_csv_bytes(&bytes)?;
        let report = format_table(&table, &ctx.config.formatter_options())?;
        for degradation in &report.degradations {
            warn!(%degradation, "formatting degradation");
        }

        let split = split_dataset(&report.examples, data.test_fraction, data.seed)?;

        let train_path = ctx.stage_dir.join(TRAIN_FILE);
        let test_path = ctx.stage_dir.join(TEST_FILE);
        write_jsonl_dataset(&train_path, &split.train)?;
        write_jsonl_dataset(&test_path, &split.test)?;
        if !report.degradations.is_empty() {
            write_json(&ctx.stage_dir.join(DEGRADATIONS_FILE), &report.degradations)?;
        }

        info!(
            rows = table.len(),
            total = report.examples.len(),
            train = split.train.len(),
            test = split.test.len(),
            "wrote train/test datasets"
        );

        Ok(StageOutcome::new(
            DATA_TRANSFORMATION,
            StageSummary { clean: report.clean, degraded: report.degraded },
        )
        .output("train_dataset", train_path)
        .output("test_dataset", test_path)
        .stat("total_samples", report.examples.len())
        .stat("train_samples", split.train.len())
        .stat("test_samples", split.test.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::storage::LocalObjectStore;
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use tuneline_training::{read_jsonl_dataset, DatasetFormat};

    fn yoda_csv(rows: usize) -> String {
        let mut csv = String::from("sentence,translation\n");
        for i in 0..rows {
            csv.push_str(&format!("Sentence number {i}.,\"Number {i}, the sentence is.\"\n"));
        }
        csv
    }

    async fn run_transform(
        temp: &TempDir,
        config: &PipelineConfig,
    ) -> PipelineResult<StageOutcome> {
        let store = LocalObjectStore::default();
        let stage_dir = temp.path().join("out");
        std::fs::create_dir_all(&stage_dir).unwrap();
        let ctx = StageContext::new(config, &store, "run-1", stage_dir, BTreeMap::new());
        DataTransformationStage.run(&ctx).await
    }

    #[tokio::test]
    async fn test_ten_rows_split_eight_two() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("yoda.csv");
        std::fs::write(&source, yoda_csv(10)).unwrap();

        let mut config = PipelineConfig::default();
        config.data.source_uri = source.display().to_string();
        config.data.format = DatasetFormat::Translation;
        config.data.use_extra_translation = false;

        let outcome = run_transform(&temp, &config).await.unwrap();
        assert_eq!(outcome.stats["total_samples"], 10);
        assert_eq!(outcome.stats["train_samples"], 8);
        assert_eq!(outcome.stats["test_samples"], 2);
        assert_eq!(outcome.summary, StageSummary { clean: 10, degraded: 0 });

        let train = read_jsonl_dataset(&outcome.outputs["train_dataset"]).unwrap();
        assert_eq!(train.len(), 8);
        assert!(!temp.path().join("out").join(DEGRADATIONS_FILE).exists());
    }

    #[tokio::test]
    async fn test_missing_extra_column_is_degraded_not_fatal() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("yoda.csv");
        std::fs::write(&source, yoda_csv(5)).unwrap();

        let mut config = PipelineConfig::default();
        config.data.source_uri = source.display().to_string();
        config.data.format = DatasetFormat::Translation;
        config.data.use_extra_translation = true;

        let outcome = run_transform(&temp, &config).await.unwrap();
        assert_eq!(outcome.stats["total_samples"], 5);
        assert!(temp.path().join("out").join(DEGRADATIONS_FILE).exists());
        assert_eq!(outcome.summary, StageSummary { clean: 0, degraded: 5 });
    }

    #[tokio::test]
    async fn test_unreadable_source_is_data_load_error() {
        let temp = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.data.source_uri = temp.path().join("absent.csv").display().to_string();

        let err = run_transform(&temp, &config).await.unwrap_err();
        assert!(
            matches!(err, crate::error::PipelineError::Training(TrainingError::DataLoad(_))),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_missing_mandatory_column_fails() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("foods.csv");
        std::fs::write(&source, "name,Protein\nkale,4.3\n").unwrap();

        let mut config = PipelineConfig::default();
        config.data.source_uri = source.display().to_string();

        let err = run_transform(&temp, &config).await.unwrap_err();
        assert!(err.to_string().contains("food"), "{err}");
    }
}
