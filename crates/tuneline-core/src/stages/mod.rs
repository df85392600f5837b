//! Stage implementations.
//!
//! Each stage reads its bound inputs from a [`StageContext`], writes its outputs
//! into its own stage directory and reports a [`StageOutcome`]. Stages never
//! consult the environment; everything comes from the shared configuration.

pub mod evaluation;
pub mod fine_tuning;
pub mod inference;
pub mod transform;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::storage::ObjectStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use evaluation::EvaluationStage;
pub use fine_tuning::FineTuningStage;
pub use inference::InferenceStage;
pub use transform::DataTransformationStage;

/// Clean vs. degraded record counts for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageSummary {
    pub clean: usize,
    pub degraded: usize,
}

/// What a finished stage hands back to the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: String,
    pub summary: StageSummary,
    /// Output port name to the file or directory holding it.
    pub outputs: BTreeMap<String, PathBuf>,
    /// Scalar statistics reported by the stage.
    pub stats: BTreeMap<String, serde_json::Value>,
}

impl StageOutcome {
    #[must_use]
    pub fn new(stage: &str, summary: StageSummary) -> Self {
        Self { stage: stage.to_string(), summary, outputs: BTreeMap::new(), stats: BTreeMap::new() }
    }

    #[must_use]
    pub fn output(mut self, port: &str, path: PathBuf) -> Self {
        self.outputs.insert(port.to_string(), path);
        self
    }

    #[must_use]
    pub fn stat(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.stats.insert(key.to_string(), value.into());
        self
    }
}

/// Everything a stage may read.
pub struct StageContext<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a dyn ObjectStore,
    pub run_id: &'a str,
    /// Directory the stage writes into. Created by the runner.
    pub stage_dir: PathBuf,
    inputs: BTreeMap<String, PathBuf>,
}

impl<'a> StageContext<'a> {
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        store: &'a dyn ObjectStore,
        run_id: &'a str,
        stage_dir: PathBuf,
        inputs: BTreeMap<String, PathBuf>,
    ) -> Self {
        Self { config, store, run_id, stage_dir, inputs }
    }

    /// Location of the artifact bound to input `port`.
    pub fn input(&self, port: &str) -> PipelineResult<&Path> {
        self.inputs
            .get(port)
            .map(PathBuf::as_path)
            .ok_or_else(|| PipelineError::Graph(format!("input '{port}' is not bound")))
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    /// Must match the stage name declared in the pipeline spec.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StageContext<'_>) -> PipelineResult<StageOutcome>;
}
