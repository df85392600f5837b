//! Sequential local execution of the stage graph.
//!
//! Stages run one at a time in topological order. Each stage writes into
//! `<runs_root>/<run_id>/<stage>/`; its outputs are handed to downstream inputs
//! through the graph's bindings. The first fatal error stops the run, the
//! failing stage's directory is removed and `run_summary.json` records what
//! happened.

use super::graph::PipelineGraph;
use super::spec::PipelineSpec;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::stages::{
    DataTransformationStage, EvaluationStage, FineTuningStage, InferenceStage, Stage, StageContext,
    StageOutcome, StageSummary,
};
use crate::storage::{LocalObjectStore, ObjectStore, ObjectUri};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tuneline_training::artifacts::write_json;
use tuneline_training::{new_run_id, ProgressSink, RunLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Failed,
    /// Not started because an upstream stage failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<StageSummary>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    fn completed(outcome: &StageOutcome) -> Self {
        Self {
            name: outcome.stage.clone(),
            status: StageStatus::Completed,
            summary: Some(outcome.summary),
            stats: outcome.stats.clone(),
            outputs: outcome.outputs.clone(),
            error: None,
        }
    }

    fn without_outcome(name: &str, status: StageStatus, error: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            summary: None,
            stats: BTreeMap::new(),
            outputs: BTreeMap::new(),
            error,
        }
    }
}

/// Written to `<runs_root>/<run_id>/run_summary.json` when a run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub stages: Vec<StageRecord>,
}

impl RunSummary {
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.name == name)
    }
}

pub struct PipelineRunner {
    config: PipelineConfig,
    graph: PipelineGraph,
    store: Arc<dyn ObjectStore>,
    layout: RunLayout,
    stages: BTreeMap<&'static str, Box<dyn Stage>>,
}

impl PipelineRunner {
    /// Validate `config` and assemble the standard stage graph for it.
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let graph = PipelineGraph::build(PipelineSpec::from_config(&config))?;
        let store = Arc::new(LocalObjectStore::new(config.storage.mirror_root.clone()));
        let layout = RunLayout::new(config.storage.runs_root.clone());

        let mut runner = Self { config, graph, store, layout, stages: BTreeMap::new() };
        runner.register(Box::new(DataTransformationStage));
        runner.register(Box::new(FineTuningStage::default()));
        runner.register(Box::new(InferenceStage));
        runner.register(Box::new(EvaluationStage::default()));
        Ok(runner)
    }

    /// Route fine-tuning progress events to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.register(Box::new(FineTuningStage::new(progress)));
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the implementation of the stage with the same name.
    pub fn register(&mut self, stage: Box<dyn Stage>) {
        self.stages.insert(stage.name(), stage);
    }

    #[must_use]
    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    #[must_use]
    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Run every stage under a fresh run id.
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        self.run_with_id(&new_run_id()).await
    }

    pub async fn run_with_id(&self, run_id: &str) -> PipelineResult<RunSummary> {
        let started_at = Utc::now();
        let order = self.graph.order().to_vec();
        info!(run_id, pipeline = %self.graph.spec().name, stages = ?order, "starting pipeline run");

        let mut outcomes: BTreeMap<String, StageOutcome> = BTreeMap::new();
        let mut records = Vec::with_capacity(order.len());
        let mut failure = None;

        for name in &order {
            if failure.is_some() {
                records.push(StageRecord::without_outcome(name, StageStatus::Skipped, None));
                continue;
            }

            let result = match self.resolve_inputs(name, &outcomes) {
                Ok(inputs) => self.run_stage(run_id, name, inputs).await,
                Err(e) => Err(PipelineError::in_stage(name, e)),
            };
            match result {
                Ok(outcome) => {
                    records.push(StageRecord::completed(&outcome));
                    outcomes.insert(name.clone(), outcome);
                }
                Err(e) => {
                    error!(run_id, stage = %name, error = %e, "stage failed, stopping run");
                    records.push(StageRecord::without_outcome(
                        name,
                        StageStatus::Failed,
                        Some(e.to_string()),
                    ));
                    failure = Some(e);
                }
            }
        }

        let summary = RunSummary {
            run_id: run_id.to_string(),
            pipeline: self.graph.spec().name.clone(),
            started_at,
            finished_at: Utc::now(),
            status: if failure.is_some() { RunStatus::Failed } else { RunStatus::Completed },
            stages: records,
        };
        let summary_path = self.layout.summary_path(run_id);
        write_json(&summary_path, &summary)?;

        if let Some(e) = failure {
            return Err(e);
        }
        info!(
            run_id,
            duration_ms = (summary.finished_at - summary.started_at).num_milliseconds(),
            summary = %summary_path.display(),
            "pipeline run completed"
        );
        Ok(summary)
    }

    /// Run a single stage with explicitly bound inputs.
    ///
    /// On failure the stage directory is removed and the error names the stage.
    pub async fn run_stage(
        &self,
        run_id: &str,
        name: &str,
        inputs: BTreeMap<String, PathBuf>,
    ) -> PipelineResult<StageOutcome> {
        let stage = self
            .stages
            .get(name)
            .ok_or_else(|| PipelineError::Graph(format!("no implementation for stage '{name}'")))?;
        let stage_dir = self
            .layout
            .ensure_stage_dir(run_id, name)
            .map_err(|e| PipelineError::in_stage(name, e))?;

        info!(run_id, stage = name, dir = %stage_dir.display(), "running stage");
        let ctx =
            StageContext::new(&self.config, self.store.as_ref(), run_id, stage_dir.clone(), inputs);
        let outcome = match stage.run(&ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                discard_stage_dir(&stage_dir);
                return Err(PipelineError::in_stage(name, e));
            }
        };

        self.mirror(run_id, name, &stage_dir).map_err(|e| PipelineError::in_stage(name, e))?;
        info!(
            run_id,
            stage = name,
            clean = outcome.summary.clean,
            degraded = outcome.summary.degraded,
            stats = ?outcome.stats,
            "stage completed"
        );
        Ok(outcome)
    }

    fn resolve_inputs(
        &self,
        stage: &str,
        outcomes: &BTreeMap<String, StageOutcome>,
    ) -> PipelineResult<BTreeMap<String, PathBuf>> {
        let mut inputs = BTreeMap::new();
        for binding in self.graph.spec().bindings.iter().filter(|b| b.to_stage == stage) {
            let path = outcomes
                .get(&binding.from_stage)
                .and_then(|o| o.outputs.get(&binding.from_output))
                .ok_or_else(|| {
                    PipelineError::Graph(format!(
                        "{}.{} did not produce {}.{}",
                        binding.from_stage, binding.from_output, binding.to_stage, binding.to_input
                    ))
                })?;
            inputs.insert(binding.to_input.clone(), path.clone());
        }
        Ok(inputs)
    }

    fn mirror(&self, run_id: &str, stage: &str, stage_dir: &std::path::Path) -> PipelineResult<()> {
        let Some(destination) = &self.config.data.destination_uri else {
            return Ok(());
        };
        let dest = ObjectUri::parse(destination)?.join(&format!("{run_id}/{stage}"));
        let copied = self.store.upload(stage_dir, &dest)?;
        info!(stage, dest = %dest, files = copied, "mirrored stage outputs");
        Ok(())
    }
}

fn discard_stage_dir(dir: &std::path::Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!(dir = %dir.display(), "removed failed stage output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "could not remove failed stage output"),
    }
}
