//! Tuneline Core - pipeline assembly and stage execution.
//!
//! This crate wires the data, training and model crates into the four-stage
//! fine-tuning pipeline:
//! - Configuration loading and validation
//! - Object locations and mirroring
//! - Chat template rendering and response extraction
//! - Evaluation metrics and aggregation
//! - Stage implementations, the stage graph and the sequential runner
//!
//! # Example
//!
//! ```rust,no_run
//! use tuneline_core::{PipelineConfig, PipelineRunner};
//!
//! #[tokio::main]
//! async fn main() -> tuneline_core::PipelineResult<()> {
//!     let config = PipelineConfig::load_from_file(std::path::Path::new("tuneline.toml"))?;
//!     let summary = PipelineRunner::new(config)?.run().await?;
//!     println!("{}", summary.run_id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod pipeline;
pub mod stages;
pub mod storage;
pub mod training;

pub use config::{ConfigOverrides, InferenceBackend, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use evaluation::{AggregatedMetrics, EvaluationReport, Evaluator, StatSummary};
pub use inference::{
    extract_response, render_prompt, ExtractionOutcome, InferenceRunner, PredictionRecord,
};
pub use pipeline::{
    CompiledPipeline, PipelineGraph, PipelineRunner, PipelineSpec, RunStatus, RunSummary,
};
pub use stages::{Stage, StageContext, StageOutcome, StageSummary};
pub use storage::{LocalObjectStore, ObjectStore, ObjectUri};
