//! Command implementations for the Tuneline CLI.

pub mod compile;
pub mod evaluate;
pub mod infer;
pub mod init_config;
pub mod list;
pub mod run;
pub mod train;
pub mod transform;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tuneline_core::{PipelineConfig, PipelineRunner};
use tuneline_training::{new_run_id, StdoutProgressSink};

/// Run one stage with explicit inputs and print its outcome.
pub(crate) async fn run_single_stage(
    config: PipelineConfig,
    stage: &str,
    inputs: BTreeMap<String, PathBuf>,
    run_id: Option<String>,
    json_output: bool,
) -> Result<()> {
    let mut runner = PipelineRunner::new(config).context("Invalid pipeline configuration")?;
    if !json_output {
        runner = runner.with_progress(Arc::new(StdoutProgressSink));
    }
    let run_id = run_id.unwrap_or_else(new_run_id);

    let outcome = runner.run_stage(&run_id, stage, inputs).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        crate::output::print_outcome(&run_id, &outcome);
    }
    Ok(())
}

pub(crate) fn existing_file(path: &Path, what: &str) -> Result<PathBuf> {
    if !path.is_file() {
        anyhow::bail!("{what} not found: {}", path.display());
    }
    Ok(path.to_path_buf())
}
