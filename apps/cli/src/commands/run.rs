//! `run`: execute the whole pipeline.

use crate::output::{print_stage_record, status_label};
use crate::OverrideArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tuneline_core::PipelineRunner;
use tuneline_training::StdoutProgressSink;

pub async fn execute(
    config_path: Option<&Path>,
    overrides: &OverrideArgs,
    run_id: Option<String>,
    json_output: bool,
) -> Result<()> {
    let config = crate::config::load_config(config_path, overrides)?;
    let mut runner = PipelineRunner::new(config).context("Invalid pipeline configuration")?;
    if !json_output {
        runner = runner.with_progress(Arc::new(StdoutProgressSink));
    }

    let summary = match run_id {
        Some(id) => runner.run_with_id(&id).await,
        None => runner.run().await,
    }
    .context("Pipeline run failed")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Pipeline {}", summary.pipeline).bold().cyan());
    println!("  Run: {}  Status: {}", summary.run_id.cyan(), status_label(summary.status));
    println!();
    for record in &summary.stages {
        print_stage_record(record);
    }
    println!();
    println!(
        "  Summary: {}",
        runner.layout().summary_path(&summary.run_id).display().to_string().dimmed()
    );
    println!();
    Ok(())
}
