//! `compile`: validate the stage graph and emit the orchestrator document.

use crate::OverrideArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tuneline_core::pipeline::{CompiledPipeline, PipelineGraph, PipelineSpec};

pub async fn execute(
    config_path: Option<&Path>,
    output: Option<PathBuf>,
    ascii: bool,
) -> Result<()> {
    let config = crate::config::load_config(config_path, &OverrideArgs::default())?;
    let graph = PipelineGraph::build(PipelineSpec::from_config(&config))
        .context("Pipeline graph is invalid")?;

    if ascii {
        print!("{}", graph.render_ascii());
        return Ok(());
    }

    let compiled = CompiledPipeline::from_graph(&graph);
    match output {
        Some(path) => {
            compiled
                .write_to(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} {} ({} stages) -> {}",
                "✓".green(),
                compiled.name.bold(),
                compiled.stages.len(),
                path.display()
            );
        }
        None => println!("{}", compiled.to_json()?),
    }
    Ok(())
}
