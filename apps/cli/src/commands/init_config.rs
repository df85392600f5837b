//! `init-config`: write the default configuration file.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use tuneline_core::PipelineConfig;

pub async fn execute(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    PipelineConfig::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} Wrote {}", "✓".green(), path.display().to_string().bold());
    Ok(())
}
