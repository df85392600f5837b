//! `list`: show fine-tuned adapters under the runs root.

use crate::OverrideArgs;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tuneline_training::discover_trained_adapters;

pub async fn execute(
    config_path: Option<&Path>,
    runs_root: Option<PathBuf>,
    json_output: bool,
) -> Result<()> {
    let overrides = OverrideArgs { runs_root, ..OverrideArgs::default() };
    let config = crate::config::load_config(config_path, &overrides)?;
    let adapters = discover_trained_adapters(&config.storage.runs_root)
        .context("Failed to discover trained adapters")?;

    if json_output {
        let out: Vec<_> = adapters
            .iter()
            .map(|a| {
                json!({
                    "id": a.trained_model_id,
                    "run_id": a.run_id,
                    "adapter_dir": a.adapter_dir,
                    "job_id": a.manifest.job_id,
                    "created_at": a.manifest.created_at,
                    "base_model": a.manifest.base_model.model_id,
                    "train_loss": a.manifest.metrics.final_train_loss,
                    "eval_loss": a.manifest.metrics.final_eval_loss,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Trained Adapters ({})", adapters.len()).bold().cyan());
    println!();

    if adapters.is_empty() {
        println!("  {}", "No trained adapters found.".dimmed());
        println!();
        println!(
            "  {}",
            "Tip: `tuneline-cli run` fine-tunes one, then use it via \
             `tuneline-cli infer --model trained:<run_id>`."
                .dimmed()
        );
        return Ok(());
    }

    println!("{:<40} {:<10} {}", "ID", "Eval loss", "Adapter");
    println!("{}", "─".repeat(100));
    for a in adapters {
        println!(
            "{:<40} {:<10} {}",
            a.trained_model_id.cyan(),
            format!("{:.4}", a.manifest.metrics.final_eval_loss),
            a.adapter_dir.display().to_string().dimmed()
        );
    }
    println!();
    Ok(())
}
