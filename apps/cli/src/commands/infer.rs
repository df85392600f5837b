//! `infer`: generate predictions with a trained adapter or an endpoint.

use crate::OverrideArgs;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tuneline_core::pipeline::INFERENCE;
use tuneline_training::resolve_trained_adapter;

pub async fn execute(
    config_path: Option<&Path>,
    overrides: &OverrideArgs,
    test: PathBuf,
    model: &str,
    run_id: Option<String>,
    json_output: bool,
) -> Result<()> {
    let config = crate::config::load_config(config_path, overrides)?;

    let adapter_dir = if model.starts_with("trained:") {
        resolve_trained_adapter(&config.storage.runs_root, model)
            .with_context(|| format!("Failed to resolve {model}"))?
    } else {
        PathBuf::from(model)
    };

    let mut inputs = BTreeMap::new();
    inputs.insert("test_dataset".to_string(), super::existing_file(&test, "test data")?);
    inputs.insert("fine_tuned_model".to_string(), adapter_dir);
    super::run_single_stage(config, INFERENCE, inputs, run_id, json_output).await
}
