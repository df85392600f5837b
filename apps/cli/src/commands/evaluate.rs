//! `evaluate`: score a predictions table.

use crate::OverrideArgs;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tuneline_core::pipeline::EVALUATION;

pub async fn execute(
    config_path: Option<&Path>,
    overrides: &OverrideArgs,
    predictions: PathBuf,
    run_id: Option<String>,
    json_output: bool,
) -> Result<()> {
    let config = crate::config::load_config(config_path, overrides)?;
    let mut inputs = BTreeMap::new();
    inputs.insert("predictions".to_string(), super::existing_file(&predictions, "predictions")?);
    super::run_single_stage(config, EVALUATION, inputs, run_id, json_output).await
}
