//! `train`: fine-tune an adapter on an existing training split.

use crate::OverrideArgs;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tuneline_core::pipeline::FINE_TUNING;

pub async fn execute(
    config_path: Option<&Path>,
    overrides: &OverrideArgs,
    train: PathBuf,
    run_id: Option<String>,
    json_output: bool,
) -> Result<()> {
    let config = crate::config::load_config(config_path, overrides)?;
    let mut inputs = BTreeMap::new();
    inputs.insert("train_dataset".to_string(), super::existing_file(&train, "training data")?);
    super::run_single_stage(config, FINE_TUNING, inputs, run_id, json_output).await
}
