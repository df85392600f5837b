//! `transform`: load, format and split the dataset.

use crate::OverrideArgs;
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tuneline_core::pipeline::DATA_TRANSFORMATION;

pub async fn execute(
    config_path: Option<&Path>,
    overrides: &OverrideArgs,
    run_id: Option<String>,
    json_output: bool,
) -> Result<()> {
    let config = crate::config::load_config(config_path, overrides)?;
    super::run_single_stage(config, DATA_TRANSFORMATION, BTreeMap::new(), run_id, json_output).await
}
