//! CLI configuration loading and merging.

use crate::OverrideArgs;
use anyhow::{Context, Result};
use std::path::Path;
use tuneline_core::PipelineConfig;

/// Picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tuneline.toml";

/// Load the pipeline configuration.
///
/// Precedence:
/// 1. CLI flags
/// 2. `--config <file>` (must exist)
/// 3. `./tuneline.toml` if present
/// 4. Defaults
pub fn load_config(path: Option<&Path>, overrides: &OverrideArgs) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            PipelineConfig::load_from_file(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Failed to load {DEFAULT_CONFIG_FILE}"))?
        }
        None => PipelineConfig::default(),
    };
    config.merge_overrides(&overrides.to_overrides());
    Ok(config)
}
