use crate::error::TrainingResult;
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory the fine-tuning stage writes its artifact into.
pub const FINE_TUNING_STAGE_DIR: &str = "fine-tuning";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// Filesystem layout for pipeline runs.
///
/// Each run lives at `<root>/<run_id>/` with one directory per stage.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

/// `YYYYmmdd-HHMMSS-<8 hex>`, sortable by start time.
#[must_use]
pub fn new_run_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..8])
}

impl RunLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    #[must_use]
    pub fn stage_dir(&self, run_id: &str, stage: &str) -> PathBuf {
        self.run_dir(run_id).join(stage)
    }

    #[must_use]
    pub fn adapter_dir(&self, run_id: &str) -> PathBuf {
        self.stage_dir(run_id, FINE_TUNING_STAGE_DIR)
    }

    #[must_use]
    pub fn summary_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join(RUN_SUMMARY_FILE)
    }

    pub fn ensure_stage_dir(&self, run_id: &str, stage: &str) -> TrainingResult<PathBuf> {
        let dir = self.stage_dir(run_id, stage);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
