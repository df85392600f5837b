use crate::artifacts::{read_manifest, ArtifactKind, TrainingManifest, MANIFEST_FILE};
use crate::error::{TrainingError, TrainingResult};
use crate::layout::RunLayout;
use std::path::{Path, PathBuf};

/// A fine-tuned adapter found under a runs root.
#[derive(Debug, Clone)]
pub struct TrainedAdapterEntry {
    /// Stable identifier used in CLI overrides (e.g. `trained:<run_id>`).
    pub trained_model_id: String,
    pub run_id: String,
    /// Directory holding the adapter files and manifest.
    pub adapter_dir: PathBuf,
    pub manifest: TrainingManifest,
}

impl TrainedAdapterEntry {
    /// Absolute path of the adapter weights file.
    pub fn adapter_path(&self) -> TrainingResult<PathBuf> {
        self.manifest
            .artifact(&ArtifactKind::Adapter)
            .map(|a| self.adapter_dir.join(&a.path))
            .ok_or_else(|| {
                TrainingError::Artifact(format!("run {} has no adapter artifact", self.run_id))
            })
    }
}

#[must_use]
pub fn trained_model_id_for_run(run_id: &str) -> String {
    format!("trained:{run_id}")
}

/// Scan `<runs_root>/*/fine-tuning/training_manifest.json`, newest run first.
pub fn discover_trained_adapters(runs_root: &Path) -> TrainingResult<Vec<TrainedAdapterEntry>> {
    let layout = RunLayout::new(runs_root.to_path_buf());
    let mut out = Vec::new();

    let dir = match std::fs::read_dir(layout.root()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for entry in dir {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let run_id = entry.file_name().to_string_lossy().to_string();
        let adapter_dir = layout.adapter_dir(&run_id);
        let manifest_path = adapter_dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            continue;
        }
        let manifest = read_manifest(&manifest_path)?;

        out.push(TrainedAdapterEntry {
            trained_model_id: trained_model_id_for_run(&run_id),
            run_id,
            adapter_dir,
            manifest,
        });
    }

    out.sort_by(|a, b| b.run_id.cmp(&a.run_id));
    Ok(out)
}

/// Resolve a `trained:<run_id>` reference into the run's adapter directory.
pub fn resolve_trained_adapter(
    runs_root: &Path,
    trained_model_id: &str,
) -> TrainingResult<PathBuf> {
    let run_id = trained_model_id.strip_prefix("trained:").ok_or_else(|| {
        TrainingError::InvalidSpec(format!("invalid trained model id: {trained_model_id}"))
    })?;

    let adapter_dir = RunLayout::new(runs_root.to_path_buf()).adapter_dir(run_id);
    if !adapter_dir.join(MANIFEST_FILE).exists() {
        return Err(TrainingError::InvalidSpec(format!(
            "trained model not found (missing manifest): {trained_model_id}"
        )));
    }
    Ok(adapter_dir)
}
