use crate::dataset::DatasetId;
use crate::error::{TrainingError, TrainingResult};
use crate::job::{FineTuneJobId, LoraConfig, ModelSpec, QuantizationConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const ADAPTER_CONFIG_FILE: &str = "adapter_config.json";
pub const ADAPTER_MODEL_FILE: &str = "adapter_model.json";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
pub const TRAINER_STATE_FILE: &str = "trainer_state.json";
pub const MANIFEST_FILE: &str = "training_manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Adapter,
    AdapterConfig,
    Tokenizer,
    TrainerState,
}

/// A file produced by fine-tuning. `path` is relative to the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FineTuneMetrics {
    pub total_params: u64,
    pub trainable_params: u64,
    pub trainable_pct: f64,
    /// Mean of all optimizer-step losses.
    pub final_train_loss: f64,
    /// Validation loss of the weights that were saved.
    pub final_eval_loss: f64,
    pub global_steps: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_step: Option<u64>,
}

/// Written next to the adapter weights; read back by the inference stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub base_model: ModelSpec,
    pub architecture: String,
    pub lora: LoraConfig,
    pub quantization: QuantizationConfig,
    pub quantized_base_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LogEntry {
    pub step: u64,
    pub epoch: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_loss: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrainerState {
    pub global_step: u64,
    pub num_train_epochs: u32,
    pub best_step: Option<u64>,
    pub best_metric: Option<f64>,
    pub log_history: Vec<LogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingManifest {
    pub job_id: FineTuneJobId,
    pub created_at: DateTime<Utc>,
    pub base_model: ModelSpec,
    pub dataset_id: DatasetId,
    #[serde(default)]
    pub metrics: FineTuneMetrics,
    pub artifacts: Vec<TrainingArtifact>,
}

impl TrainingManifest {
    #[must_use]
    pub fn artifact(&self, kind: &ArtifactKind) -> Option<&TrainingArtifact> {
        self.artifacts.iter().find(|a| &a.kind == kind)
    }
}

pub fn sha256_file(path: &Path) -> TrainingResult<String> {
    let digest = Sha256::digest(std::fs::read(path)?);
    Ok(hex::encode(digest))
}

/// Hash `dir/file` and record it under its relative name.
pub fn make_artifact(
    kind: ArtifactKind,
    dir: &Path,
    file: &str,
) -> TrainingResult<TrainingArtifact> {
    let full = dir.join(file);
    if !full.exists() {
        return Err(TrainingError::Artifact(format!("{} was not written", full.display())));
    }

    let hash = sha256_file(&full)?;
    Ok(TrainingArtifact { kind, path: PathBuf::from(file), sha256: hash })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> TrainingResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> TrainingResult<TrainingManifest> {
    let manifest = serde_json::from_slice(&std::fs::read(path)?)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_make_artifact_hashes_relative_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("adapter_model.json"), b"{}").unwrap();

        let artifact =
            make_artifact(ArtifactKind::Adapter, temp.path(), ADAPTER_MODEL_FILE).unwrap();
        assert_eq!(artifact.path, PathBuf::from("adapter_model.json"));
        assert_eq!(artifact.sha256.len(), 64);

        assert!(make_artifact(ArtifactKind::Tokenizer, temp.path(), "missing.json").is_err());
    }

    #[test]
    fn test_log_entry_omits_absent_fields() {
        let entry = LogEntry { step: 10, epoch: 0.5, loss: Some(2.0), ..Default::default() };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("eval_loss").is_none());
        assert_eq!(json["loss"], 2.0);
    }
}
