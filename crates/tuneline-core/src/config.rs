//! Pipeline configuration file support.
//!
//! A single [`PipelineConfig`] is loaded from TOML, patched with CLI overrides
//! and validated once. Stages receive it by reference and never read the
//! environment themselves.

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::spec::ResourceHints;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tuneline_abstraction::GenerationParameters;
use tuneline_models::GeneratorKind;
use tuneline_training::formatter::DEFAULT_MAX_ANSWER_CLAUSES;
use tuneline_training::job::DEFAULT_BASE_MODEL;
use tuneline_training::{
    DatasetFormat, FineTuneJobSpec, FormatterOptions, LoraConfig, ModelArchitecture, ModelSpec,
    QuantizationConfig, TrainingArguments,
};

/// Default pipeline name, shown by `compile` and recorded in run summaries.
pub const DEFAULT_PIPELINE_NAME: &str = "nutrition-assistant-training-pipeline";
pub const DEFAULT_PIPELINE_DESCRIPTION: &str =
    "Transform a tabular dataset into conversations, fine-tune a LoRA adapter, \
     generate predictions and score them";

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub lora: LoraConfig,
    pub quantization: QuantizationConfig,
    pub training: TrainingArguments,
    pub generation: GenerationConfig,
    pub inference: InferenceConfig,
    pub storage: StorageConfig,
    /// Per-stage overrides of the declared resource hints, keyed by stage name.
    pub resources: BTreeMap<String, ResourceHints>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub name: String,
    pub description: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPELINE_NAME.to_string(),
            description: DEFAULT_PIPELINE_DESCRIPTION.to_string(),
        }
    }
}

/// Where the raw table comes from and how it becomes conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV location: `gs://bucket/key`, `file:///abs/path` or a plain path.
    pub source_uri: String,
    /// Optional mirror destination for stage outputs.
    pub destination_uri: Option<String>,
    pub format: DatasetFormat,
    pub test_fraction: f64,
    pub seed: u64,
    pub use_extra_translation: bool,
    pub max_answer_clauses: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source_uri: "data/dataset.csv".to_string(),
            destination_uri: None,
            format: DatasetFormat::Nutrition,
            test_fraction: 0.2,
            seed: 42,
            use_extra_translation: true,
            max_answer_clauses: DEFAULT_MAX_ANSWER_CLAUSES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_model: String,
    /// Explicit shapes; otherwise a preset is chosen from `base_model`.
    pub architecture: Option<ModelArchitecture>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { base_model: DEFAULT_BASE_MODEL.to_string(), architecture: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub do_sample: bool,
    /// Number of test examples to run; negative means all.
    pub max_samples: i64,
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 200,
            temperature: 0.7,
            top_p: 0.95,
            do_sample: true,
            max_samples: 100,
            seed: None,
        }
    }
}

impl GenerationConfig {
    #[must_use]
    pub const fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            do_sample: self.do_sample,
            seed: self.seed,
        }
    }
}

/// Which generator the inference stage talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InferenceBackend {
    /// Sample from the adapter the fine-tuning stage just wrote.
    #[default]
    Local,
    /// Call a deployed prediction endpoint.
    Endpoint,
    /// Canned responses.
    Mock,
}

impl From<InferenceBackend> for GeneratorKind {
    fn from(value: InferenceBackend) -> Self {
        match value {
            InferenceBackend::Local => Self::Local,
            InferenceBackend::Endpoint => Self::Endpoint,
            InferenceBackend::Mock => Self::Mock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: InferenceBackend,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that holds one subdirectory per run.
    pub runs_root: PathBuf,
    /// Local directory standing in for `gs://` buckets (`<mirror_root>/<bucket>/<key>`).
    pub mirror_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { runs_root: PathBuf::from("runs"), mirror_root: None }
    }
}

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_uri: Option<String>,
    pub destination_uri: Option<String>,
    pub seed: Option<u64>,
    pub max_samples: Option<i64>,
    pub endpoint_url: Option<String>,
    pub runs_root: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> PipelineResult<Self> {
        if !path.exists() {
            return Err(PipelineError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn to_toml_string(&self) -> PipelineResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> PipelineResult<()> {
        let content = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply command-line overrides.
    ///
    /// A seed override applies to both the data split and the training loop.
    /// An endpoint override also switches inference to the endpoint backend.
    pub fn merge_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref source) = overrides.source_uri {
            self.data.source_uri.clone_from(source);
        }
        if let Some(ref dest) = overrides.destination_uri {
            self.data.destination_uri = Some(dest.clone());
        }
        if let Some(seed) = overrides.seed {
            self.data.seed = seed;
            self.training.seed = seed;
        }
        if let Some(max_samples) = overrides.max_samples {
            self.generation.max_samples = max_samples;
        }
        if let Some(ref url) = overrides.endpoint_url {
            self.inference.endpoint_url = Some(url.clone());
            self.inference.backend = InferenceBackend::Endpoint;
        }
        if let Some(ref root) = overrides.runs_root {
            self.storage.runs_root.clone_from(root);
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.pipeline.name.trim().is_empty() {
            return Err(PipelineError::Config("pipeline.name is required".to_string()));
        }
        if self.data.source_uri.trim().is_empty() {
            return Err(PipelineError::Config("data.source_uri is required".to_string()));
        }
        let f = self.data.test_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(PipelineError::Config(format!(
                "data.test_fraction must be in (0, 1), got {f}"
            )));
        }
        if self.data.max_answer_clauses == 0 {
            return Err(PipelineError::Config("data.max_answer_clauses must be >= 1".to_string()));
        }
        if self.generation.max_new_tokens == 0 {
            return Err(PipelineError::Config("generation.max_new_tokens must be >= 1".to_string()));
        }
        if !(self.generation.temperature.is_finite() && self.generation.temperature > 0.0) {
            return Err(PipelineError::Config("generation.temperature must be > 0".to_string()));
        }
        if !(self.generation.top_p > 0.0 && self.generation.top_p <= 1.0) {
            return Err(PipelineError::Config("generation.top_p must be in (0, 1]".to_string()));
        }
        if self.inference.backend == InferenceBackend::Endpoint
            && self.inference.endpoint_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(PipelineError::Config(
                "inference.endpoint_url is required for the endpoint backend".to_string(),
            ));
        }
        if let Some(ref arch) = self.model.architecture {
            arch.validate()?;
        }
        self.job_spec().validate()?;
        Ok(())
    }

    #[must_use]
    pub fn formatter_options(&self) -> FormatterOptions {
        FormatterOptions {
            format: self.data.format,
            use_extra_translation: self.data.use_extra_translation,
            max_answer_clauses: self.data.max_answer_clauses,
            seed: self.data.seed,
        }
    }

    /// A fresh job description for one fine-tuning run.
    #[must_use]
    pub fn job_spec(&self) -> FineTuneJobSpec {
        let mut job = FineTuneJobSpec::new(ModelSpec {
            model_id: self.model.base_model.clone(),
            ..ModelSpec::default()
        });
        job.lora = self.lora.clone();
        job.quantization = self.quantization.clone();
        job.training = self.training.clone();
        job
    }

    /// Explicit architecture, else the preset for the base model, else Phi-3-mini.
    #[must_use]
    pub fn architecture(&self) -> ModelArchitecture {
        self.model
            .architecture
            .clone()
            .or_else(|| ModelArchitecture::for_model_id(&self.model.base_model))
            .unwrap_or_else(ModelArchitecture::phi3_mini)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_run() {
        let config = PipelineConfig::default();
        assert!((config.data.test_fraction - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.data.seed, 42);
        assert_eq!(config.generation.max_new_tokens, 200);
        assert_eq!(config.generation.max_samples, 100);
        assert_eq!(config.lora.r, 16);
        assert_eq!(config.pipeline.name, DEFAULT_PIPELINE_NAME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [data]
            source_uri = "gs://bucket/yoda.csv"
            format = "translation"

            [training]
            num_train_epochs = 1

            [resources.fine-tuning]
            accelerator = "NVIDIA_L4"
            "#,
        )
        .unwrap();

        assert_eq!(config.data.format, DatasetFormat::Translation);
        assert_eq!(config.data.seed, 42);
        assert_eq!(config.training.num_train_epochs, 1);
        assert!((config.training.learning_rate - 2e-4).abs() < f64::EPSILON);
        assert_eq!(
            config.resources["fine-tuning"].accelerator.as_deref(),
            Some("NVIDIA_L4")
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("tuneline.toml");

        let mut config = PipelineConfig::default();
        config.data.source_uri = "file:///data/foods.csv".to_string();
        config.storage.mirror_root = Some(PathBuf::from("/mnt/buckets"));
        config.save_to_file(&path).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let err =
            PipelineConfig::load_from_file(Path::new("/nonexistent/tuneline.toml")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("not found")));
    }

    #[test]
    fn test_overrides() {
        let mut config = PipelineConfig::default();
        config.merge_overrides(&ConfigOverrides {
            seed: Some(7),
            max_samples: Some(-1),
            endpoint_url: Some("http://localhost:8080/predict".to_string()),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.data.seed, 7);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.generation.max_samples, -1);
        assert_eq!(config.inference.backend, InferenceBackend::Endpoint);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.data.test_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.inference.backend = InferenceBackend::Endpoint;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.lora.r = 0;
        assert!(matches!(config.validate(), Err(PipelineError::Training(_))));
    }

    #[test]
    fn test_architecture_falls_back_to_preset() {
        let config = PipelineConfig::default();
        assert_eq!(config.architecture(), ModelArchitecture::phi3_mini());
    }
}
