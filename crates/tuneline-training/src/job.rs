use crate::error::{TrainingError, TrainingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_BASE_MODEL: &str = "microsoft/Phi-3-mini-4k-instruct";

/// Identifier for a fine-tuning job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FineTuneJobId(pub String);

impl FineTuneJobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for FineTuneJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FineTuneJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Backend-agnostic model reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Training backend identifier (e.g., "bigram")
    pub engine: String,
    /// Base model ID/name
    pub model_id: String,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self { engine: "bigram".to_string(), model_id: DEFAULT_BASE_MODEL.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoraBias {
    None,
    All,
    LoraOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    CausalLm,
}

/// Low-rank adapter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraConfig {
    pub r: u32,
    pub lora_alpha: u32,
    pub lora_dropout: f64,
    pub target_modules: Vec<String>,
    pub bias: LoraBias,
    pub task_type: TaskType,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            r: 16,
            lora_alpha: 32,
            lora_dropout: 0.05,
            target_modules: [
                "q_proj", "k_proj", "v_proj", "o_proj", "gate_proj", "up_proj", "down_proj",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            bias: LoraBias::None,
            task_type: TaskType::CausalLm,
        }
    }
}

impl LoraConfig {
    /// alpha / r, applied to the adapter delta.
    #[must_use]
    pub fn scaling(&self) -> f64 {
        f64::from(self.lora_alpha) / f64::from(self.r.max(1))
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.r == 0 {
            return Err(TrainingError::InvalidSpec("lora.r must be >= 1".to_string()));
        }
        if self.lora_alpha == 0 {
            return Err(TrainingError::InvalidSpec("lora.lora_alpha must be >= 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.lora_dropout) {
            return Err(TrainingError::InvalidSpec(
                "lora.lora_dropout must be in [0, 1)".to_string(),
            ));
        }
        if self.target_modules.is_empty() {
            return Err(TrainingError::InvalidSpec(
                "lora.target_modules must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantType {
    Nf4,
    Fp4,
    Int8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeDtype {
    Float16,
    Bfloat16,
    Float32,
}

/// Frozen-base quantization settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationConfig {
    pub bits: u8,
    pub quant_type: QuantType,
    pub compute_dtype: ComputeDtype,
    pub double_quant: bool,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            bits: 4,
            quant_type: QuantType::Nf4,
            compute_dtype: ComputeDtype::Float16,
            double_quant: true,
        }
    }
}

impl QuantizationConfig {
    pub fn validate(&self) -> TrainingResult<()> {
        match (self.bits, self.quant_type) {
            (4, QuantType::Nf4 | QuantType::Fp4) | (8, QuantType::Int8) => Ok(()),
            (16 | 32, _) if !self.double_quant => Ok(()),
            (bits, qt) => Err(TrainingError::InvalidSpec(format!(
                "unsupported quantization: {bits} bits with {qt:?}"
            ))),
        }
    }
}

/// Optimizer loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingArguments {
    pub num_train_epochs: u32,
    pub per_device_train_batch_size: u32,
    pub per_device_eval_batch_size: u32,
    pub gradient_accumulation_steps: u32,
    pub learning_rate: f64,
    pub warmup_steps: u64,
    pub logging_steps: u64,
    pub eval_steps: u64,
    pub save_steps: u64,
    pub max_seq_length: usize,
    pub validation_fraction: f64,
    pub seed: u64,
    pub load_best_model_at_end: bool,
}

impl Default for TrainingArguments {
    fn default() -> Self {
        Self {
            num_train_epochs: 3,
            per_device_train_batch_size: 2,
            per_device_eval_batch_size: 2,
            gradient_accumulation_steps: 4,
            learning_rate: 2e-4,
            warmup_steps: 100,
            logging_steps: 10,
            eval_steps: 50,
            save_steps: 100,
            max_seq_length: 512,
            validation_fraction: 0.1,
            seed: 42,
            load_best_model_at_end: true,
        }
    }
}

impl TrainingArguments {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.num_train_epochs == 0 {
            return Err(TrainingError::InvalidSpec("num_train_epochs must be >= 1".to_string()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(TrainingError::InvalidSpec("learning_rate must be > 0".to_string()));
        }
        if self.per_device_train_batch_size == 0 || self.per_device_eval_batch_size == 0 {
            return Err(TrainingError::InvalidSpec("batch sizes must be >= 1".to_string()));
        }
        if self.gradient_accumulation_steps == 0 {
            return Err(TrainingError::InvalidSpec(
                "gradient_accumulation_steps must be >= 1".to_string(),
            ));
        }
        if self.logging_steps == 0 || self.eval_steps == 0 || self.save_steps == 0 {
            return Err(TrainingError::InvalidSpec(
                "logging_steps, eval_steps and save_steps must be >= 1".to_string(),
            ));
        }
        if self.max_seq_length == 0 {
            return Err(TrainingError::InvalidSpec("max_seq_length must be >= 1".to_string()));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(TrainingError::InvalidSpec(
                "validation_fraction must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }

    /// Learning rate at optimizer step `step` (0-based) of `total_steps`.
    ///
    /// Linear warmup from 0 over `warmup_steps`, then linear decay towards 0 at
    /// `total_steps`. The last step still gets a non-zero rate.
    #[must_use]
    pub fn learning_rate_at(&self, step: u64, total_steps: u64) -> f64 {
        if step < self.warmup_steps {
            return self.learning_rate * step as f64 / self.warmup_steps as f64;
        }
        let decay_span = total_steps.saturating_sub(self.warmup_steps).max(1);
        let remaining = total_steps.saturating_sub(step);
        self.learning_rate * remaining as f64 / decay_span as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FineTuneJobSpec {
    pub job_id: FineTuneJobId,
    pub created_at: DateTime<Utc>,
    pub base_model: ModelSpec,
    pub lora: LoraConfig,
    pub quantization: QuantizationConfig,
    pub training: TrainingArguments,
}

impl FineTuneJobSpec {
    #[must_use]
    pub fn new(base_model: ModelSpec) -> Self {
        Self {
            job_id: FineTuneJobId::new(),
            created_at: Utc::now(),
            base_model,
            lora: LoraConfig::default(),
            quantization: QuantizationConfig::default(),
            training: TrainingArguments::default(),
        }
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.base_model.engine.trim().is_empty() {
            return Err(TrainingError::InvalidSpec("base_model.engine is required".to_string()));
        }
        if self.base_model.model_id.trim().is_empty() {
            return Err(TrainingError::InvalidSpec("base_model.model_id is required".to_string()));
        }
        self.lora.validate()?;
        self.quantization.validate()?;
        self.training.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_spec_validate_requires_base_model_fields() {
        let base = ModelSpec { engine: String::new(), model_id: String::new() };
        let spec = FineTuneJobSpec::new(base);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        let spec = FineTuneJobSpec::new(ModelSpec::default());
        spec.validate().unwrap();
        assert_eq!(spec.lora.target_modules.len(), 7);
        assert!((spec.lora.scaling() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lora_rejects_zero_rank() {
        let lora = LoraConfig { r: 0, ..Default::default() };
        assert!(lora.validate().is_err());
    }

    #[test]
    fn test_quantization_rejects_mismatched_bits() {
        let q = QuantizationConfig { bits: 8, ..Default::default() };
        assert!(q.validate().is_err());
        let q = QuantizationConfig { bits: 8, quant_type: QuantType::Int8, ..Default::default() };
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_training_rejects_bad_validation_fraction() {
        let args = TrainingArguments { validation_fraction: 1.0, ..Default::default() };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_learning_rate_schedule() {
        let args = TrainingArguments { learning_rate: 1.0, warmup_steps: 4, ..Default::default() };
        assert!(args.learning_rate_at(0, 10).abs() < 1e-12);
        assert!((args.learning_rate_at(2, 10) - 0.5).abs() < 1e-12);
        assert!((args.learning_rate_at(4, 10) - 1.0).abs() < 1e-12);
        assert!(args.learning_rate_at(5, 10) < 1.0);
        assert!((args.learning_rate_at(9, 10) - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_learning_rate_without_warmup_keeps_last_step() {
        let args = TrainingArguments { learning_rate: 2.0, warmup_steps: 0, ..Default::default() };
        assert!((args.learning_rate_at(0, 4) - 2.0).abs() < 1e-12);
        assert!((args.learning_rate_at(3, 4) - 0.5).abs() < 1e-12);
        assert!(args.learning_rate_at(3, 4) > 0.0);
    }

    #[test]
    fn test_task_type_serializes_like_peft() {
        let json = serde_json::to_string(&TaskType::CausalLm).unwrap();
        assert_eq!(json, "\"CAUSAL_LM\"");
    }
}
