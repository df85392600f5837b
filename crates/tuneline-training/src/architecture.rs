//! Parameter accounting for adapter fine-tuning.
//!
//! A [`ModelArchitecture`] describes the projection shapes of a decoder-only
//! transformer. From it and a [`LoraConfig`] we derive how many parameters the
//! adapter trains and how large the quantized frozen base is.

use crate::error::{TrainingError, TrainingResult};
use crate::job::{LoraBias, LoraConfig, QuantizationConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub name: String,
    pub hidden_size: u64,
    pub intermediate_size: u64,
    pub num_hidden_layers: u64,
    pub num_attention_heads: u64,
    pub num_key_value_heads: u64,
    pub vocab_size: u64,
    #[serde(default)]
    pub tie_word_embeddings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterCounts {
    pub base: u64,
    pub trainable: u64,
    pub total: u64,
    pub trainable_pct: f64,
}

impl ModelArchitecture {
    #[must_use]
    pub fn phi3_mini() -> Self {
        Self {
            name: "phi-3-mini".to_string(),
            hidden_size: 3072,
            intermediate_size: 8192,
            num_hidden_layers: 32,
            num_attention_heads: 32,
            num_key_value_heads: 32,
            vocab_size: 32064,
            tie_word_embeddings: false,
        }
    }

    #[must_use]
    pub fn llama_7b() -> Self {
        Self {
            name: "llama-7b".to_string(),
            hidden_size: 4096,
            intermediate_size: 11008,
            num_hidden_layers: 32,
            num_attention_heads: 32,
            num_key_value_heads: 32,
            vocab_size: 32000,
            tie_word_embeddings: false,
        }
    }

    /// Built-in preset for a Hugging Face model id, if one is known.
    #[must_use]
    pub fn for_model_id(model_id: &str) -> Option<Self> {
        let id = model_id.to_ascii_lowercase();
        if id.contains("phi-3-mini") {
            Some(Self::phi3_mini())
        } else if id.contains("llama-2-7b") || id.contains("llama-7b") {
            Some(Self::llama_7b())
        } else {
            None
        }
    }

    /// Read the shape fields of a Hugging Face `config.json`.
    pub fn from_hf_config(config: &serde_json::Value) -> TrainingResult<Self> {
        let field = |key: &str| {
            config.get(key).and_then(serde_json::Value::as_u64).ok_or_else(|| {
                TrainingError::InvalidSpec(format!("model config is missing integer field '{key}'"))
            })
        };

        let num_attention_heads = field("num_attention_heads")?;
        let arch = Self {
            name: config
                .get("model_type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("custom")
                .to_string(),
            hidden_size: field("hidden_size")?,
            intermediate_size: field("intermediate_size")?,
            num_hidden_layers: field("num_hidden_layers")?,
            num_attention_heads,
            num_key_value_heads: config
                .get("num_key_value_heads")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(num_attention_heads),
            vocab_size: field("vocab_size")?,
            tie_word_embeddings: config
                .get("tie_word_embeddings")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
        };
        arch.validate()?;
        Ok(arch)
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.hidden_size == 0 || self.intermediate_size == 0 || self.num_hidden_layers == 0 {
            return Err(TrainingError::InvalidSpec(format!(
                "architecture '{}' has a zero dimension",
                self.name
            )));
        }
        if self.num_attention_heads == 0
            || self.num_key_value_heads == 0
            || self.hidden_size % self.num_attention_heads != 0
        {
            return Err(TrainingError::InvalidSpec(format!(
                "architecture '{}' has invalid head configuration",
                self.name
            )));
        }
        Ok(())
    }

    fn kv_dim(&self) -> u64 {
        self.hidden_size / self.num_attention_heads * self.num_key_value_heads
    }

    /// `(in_features, out_features)` of a projection module in one layer.
    pub fn module_shape(&self, module: &str) -> TrainingResult<(u64, u64)> {
        let h = self.hidden_size;
        let i = self.intermediate_size;
        match module {
            "q_proj" | "o_proj" => Ok((h, h)),
            "k_proj" | "v_proj" => Ok((h, self.kv_dim())),
            "gate_proj" | "up_proj" => Ok((h, i)),
            "down_proj" => Ok((i, h)),
            other => Err(TrainingError::InvalidSpec(format!(
                "unknown target module '{other}' for architecture '{}'",
                self.name
            ))),
        }
    }

    /// Frozen base parameter count: embeddings, projections, norms and head.
    #[must_use]
    pub fn base_parameters(&self) -> u64 {
        let h = self.hidden_size;
        let i = self.intermediate_size;
        let kv = self.kv_dim();
        let attention = 2 * h * h + 2 * h * kv;
        let mlp = 3 * h * i;
        let norms = 2 * h;
        let per_layer = attention + mlp + norms;
        let embeddings = self.vocab_size * h;
        let head = if self.tie_word_embeddings { 0 } else { self.vocab_size * h };
        per_layer * self.num_hidden_layers + embeddings + head + h
    }

    pub fn count_parameters(&self, lora: &LoraConfig) -> TrainingResult<ParameterCounts> {
        let r = u64::from(lora.r);
        let mut per_layer = 0u64;
        for module in &lora.target_modules {
            let (fan_in, fan_out) = self.module_shape(module)?;
            per_layer += r * (fan_in + fan_out);
            if lora.bias != LoraBias::None {
                per_layer += fan_out;
            }
        }

        let trainable = per_layer * self.num_hidden_layers;
        let base = self.base_parameters();
        let total = base + trainable;
        Ok(ParameterCounts {
            base,
            trainable,
            total,
            trainable_pct: if total == 0 { 0.0 } else { 100.0 * trainable as f64 / total as f64 },
        })
    }

    /// Approximate memory held by the quantized frozen base.
    #[must_use]
    pub fn quantized_base_bytes(&self, quant: &QuantizationConfig) -> u64 {
        let overhead = match (quant.bits, quant.double_quant) {
            (b, _) if b >= 16 => 0.0,
            (_, true) => 0.127,
            (_, false) => 0.5,
        };
        let bits_per_param = f64::from(quant.bits) + overhead;
        (self.base_parameters() as f64 * bits_per_param / 8.0).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phi3_mini_counts() {
        let arch = ModelArchitecture::phi3_mini();
        let counts = arch.count_parameters(&LoraConfig::default()).unwrap();
        assert_eq!(counts.trainable, 29_884_416);
        assert_eq!(counts.base, 3_821_079_552);
        assert!(counts.trainable_pct > 0.7 && counts.trainable_pct < 0.8);
    }

    #[test]
    fn test_rank_scales_trainable_linearly() {
        let arch = ModelArchitecture::phi3_mini();
        let r8 = LoraConfig { r: 8, ..Default::default() };
        let a = arch.count_parameters(&r8).unwrap().trainable;
        let b = arch.count_parameters(&LoraConfig::default()).unwrap().trainable;
        assert_eq!(a * 2, b);
    }

    #[test]
    fn test_unknown_target_module_rejected() {
        let arch = ModelArchitecture::llama_7b();
        let lora = LoraConfig { target_modules: vec!["fc9".to_string()], ..Default::default() };
        assert!(arch.count_parameters(&lora).is_err());
    }

    #[test]
    fn test_from_hf_config_defaults_kv_heads() {
        let cfg = serde_json::json!({
            "model_type": "phi3",
            "hidden_size": 64,
            "intermediate_size": 128,
            "num_hidden_layers": 2,
            "num_attention_heads": 4,
            "vocab_size": 100
        });
        let arch = ModelArchitecture::from_hf_config(&cfg).unwrap();
        assert_eq!(arch.num_key_value_heads, 4);
        assert_eq!(arch.module_shape("k_proj").unwrap(), (64, 64));

        let bad = serde_json::json!({ "hidden_size": 64 });
        assert!(ModelArchitecture::from_hf_config(&bad).is_err());
    }

    #[test]
    fn test_double_quant_shrinks_base() {
        let arch = ModelArchitecture::phi3_mini();
        let dq = QuantizationConfig::default();
        let plain = QuantizationConfig { double_quant: false, ..Default::default() };
        assert!(arch.quantized_base_bytes(&dq) < arch.quantized_base_bytes(&plain));
    }

    #[test]
    fn test_preset_lookup() {
        assert!(ModelArchitecture::for_model_id("microsoft/Phi-3-mini-4k-instruct").is_some());
        assert!(ModelArchitecture::for_model_id("acme/unknown").is_none());
    }
}
