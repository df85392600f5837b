//! Local bigram adapter model.
//!
//! The frozen base is a uniform next-token distribution over a character
//! vocabulary. The adapter is a rank-`r` factorization `A·B` of the transition
//! logits, scaled by `alpha / r`. Chat markers are single tokens so the model can
//! learn to emit `<|end|>`.
//!
//! The file formats here (`tokenizer_config.json`, `adapter_model.json`) are
//! shared with the training backend that produces them.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use tuneline_abstraction::{
    GenerationParameters, GenerationRequest, ModelError, ModelResponse, ModelUsage, TextGenerator,
};

pub const UNK_TOKEN: &str = "<|unk|>";
pub const USER_MARKER: &str = "<|user|>";
pub const ASSISTANT_MARKER: &str = "<|assistant|>";
pub const END_MARKER: &str = "<|end|>";

pub const SPECIAL_TOKENS: [&str; 4] = [UNK_TOKEN, USER_MARKER, ASSISTANT_MARKER, END_MARKER];

pub const TOKENIZER_FILE: &str = "tokenizer_config.json";
pub const ADAPTER_FILE: &str = "adapter_model.json";

/// Character vocabulary with chat markers as atomic tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub chat_template: String,
    pub special_tokens: Vec<String>,
    pub vocab: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TokenizerConfig {
    /// Build a vocabulary from a corpus. Special tokens take ids 0..4.
    #[must_use]
    pub fn from_corpus<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut chars = std::collections::BTreeSet::new();
        for text in texts {
            let mut rest = text;
            while let Some(len) = next_piece(rest, &SPECIAL_TOKENS) {
                let piece = &rest[..len];
                if !SPECIAL_TOKENS.contains(&piece) {
                    chars.insert(piece.to_string());
                }
                rest = &rest[len..];
            }
        }

        let vocab = SPECIAL_TOKENS
            .iter()
            .map(|s| (*s).to_string())
            .chain(chars)
            .collect();
        Self::new(vocab)
    }

    #[must_use]
    pub fn new(vocab: Vec<String>) -> Self {
        let mut cfg = Self {
            chat_template: format!("{USER_MARKER}\n{{user}}{END_MARKER}\n{ASSISTANT_MARKER}\n"),
            special_tokens: SPECIAL_TOKENS.iter().map(|s| (*s).to_string()).collect(),
            vocab,
            index: HashMap::new(),
        };
        cfg.reindex();
        cfg
    }

    fn reindex(&mut self) {
        self.index = self.vocab.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.vocab.len() < SPECIAL_TOKENS.len()
            || self.vocab.iter().zip(SPECIAL_TOKENS).any(|(v, s)| v != s)
        {
            return Err(ModelError::ArtifactError(
                "tokenizer vocab must start with the special tokens".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    #[must_use]
    pub fn token_id(&self, token: &str) -> usize {
        self.index.get(token).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn end_id(&self) -> usize {
        self.token_id(END_MARKER)
    }

    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<usize> {
        let special: Vec<&str> = self.special_tokens.iter().map(String::as_str).collect();
        let mut ids = Vec::new();
        let mut rest = text;
        while let Some(len) = next_piece(rest, &special) {
            ids.push(self.token_id(&rest[..len]));
            rest = &rest[len..];
        }
        ids
    }

    #[must_use]
    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .map(|&id| self.vocab.get(id).map_or(UNK_TOKEN, String::as_str))
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ModelError::ArtifactError(format!("failed to read tokenizer {}: {e}", path.display()))
        })?;
        let mut cfg: Self = serde_json::from_slice(&bytes).map_err(|e| {
            ModelError::SerializationError(format!(
                "failed to parse tokenizer {}: {e}",
                path.display()
            ))
        })?;
        cfg.reindex();
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Byte length of the next token: a special marker if one starts here, else one char.
fn next_piece(text: &str, special: &[&str]) -> Option<usize> {
    let ch = text.chars().next()?;
    if let Some(s) = special.iter().find(|s| text.starts_with(**s)) {
        return Some(s.len());
    }
    Some(ch.len_utf8())
}

/// Low-rank transition adapter. `lora_a` is `vocab × rank`, `lora_b` is `rank × vocab`,
/// both row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterWeights {
    pub vocab_size: usize,
    pub rank: usize,
    pub scaling: f32,
    pub lora_a: Vec<f32>,
    pub lora_b: Vec<f32>,
}

impl AdapterWeights {
    /// `A` from a seeded small uniform init, `B` zero, so the initial delta is zero.
    #[must_use]
    pub fn init(vocab_size: usize, rank: usize, scaling: f32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = 1.0 / (rank.max(1) as f32).sqrt();
        let lora_a = (0..vocab_size * rank).map(|_| rng.gen_range(-bound..bound)).collect();
        Self { vocab_size, rank, scaling, lora_a, lora_b: vec![0.0; rank * vocab_size] }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.vocab_size == 0 || self.rank == 0 {
            return Err(ModelError::ArtifactError("adapter has zero vocab or rank".to_string()));
        }
        if self.lora_a.len() != self.vocab_size * self.rank
            || self.lora_b.len() != self.rank * self.vocab_size
        {
            return Err(ModelError::ArtifactError("adapter matrix sizes do not match".to_string()));
        }
        Ok(())
    }

    /// Next-token logits after token `current`. The uniform base contributes 0.
    #[must_use]
    pub fn logits(&self, current: usize) -> Vec<f32> {
        let v = self.vocab_size;
        let r = self.rank;
        let current = current.min(v - 1);
        let a_row = &self.lora_a[current * r..(current + 1) * r];
        (0..v)
            .map(|next| {
                let dot: f32 = (0..r).map(|k| a_row[k] * self.lora_b[k * v + next]).sum();
                self.scaling * dot
            })
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ModelError::ArtifactError(format!("failed to read adapter {}: {e}", path.display()))
        })?;
        let weights: Self = serde_json::from_slice(&bytes).map_err(|e| {
            ModelError::SerializationError(format!(
                "failed to parse adapter {}: {e}",
                path.display()
            ))
        })?;
        weights.validate()?;
        Ok(weights)
    }
}

/// Numerically stable softmax.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    let mut best_i = 0usize;
    let mut best_v = f32::NEG_INFINITY;
    for (i, v) in values.iter().copied().enumerate() {
        if v > best_v {
            best_v = v;
            best_i = i;
        }
    }
    best_i
}

/// Sample from `logits` with temperature and nucleus filtering.
fn sample_next(logits: &[f32], temperature: f32, top_p: f32, rng: &mut StdRng) -> usize {
    let temperature = temperature.max(1e-4);
    let scaled: Vec<f32> = logits.iter().map(|l| l / temperature).collect();
    let probs = softmax(&scaled);

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

    let mut kept = Vec::new();
    let mut mass = 0.0f32;
    for id in order {
        kept.push(id);
        mass += probs[id];
        if mass >= top_p {
            break;
        }
    }

    let mut draw = rng.gen_range(0.0..mass.max(f32::MIN_POSITIVE));
    for &id in &kept {
        draw -= probs[id];
        if draw <= 0.0 {
            return id;
        }
    }
    kept.last().copied().unwrap_or(0)
}

/// Text generator backed by a trained bigram adapter directory.
#[derive(Debug, Clone)]
pub struct BigramModel {
    model_id: String,
    tokenizer: TokenizerConfig,
    weights: AdapterWeights,
}

impl BigramModel {
    #[must_use]
    pub fn new(model_id: String, tokenizer: TokenizerConfig, weights: AdapterWeights) -> Self {
        Self { model_id, tokenizer, weights }
    }

    /// Load `tokenizer_config.json` and `adapter_model.json` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, ModelError> {
        let tokenizer = TokenizerConfig::load(&dir.join(TOKENIZER_FILE))?;
        let weights = AdapterWeights::load(&dir.join(ADAPTER_FILE))?;
        if weights.vocab_size != tokenizer.vocab_size() {
            return Err(ModelError::ArtifactError(format!(
                "adapter vocab ({}) does not match tokenizer vocab ({})",
                weights.vocab_size,
                tokenizer.vocab_size()
            )));
        }
        let model_id = dir.file_name().map_or_else(
            || "bigram-adapter".to_string(),
            |n| format!("bigram:{}", n.to_string_lossy()),
        );
        Ok(Self::new(model_id, tokenizer, weights))
    }

    /// Prompt ids followed by up to `max_new_tokens` sampled ids, stopping after `<|end|>`.
    fn generate_ids(&self, prompt: &str, parameters: &GenerationParameters) -> Vec<usize> {
        let mut ids = self.tokenizer.encode(prompt);
        let mut current = ids.last().copied().unwrap_or(0);
        let end = self.tokenizer.end_id();
        let mut rng = StdRng::seed_from_u64(parameters.seed.unwrap_or(0));

        for _ in 0..parameters.max_new_tokens {
            let logits = self.weights.logits(current);
            let next = if parameters.do_sample {
                sample_next(&logits, parameters.temperature, parameters.top_p, &mut rng)
            } else {
                argmax(&logits)
            };
            ids.push(next);
            if next == end {
                break;
            }
            current = next;
        }
        ids
    }
}

#[async_trait]
impl TextGenerator for BigramModel {
    async fn generate(
        &self,
        request: &GenerationRequest,
        parameters: &GenerationParameters,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = request.prompt.len(),
            max_new_tokens = parameters.max_new_tokens,
            "BigramModel generating text"
        );

        let prompt_tokens = self.tokenizer.encode(&request.prompt).len();
        let ids = self.generate_ids(&request.prompt, parameters);
        let completion_tokens = ids.len() - prompt_tokens;

        Ok(ModelResponse {
            content: self.tokenizer.decode(&ids),
            model_id: Some(self.model_id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens: prompt_tokens as u32,
                generated_tokens: completion_tokens as u32,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
