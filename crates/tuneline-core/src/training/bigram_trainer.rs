//! In-process training backend for the bigram adapter.
//!
//! The frozen base predicts a uniform next token. The adapter learns a rank-`r`
//! factorized correction `scaling · A·B` to the transition logits from the
//! template-rendered training text, optimized with AdamW. The result loads
//! directly into [`tuneline_models::BigramModel`].

use crate::inference::render_training_text;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::debug;
use tuneline_models::bigram::softmax;
use tuneline_models::{AdapterWeights, TokenizerConfig};
use tuneline_training::artifacts::{
    make_artifact, write_json, ADAPTER_MODEL_FILE, TOKENIZER_CONFIG_FILE,
};
use tuneline_training::{
    ArtifactKind, ConversationExample, LoraConfig, TrainingArguments, TrainingArtifact,
    TrainingBackend, TrainingError, TrainingResult,
};

/// AdamW with bias correction over one flat parameter vector.
#[derive(Debug, Clone)]
struct AdamW {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: i32,
    m: Vec<f32>,
    v: Vec<f32>,
}

impl AdamW {
    fn new(len: usize, weight_decay: f32) -> Self {
        Self {
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay,
            t: 0,
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }

    fn step(&mut self, params: &mut [f32], grads: &[f32], lr: f32) {
        self.t += 1;
        let lr_t = lr * (1.0 - self.beta2.powi(self.t)).sqrt() / (1.0 - self.beta1.powi(self.t));
        for (i, (p, g)) in params.iter_mut().zip(grads).enumerate() {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;
            *p -= lr * self.weight_decay * *p;
            *p -= lr_t * self.m[i] / (self.v[i].sqrt() + self.epsilon);
        }
    }
}

pub struct BigramAdapterBackend {
    tokenizer: TokenizerConfig,
    weights: AdapterWeights,
    grad_a: Vec<f32>,
    grad_b: Vec<f32>,
    pending_batches: usize,
    optimizer: AdamW,
    dropout: f64,
    max_seq_length: usize,
    rng: StdRng,
}

impl BigramAdapterBackend {
    /// Build the vocabulary from `corpus` and initialize a zero-delta adapter.
    #[must_use]
    pub fn new(
        corpus: &[ConversationExample],
        lora: &LoraConfig,
        training: &TrainingArguments,
    ) -> Self {
        let texts: Vec<String> = corpus.iter().map(render_training_text).collect();
        let tokenizer = TokenizerConfig::from_corpus(texts.iter().map(String::as_str));
        let rank = lora.r.max(1) as usize;
        let scaling = lora.scaling() as f32;
        let weights = AdapterWeights::init(tokenizer.vocab_size(), rank, scaling, training.seed);
        let params = weights.lora_a.len() + weights.lora_b.len();

        debug!(vocab = tokenizer.vocab_size(), rank, params, "initialized bigram adapter");

        Self {
            grad_a: vec![0.0; weights.lora_a.len()],
            grad_b: vec![0.0; weights.lora_b.len()],
            optimizer: AdamW::new(params, 0.0),
            tokenizer,
            weights,
            pending_batches: 0,
            dropout: lora.lora_dropout,
            max_seq_length: training.max_seq_length,
            rng: StdRng::seed_from_u64(training.seed.wrapping_add(1)),
        }
    }

    #[must_use]
    pub fn tokenizer(&self) -> &TokenizerConfig {
        &self.tokenizer
    }

    #[must_use]
    pub fn weights(&self) -> &AdapterWeights {
        &self.weights
    }

    fn encode(&self, example: &ConversationExample) -> Vec<usize> {
        let mut ids = self.tokenizer.encode(&render_training_text(example));
        ids.truncate(self.max_seq_length);
        ids
    }

    /// Total negative log-likelihood and transition count for `ids`.
    fn sequence_nll(&self, ids: &[usize]) -> (f64, usize) {
        let mut nll = 0.0;
        for pair in ids.windows(2) {
            let probs = softmax(&self.weights.logits(pair[0]));
            nll -= f64::from(probs[pair[1]].max(f32::MIN_POSITIVE)).ln();
        }
        (nll, ids.len().saturating_sub(1))
    }
}

impl TrainingBackend for BigramAdapterBackend {
    type Snapshot = AdapterWeights;

    fn id(&self) -> &'static str {
        "bigram-lora"
    }

    fn forward_backward(&mut self, batch: &[ConversationExample]) -> TrainingResult<f64> {
        let v = self.weights.vocab_size;
        let r = self.weights.rank;
        let s = self.weights.scaling;
        let keep = 1.0 - self.dropout;

        let sequences: Vec<Vec<usize>> = batch.iter().map(|e| self.encode(e)).collect();
        let transitions: usize = sequences.iter().map(|ids| ids.len().saturating_sub(1)).sum();
        if transitions == 0 {
            return Err(TrainingError::Trainer("batch has no token transitions".to_string()));
        }
        let norm = 1.0 / transitions as f32;

        let mut nll = 0.0;
        let mut da = vec![0.0f32; v * r];
        let mut db = vec![0.0f32; r * v];

        for ids in &sequences {
            for pair in ids.windows(2) {
                let (current, next) = (pair[0].min(v - 1), pair[1].min(v - 1));
                let mut probs = softmax(&self.weights.logits(current));
                nll -= f64::from(probs[next].max(f32::MIN_POSITIVE)).ln();

                // Inverted dropout on the adapter input: the whole row is kept or dropped.
                let mask = if self.dropout > 0.0 {
                    if self.rng.gen_bool(keep) { 1.0 / keep as f32 } else { 0.0 }
                } else {
                    1.0
                };
                if mask == 0.0 {
                    continue;
                }

                // d loss / d logits = softmax - onehot
                probs[next] -= 1.0;
                let a_row = &self.weights.lora_a[current * r..(current + 1) * r];
                for k in 0..r {
                    let b_row = &self.weights.lora_b[k * v..(k + 1) * v];
                    let mut dot = 0.0f32;
                    for (j, g) in probs.iter().enumerate() {
                        dot += g * b_row[j];
                        db[k * v + j] += mask * s * a_row[k] * g * norm;
                    }
                    da[current * r + k] += mask * s * dot * norm;
                }
            }
        }

        for (acc, g) in self.grad_a.iter_mut().zip(&da) {
            *acc += g;
        }
        for (acc, g) in self.grad_b.iter_mut().zip(&db) {
            *acc += g;
        }
        self.pending_batches += 1;

        Ok(nll / transitions as f64)
    }

    fn optimizer_step(&mut self, learning_rate: f64) -> TrainingResult<()> {
        if self.pending_batches == 0 {
            return Err(TrainingError::Trainer("optimizer step without gradients".to_string()));
        }
        let scale = 1.0 / self.pending_batches as f32;

        let split = self.weights.lora_a.len();
        let mut params: Vec<f32> =
            self.weights.lora_a.iter().chain(&self.weights.lora_b).copied().collect();
        let grads: Vec<f32> = self.grad_a.iter().chain(&self.grad_b).map(|g| g * scale).collect();
        if grads.iter().any(|g| !g.is_finite()) {
            return Err(TrainingError::Trainer("non-finite gradient".to_string()));
        }

        self.optimizer.step(&mut params, &grads, learning_rate as f32);
        self.weights.lora_b = params.split_off(split);
        self.weights.lora_a = params;

        self.grad_a.fill(0.0);
        self.grad_b.fill(0.0);
        self.pending_batches = 0;
        Ok(())
    }

    fn evaluate(&self, batch: &[ConversationExample]) -> TrainingResult<f64> {
        let (nll, count) = batch
            .iter()
            .map(|e| self.sequence_nll(&self.encode(e)))
            .fold((0.0, 0usize), |(a, b), (x, y)| (a + x, b + y));
        if count == 0 {
            return Err(TrainingError::Trainer(
                "evaluation batch has no token transitions".to_string(),
            ));
        }
        Ok(nll / count as f64)
    }

    fn snapshot(&self) -> AdapterWeights {
        self.weights.clone()
    }

    fn restore(&mut self, snapshot: AdapterWeights) {
        self.weights = snapshot;
        self.grad_a.fill(0.0);
        self.grad_b.fill(0.0);
        self.pending_batches = 0;
    }

    fn save(&self, dir: &Path) -> TrainingResult<Vec<TrainingArtifact>> {
        write_json(&dir.join(ADAPTER_MODEL_FILE), &self.weights)?;
        write_json(&dir.join(TOKENIZER_CONFIG_FILE), &self.tokenizer)?;
        Ok(vec![
            make_artifact(ArtifactKind::Adapter, dir, ADAPTER_MODEL_FILE)?,
            make_artifact(ArtifactKind::Tokenizer, dir, TOKENIZER_CONFIG_FILE)?,
        ])
    }
}
