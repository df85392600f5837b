//! Adapter fine-tuning loop.
//!
//! [`FineTuner`] owns the schedule (validation split, epochs, gradient
//! accumulation, warmup/decay, logging, evaluation, checkpointing and best-model
//! restore). The numerical work is delegated to a [`TrainingBackend`].

use crate::architecture::ModelArchitecture;
use crate::artifacts::{
    make_artifact, write_json, AdapterConfig, ArtifactKind, FineTuneMetrics, LogEntry,
    TrainerState, TrainingArtifact, TrainingManifest, ADAPTER_CONFIG_FILE, MANIFEST_FILE,
    TRAINER_STATE_FILE,
};
use crate::dataset::{compute_dataset_id, validate_examples, ConversationExample};
use crate::error::{TrainingError, TrainingResult};
use crate::job::FineTuneJobSpec;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::splitter::split_dataset;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::Path;
use tracing::{debug, info};

/// Numerical side of fine-tuning.
///
/// Implementations hold the frozen base and the trainable adapter weights.
pub trait TrainingBackend {
    /// Weight state used for best-model restore.
    type Snapshot: Clone;

    fn id(&self) -> &'static str;

    /// Accumulate gradients for one micro-batch and return its mean loss.
    fn forward_backward(&mut self, batch: &[ConversationExample]) -> TrainingResult<f64>;

    /// Apply and clear accumulated gradients.
    fn optimizer_step(&mut self, learning_rate: f64) -> TrainingResult<()>;

    /// Mean loss over `batch` without touching gradients.
    fn evaluate(&self, batch: &[ConversationExample]) -> TrainingResult<f64>;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);

    /// Write adapter weights and tokenizer files into `dir`.
    fn save(&self, dir: &Path) -> TrainingResult<Vec<TrainingArtifact>>;
}

#[derive(Debug, Clone)]
pub struct FineTuneOutcome {
    pub metrics: FineTuneMetrics,
    pub state: TrainerState,
    pub manifest: TrainingManifest,
}

pub struct FineTuner<'a> {
    job: &'a FineTuneJobSpec,
    architecture: &'a ModelArchitecture,
}

struct Best<S> {
    step: u64,
    loss: f64,
    snapshot: S,
}

fn as_trainer_error(context: &str, err: TrainingError) -> TrainingError {
    match err {
        TrainingError::Trainer(_) => err,
        other => TrainingError::Trainer(format!("{context}: {other}")),
    }
}

fn check_loss(loss: f64, step: u64) -> TrainingResult<f64> {
    if loss.is_finite() {
        Ok(loss)
    } else {
        Err(TrainingError::Trainer(format!("non-finite loss at step {step}")))
    }
}

impl<'a> FineTuner<'a> {
    #[must_use]
    pub fn new(job: &'a FineTuneJobSpec, architecture: &'a ModelArchitecture) -> Self {
        Self { job, architecture }
    }

    fn evaluate<B: TrainingBackend>(
        &self,
        backend: &B,
        validation: &[ConversationExample],
    ) -> TrainingResult<f64> {
        let batch_size = self.job.training.per_device_eval_batch_size as usize;
        let mut weighted = 0.0;
        for batch in validation.chunks(batch_size) {
            let loss = backend
                .evaluate(batch)
                .map_err(|e| as_trainer_error("evaluation failed", e))?;
            weighted += loss * batch.len() as f64;
        }
        Ok(weighted / validation.len().max(1) as f64)
    }

    /// Train on `examples` and write the adapter artifact into `out_dir`.
    pub fn run<B: TrainingBackend>(
        &self,
        backend: &mut B,
        examples: &[ConversationExample],
        out_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<FineTuneOutcome> {
        let job = self.job;
        let args = &job.training;
        job.validate()?;
        validate_examples(examples)?;
        if examples.len() < 2 {
            return Err(TrainingError::InvalidSpec(
                "fine-tuning needs at least 2 examples for a validation split".to_string(),
            ));
        }

        let counts = self.architecture.count_parameters(&job.lora)?;
        let split = split_dataset(examples, args.validation_fraction, args.seed)?;
        let (train, validation) = (split.train, split.test);
        if train.is_empty() {
            return Err(TrainingError::InvalidSpec(
                "validation_fraction leaves no training examples".to_string(),
            ));
        }

        let batch_size = args.per_device_train_batch_size as usize;
        let accumulation = args.gradient_accumulation_steps as usize;
        let micro_per_epoch = train.len().div_ceil(batch_size);
        let steps_per_epoch = micro_per_epoch.div_ceil(accumulation) as u64;
        let total_steps = steps_per_epoch * u64::from(args.num_train_epochs);

        progress.on_event(ProgressEvent::Started { job_id: job.job_id.clone() });
        info!(
            job_id = %job.job_id,
            backend = backend.id(),
            base_model = %job.base_model.model_id,
            train = train.len(),
            validation = validation.len(),
            total_steps,
            trainable_params = counts.trainable,
            trainable_pct = counts.trainable_pct,
            "starting fine-tuning"
        );

        let mut state = TrainerState {
            num_train_epochs: args.num_train_epochs,
            ..TrainerState::default()
        };
        let mut step_losses: Vec<f64> = Vec::with_capacity(total_steps as usize);
        let mut best: Option<Best<B::Snapshot>> = None;
        let mut global_step = 0u64;
        let mut last_eval_step = None;

        for epoch in 0..args.num_train_epochs {
            let mut order: Vec<usize> = (0..train.len()).collect();
            let epoch_seed = args.seed.wrapping_add(u64::from(epoch));
            order.shuffle(&mut StdRng::seed_from_u64(epoch_seed));
            let shuffled: Vec<ConversationExample> =
                order.iter().map(|&i| train[i].clone()).collect();

            let mut accumulated = Vec::with_capacity(accumulation);
            for (micro_idx, batch) in shuffled.chunks(batch_size).enumerate() {
                let loss = backend
                    .forward_backward(batch)
                    .map_err(|e| as_trainer_error("forward/backward failed", e))?;
                accumulated.push(check_loss(loss, global_step + 1)?);

                let end_of_epoch = micro_idx + 1 == micro_per_epoch;
                if accumulated.len() < accumulation && !end_of_epoch {
                    continue;
                }

                let lr = args.learning_rate_at(global_step, total_steps);
                backend
                    .optimizer_step(lr)
                    .map_err(|e| as_trainer_error("optimizer step failed", e))?;
                global_step += 1;

                let step_loss = accumulated.iter().sum::<f64>() / accumulated.len() as f64;
                accumulated.clear();
                step_losses.push(step_loss);
                let epoch_progress =
                    f64::from(epoch) + (micro_idx + 1) as f64 / micro_per_epoch as f64;

                if global_step % args.logging_steps == 0 {
                    state.log_history.push(LogEntry {
                        step: global_step,
                        epoch: epoch_progress,
                        loss: Some(step_loss),
                        learning_rate: Some(lr),
                        eval_loss: None,
                    });
                    progress.on_event(ProgressEvent::Step {
                        job_id: job.job_id.clone(),
                        step: global_step,
                        total: Some(total_steps),
                        loss: step_loss,
                        learning_rate: lr,
                    });
                }

                if global_step % args.eval_steps == 0 {
                    let eval_loss = check_loss(self.evaluate(backend, &validation)?, global_step)?;
                    self.record_eval(
                        &mut state,
                        &mut best,
                        backend,
                        global_step,
                        epoch_progress,
                        eval_loss,
                        progress,
                    );
                    last_eval_step = Some(global_step);
                }

                if global_step % args.save_steps == 0 {
                    let dir = out_dir.join("checkpoints").join(format!("checkpoint-{global_step}"));
                    backend.save(&dir).map_err(|e| as_trainer_error("checkpoint save failed", e))?;
                    debug!(step = global_step, path = %dir.display(), "saved checkpoint");
                }
            }
        }

        if last_eval_step != Some(global_step) {
            let eval_loss = check_loss(self.evaluate(backend, &validation)?, global_step)?;
            self.record_eval(
                &mut state,
                &mut best,
                backend,
                global_step,
                f64::from(args.num_train_epochs),
                eval_loss,
                progress,
            );
        }

        let mut best_step = None;
        if args.load_best_model_at_end {
            if let Some(best) = best {
                info!(step = best.step, eval_loss = best.loss, "restoring best checkpoint");
                best_step = Some(best.step);
                state.best_step = Some(best.step);
                state.best_metric = Some(best.loss);
                backend.restore(best.snapshot);
            }
        }
        let final_eval_loss = self.evaluate(backend, &validation)?;
        state.global_step = global_step;

        let metrics = FineTuneMetrics {
            total_params: counts.total,
            trainable_params: counts.trainable,
            trainable_pct: counts.trainable_pct,
            final_train_loss: if step_losses.is_empty() {
                0.0
            } else {
                step_losses.iter().sum::<f64>() / step_losses.len() as f64
            },
            final_eval_loss,
            global_steps: global_step,
            best_step,
        };

        let manifest = self.write_artifacts(backend, examples, out_dir, &state, &metrics)?;

        progress.on_event(ProgressEvent::Message {
            job_id: job.job_id.clone(),
            message: format!(
                "train_loss={:.4} eval_loss={:.4} trainable={:.2}%",
                metrics.final_train_loss, metrics.final_eval_loss, metrics.trainable_pct
            ),
        });
        progress.on_event(ProgressEvent::Finished { job_id: job.job_id.clone() });

        Ok(FineTuneOutcome { metrics, state, manifest })
    }

    #[allow(clippy::too_many_arguments)]
    fn record_eval<B: TrainingBackend>(
        &self,
        state: &mut TrainerState,
        best: &mut Option<Best<B::Snapshot>>,
        backend: &B,
        step: u64,
        epoch: f64,
        eval_loss: f64,
        progress: &dyn ProgressSink,
    ) {
        state.log_history.push(LogEntry {
            step,
            epoch,
            eval_loss: Some(eval_loss),
            ..LogEntry::default()
        });
        progress.on_event(ProgressEvent::Evaluation {
            job_id: self.job.job_id.clone(),
            step,
            eval_loss,
        });

        if best.as_ref().is_none_or(|b| eval_loss < b.loss) {
            *best = Some(Best { step, loss: eval_loss, snapshot: backend.snapshot() });
        }
    }

    fn write_artifacts<B: TrainingBackend>(
        &self,
        backend: &B,
        examples: &[ConversationExample],
        out_dir: &Path,
        state: &TrainerState,
        metrics: &FineTuneMetrics,
    ) -> TrainingResult<TrainingManifest> {
        std::fs::create_dir_all(out_dir)?;

        let mut artifacts = backend
            .save(out_dir)
            .map_err(|e| as_trainer_error("saving adapter failed", e))?;

        let adapter_config = AdapterConfig {
            base_model: self.job.base_model.clone(),
            architecture: self.architecture.name.clone(),
            lora: self.job.lora.clone(),
            quantization: self.job.quantization.clone(),
            quantized_base_bytes: self.architecture.quantized_base_bytes(&self.job.quantization),
        };
        write_json(&out_dir.join(ADAPTER_CONFIG_FILE), &adapter_config)?;
        artifacts.push(make_artifact(ArtifactKind::AdapterConfig, out_dir, ADAPTER_CONFIG_FILE)?);

        write_json(&out_dir.join(TRAINER_STATE_FILE), state)?;
        artifacts.push(make_artifact(ArtifactKind::TrainerState, out_dir, TRAINER_STATE_FILE)?);

        let manifest = TrainingManifest {
            job_id: self.job.job_id.clone(),
            created_at: Utc::now(),
            base_model: self.job.base_model.clone(),
            dataset_id: compute_dataset_id(examples)?,
            metrics: metrics.clone(),
            artifacts,
        };
        write_json(&out_dir.join(MANIFEST_FILE), &manifest)?;
        info!(path = %out_dir.display(), "wrote fine-tuned artifact");
        Ok(manifest)
    }
}
