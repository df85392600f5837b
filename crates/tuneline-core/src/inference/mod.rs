//! Inference: chat template, response extraction and the prediction loop.

pub mod extract;
pub mod runner;
pub mod template;

pub use extract::{extract_response, ExtractionOutcome};
pub use runner::{sample_count, InferenceReport, InferenceRunner, PredictionRecord};
pub use template::{render_prompt, render_training_text};
