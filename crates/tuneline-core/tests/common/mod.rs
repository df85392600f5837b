//! Shared fixtures for tuneline-core integration tests.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tuneline_core::{InferenceBackend, PipelineConfig};
use tuneline_training::DatasetFormat;

/// Write a `sentence,translation,translation_extra` table with `rows` rows.
pub fn write_translation_csv(dir: &Path, rows: usize) -> PathBuf {
    let mut csv = String::from("sentence,translation,translation_extra\n");
    for i in 0..rows {
        writeln!(
            csv,
            "The ship number {i} is ready.,\"Ready, ship number {i} is.\",\
             \"Ready is ship {i}, hmm.\""
        )
        .unwrap();
    }
    let path = dir.join("yoda_sentences.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

/// Write a small nutrition table.
pub fn write_nutrition_csv(dir: &Path) -> PathBuf {
    let csv = "food,Caloric Value,Protein,Fat,Carbohydrates,Dietary Fiber\n\
               lentils,100,5,0,20,0\n\
               kale,49,4.3,0.9,8.8,3.6\n\
               water,0,0,0,0,0\n\
               apple,52,0.3,0.2,14,2.4\n\
               rice,130,2.7,0.3,28,0.4\n";
    let path = dir.join("food.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

/// A configuration that trains in well under a second.
pub fn fast_config(root: &Path, source: &Path, format: DatasetFormat) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data.source_uri = source.display().to_string();
    config.data.format = format;
    config.data.use_extra_translation = false;
    config.storage.runs_root = root.join("runs");
    config.inference.backend = InferenceBackend::Mock;

    config.lora.r = 2;
    config.lora.lora_alpha = 4;
    config.training.num_train_epochs = 1;
    config.training.per_device_train_batch_size = 2;
    config.training.gradient_accumulation_steps = 1;
    config.training.learning_rate = 0.05;
    config.training.warmup_steps = 1;
    config.training.logging_steps = 1;
    config.training.eval_steps = 2;
    config.training.save_steps = 1000;
    config.training.validation_fraction = 0.25;

    config.generation.max_new_tokens = 40;
    config.generation.seed = Some(7);
    config
}
