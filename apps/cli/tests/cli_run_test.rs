//! Integration tests for `tuneline-cli run`, the single-stage commands and `list`.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a 10-row translation table and a fast mock-backend config next to it.
fn setup(temp_dir: &TempDir) -> PathBuf {
    let mut csv = String::from("sentence,translation\n");
    for i in 0..10 {
        csv.push_str(&format!("The tree number {i} is tall.,\"Tall, tree number {i} is.\"\n"));
    }
    std::fs::write(temp_dir.path().join("yoda.csv"), csv).unwrap();

    let config = r#"
[data]
source_uri = "yoda.csv"
format = "translation"
use_extra_translation = false

[inference]
backend = "mock"

[storage]
runs_root = "runs"

[lora]
r = 2

[training]
num_train_epochs = 1
gradient_accumulation_steps = 1
warmup_steps = 1
logging_steps = 1
eval_steps = 2
learning_rate = 0.05
validation_fraction = 0.25
"#;
    let path = temp_dir.path().join("tuneline.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_run_json_summary() {
    let temp_dir = TempDir::new().unwrap();
    setup(&temp_dir);

    let output =
        cli(temp_dir.path()).args(["run", "--run-id", "run-1", "--json"]).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["status"], "completed");
    assert_eq!(summary["stages"].as_array().unwrap().len(), 4);
    assert_eq!(summary["stages"][0]["stats"]["train_samples"], 8);
    assert!(temp_dir.path().join("runs/run-1/run_summary.json").is_file());
    assert!(temp_dir.path().join("runs/run-1/evaluation/evaluation_results.csv").is_file());
}

#[test]
fn test_run_prints_training_progress() {
    let temp_dir = TempDir::new().unwrap();
    setup(&temp_dir);

    cli(temp_dir.path())
        .args(["run", "--run-id", "run-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[train:"))
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn test_run_with_missing_source_fails() {
    let temp_dir = TempDir::new().unwrap();
    setup(&temp_dir);

    cli(temp_dir.path())
        .args(["run", "--source", "nope.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("data-transformation"));
}

#[test]
fn test_stages_one_at_a_time() {
    let temp_dir = TempDir::new().unwrap();
    setup(&temp_dir);
    let dir = temp_dir.path();

    cli(dir).args(["transform", "--run-id", "solo"]).assert().success();
    let stage_dir = dir.join("runs/solo/data-transformation");
    assert!(stage_dir.join("test.jsonl").is_file());

    cli(dir)
        .args(["train", "--run-id", "solo", "--train"])
        .arg(stage_dir.join("train.jsonl"))
        .assert()
        .success();

    cli(dir)
        .args(["infer", "--run-id", "solo", "--model", "trained:solo", "--test"])
        .arg(stage_dir.join("test.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("total_predictions"));

    cli(dir)
        .args(["evaluate", "--run-id", "solo", "--json", "--predictions"])
        .arg(dir.join("runs/solo/inference/predictions.csv"))
        .assert()
        .success()
        .stdout(predicate::str::contains("average_score"));

    cli(dir)
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trained:solo"));
}

#[test]
fn test_train_requires_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    setup(&temp_dir);

    cli(temp_dir.path())
        .args(["train", "--train", "missing.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("training data not found"));
}

#[test]
fn test_list_empty() {
    let temp_dir = TempDir::new().unwrap();
    cli(temp_dir.path())
        .args(["list", "--runs-root", "nowhere"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No trained adapters found"));
}
