//! Integration tests for `tuneline-cli init-config` and `compile`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_init_config_writes_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tuneline.toml");

    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    cmd.arg("init-config").arg(&path).assert().success().stdout(predicate::str::contains("Wrote"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[data]"));
    assert!(text.contains("test_fraction = 0.2"));
    assert!(text.contains("[training]"));
}

#[test]
fn test_init_config_refuses_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("tuneline.toml");
    std::fs::write(&path, "# mine\n").unwrap();

    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    cmd.arg("init-config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine\n");

    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    cmd.arg("init-config").arg(&path).arg("--force").assert().success();
}

#[test]
fn test_compile_prints_pipeline_document() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    let output = cmd.current_dir(temp_dir.path()).arg("compile").output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "nutrition-assistant-training-pipeline");
    let stages: Vec<&str> =
        json["stages"].as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(stages, ["data-transformation", "fine-tuning", "inference", "evaluation"]);
}

#[test]
fn test_compile_ascii_uses_config_name() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("pipeline.toml");
    std::fs::write(&config, "[pipeline]\nname = \"yoda-translator\"\n").unwrap();

    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    cmd.current_dir(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("compile")
        .arg("--ascii")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("yoda-translator"))
        .stdout(predicate::str::contains("Evaluation <- inference.predictions"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("tuneline-cli").unwrap();
    cmd.current_dir(temp_dir.path())
        .arg("--config")
        .arg("absent.toml")
        .arg("compile")
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}
