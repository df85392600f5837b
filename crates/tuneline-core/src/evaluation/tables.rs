//! CSV and JSON tables exchanged between the inference and evaluation stages.

use super::aggregate::AggregatedMetrics;
use super::evaluator::EvaluatedRecord;
use crate::error::{PipelineError, PipelineResult};
use crate::inference::PredictionRecord;
use std::path::Path;

pub const PREDICTIONS_FILE: &str = "predictions.csv";
pub const EVALUATION_RESULTS_FILE: &str = "evaluation_results.csv";
pub const AGGREGATED_METRICS_FILE: &str = "aggregated_metrics.json";

fn ensure_parent(path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Serialize predictions with header `user_input,reference,extracted_response`.
pub fn predictions_to_csv(records: &[PredictionRecord]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    if records.is_empty() {
        writer.write_record(["user_input", "reference", "extracted_response"])?;
    }
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Storage(format!("failed to flush CSV: {e}")))
}

pub fn write_predictions(path: &Path, records: &[PredictionRecord]) -> PipelineResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, predictions_to_csv(records)?)?;
    Ok(())
}

/// Read a predictions table. Missing cells read as empty strings.
pub fn read_predictions(path: &Path) -> PipelineResult<Vec<PredictionRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in ["user_input", "reference", "extracted_response"] {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::Storage(format!(
                "{} is missing column {column}",
                path.display()
            )));
        }
    }

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Header `user_input,reference,response,<metric...>`.
pub fn write_evaluation_results(
    path: &Path,
    metric_names: &[String],
    records: &[EvaluatedRecord],
) -> PipelineResult<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;

    let mut header =
        vec!["user_input".to_string(), "reference".to_string(), "response".to_string()];
    header.extend(metric_names.iter().cloned());
    writer.write_record(&header)?;

    for record in records {
        let mut row =
            vec![record.user_input.clone(), record.reference.clone(), record.response.clone()];
        row.extend(record.scores.iter().map(f64::to_string));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_aggregated_metrics(path: &Path, metrics: &AggregatedMetrics) -> PipelineResult<()> {
    ensure_parent(path)?;
    std::fs::write(path, serde_json::to_vec_pretty(metrics)?)?;
    Ok(())
}

pub fn read_aggregated_metrics(path: &Path) -> PipelineResult<AggregatedMetrics> {
    Ok(serde_json::from_slice(&std::fs::read(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<PredictionRecord> {
        vec![
            PredictionRecord {
                user_input: "What is in kale?".to_string(),
                reference: "Kale contains: Protein: 4.3g".to_string(),
                extracted_response: "Kale contains: Protein: 4.3g".to_string(),
            },
            PredictionRecord {
                user_input: "Say \"hi\", please".to_string(),
                reference: "hi".to_string(),
                extracted_response: String::new(),
            },
        ]
    }

    #[test]
    fn test_predictions_header_and_quoting() {
        let bytes = predictions_to_csv(&sample()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("user_input,reference,extracted_response\n"));
        assert!(text.contains("\"Say \"\"hi\"\", please\""));
    }

    #[test]
    fn test_empty_predictions_still_have_header() {
        let text = String::from_utf8(predictions_to_csv(&[]).unwrap()).unwrap();
        assert_eq!(text, "user_input,reference,extracted_response\n");
    }

    #[test]
    fn test_read_back_predictions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("inference").join(PREDICTIONS_FILE);
        write_predictions(&path, &sample()).unwrap();
        assert_eq!(read_predictions(&path).unwrap(), sample());
    }

    #[test]
    fn test_read_rejects_missing_column() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.csv");
        std::fs::write(&path, "user_input,reference\nq,a\n").unwrap();
        assert!(matches!(
            read_predictions(&path),
            Err(PipelineError::Storage(msg)) if msg.contains("extracted_response")
        ));
    }

    #[test]
    fn test_evaluation_results_columns() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(EVALUATION_RESULTS_FILE);
        let records = vec![EvaluatedRecord {
            user_input: "q".to_string(),
            reference: "a".to_string(),
            response: "a".to_string(),
            scores: vec![1.0, 0.5],
        }];
        let metric_names = ["ExactMatch".to_string(), "RougeScore".to_string()];
        write_evaluation_results(&path, &metric_names, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "user_input,reference,response,ExactMatch,RougeScore\nq,a,a,1,0.5\n");
    }

    #[test]
    fn test_aggregated_metrics_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(AGGREGATED_METRICS_FILE);
        let mut metrics = AggregatedMetrics::new();
        metrics.insert("average_score".to_string(), 0.25);
        write_aggregated_metrics(&path, &metrics).unwrap();
        assert_eq!(read_aggregated_metrics(&path).unwrap(), metrics);
    }
}
