//! Scores predictions with the metric set and aggregates the results.

use super::aggregate::{aggregate, AggregatedMetrics, StatSummary, AVERAGE_SCORE_KEY};
use super::metrics::{default_metrics, Metric};
use crate::inference::PredictionRecord;
use tracing::{info, warn};

/// One prediction with its per-metric scores, aligned with the metric order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedRecord {
    pub user_input: String,
    pub reference: String,
    pub response: String,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub metric_names: Vec<String>,
    pub records: Vec<EvaluatedRecord>,
    pub summaries: Vec<(String, StatSummary)>,
    pub aggregated: AggregatedMetrics,
    pub average_score: f64,
    /// Scores that failed and were recorded as 0.0.
    pub metric_failures: usize,
    /// Records with at least one failed metric.
    pub degraded: usize,
}

pub struct Evaluator {
    metrics: Vec<Box<dyn Metric>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(default_metrics())
    }
}

impl Evaluator {
    #[must_use]
    pub fn new(metrics: Vec<Box<dyn Metric>>) -> Self {
        Self { metrics }
    }

    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }

    #[must_use]
    pub fn evaluate(&self, predictions: &[PredictionRecord]) -> EvaluationReport {
        info!(records = predictions.len(), metrics = ?self.metric_names(), "computing metrics");

        let mut records = Vec::with_capacity(predictions.len());
        let mut metric_failures = 0;
        let mut degraded = 0;

        for (idx, p) in predictions.iter().enumerate() {
            let mut failed = false;
            let scores = self
                .metrics
                .iter()
                .map(|metric| match metric.score(&p.extracted_response, &p.reference) {
                    Ok(score) => score,
                    Err(e) => {
                        warn!(
                            metric = metric.name(),
                            record = idx,
                            error = %e,
                            "metric failed, scoring 0"
                        );
                        metric_failures += 1;
                        failed = true;
                        0.0
                    }
                })
                .collect();
            if failed {
                degraded += 1;
            }

            records.push(EvaluatedRecord {
                user_input: p.user_input.clone(),
                reference: p.reference.clone(),
                response: p.extracted_response.clone(),
                scores,
            });

            if (idx + 1) % 20 == 0 {
                info!(evaluated = idx + 1, total = predictions.len(), "evaluation progress");
            }
        }

        let names = self.metric_names();
        let columns: Vec<(&str, Vec<f64>)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), records.iter().map(|r| r.scores[i]).collect()))
            .collect();
        let (aggregated, summaries) = aggregate(&columns);
        let average_score = aggregated.get(AVERAGE_SCORE_KEY).copied().unwrap_or(0.0);

        for (name, s) in &summaries {
            info!(metric = %name, mean = s.mean, std = s.std, "metric summary");
        }

        EvaluationReport {
            metric_names: names,
            records,
            summaries,
            aggregated,
            average_score,
            metric_failures,
            degraded,
        }
    }
}
