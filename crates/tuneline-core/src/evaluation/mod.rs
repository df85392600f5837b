//! Evaluation: metrics, aggregation and the result tables.

pub mod aggregate;
pub mod evaluator;
pub mod metrics;
pub mod tables;

pub use aggregate::{aggregate, average_score, AggregatedMetrics, StatSummary, AVERAGE_SCORE_KEY};
pub use evaluator::{EvaluatedRecord, EvaluationReport, Evaluator};
pub use metrics::{
    default_metrics, tokenize, BleuScore, ExactMatch, Metric, MetricError, RougeScore,
};
