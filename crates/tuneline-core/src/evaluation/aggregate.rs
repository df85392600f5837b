//! Per-metric summary statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat metric-name → value map written as `aggregated_metrics.json`.
pub type AggregatedMetrics = BTreeMap<String, f64>;

pub const AVERAGE_SCORE_KEY: &str = "average_score";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct StatSummary {
    pub mean: f64,
    /// Sample standard deviation (n - 1); 0 when fewer than two values.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub count: usize,
}

impl StatSummary {
    /// Summarize `values`. An empty slice gives all zeros.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = if count < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };

        Self { mean, std, min: sorted[0], max: sorted[count - 1], median, count }
    }
}

/// Summaries for each metric column, in the given order.
///
/// `columns` pairs a metric name with its per-record scores.
#[must_use]
pub fn aggregate(columns: &[(&str, Vec<f64>)]) -> (AggregatedMetrics, Vec<(String, StatSummary)>) {
    let mut flat = AggregatedMetrics::new();
    let mut summaries = Vec::with_capacity(columns.len());

    for (name, values) in columns {
        let s = StatSummary::from_values(values);
        flat.insert((*name).to_string(), s.mean);
        flat.insert(format!("{name}_std"), s.std);
        flat.insert(format!("{name}_min"), s.min);
        flat.insert(format!("{name}_max"), s.max);
        flat.insert(format!("{name}_median"), s.median);
        flat.insert(format!("{name}_count"), s.count as f64);
        summaries.push(((*name).to_string(), s));
    }

    flat.insert(AVERAGE_SCORE_KEY.to_string(), average_score(&summaries));
    (flat, summaries)
}

/// Unweighted mean of the per-metric means; 0 with no metrics.
#[must_use]
pub fn average_score(summaries: &[(String, StatSummary)]) -> f64 {
    if summaries.is_empty() {
        return 0.0;
    }
    summaries.iter().map(|(_, s)| s.mean).sum::<f64>() / summaries.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_four_values() {
        let s = StatSummary::from_values(&[1.0, 0.0, 0.5, 1.0]);
        assert!((s.mean - 0.625).abs() < 1e-12);
        assert!((s.median - 0.75).abs() < 1e-12);
        assert_eq!(s.min, 0.0);
        assert_eq!(s.max, 1.0);
        assert_eq!(s.count, 4);
        assert!((s.std - 0.478_713).abs() < 1e-6, "{}", s.std);
    }

    #[test]
    fn test_single_value_has_zero_std() {
        let s = StatSummary::from_values(&[0.3]);
        assert_eq!(s.std, 0.0);
        assert_eq!(s.median, 0.3);
    }

    #[test]
    fn test_empty_is_all_zero() {
        let (flat, _) = aggregate(&[("BleuScore", Vec::new())]);
        assert_eq!(flat["BleuScore"], 0.0);
        assert_eq!(flat["BleuScore_count"], 0.0);
        assert_eq!(flat[AVERAGE_SCORE_KEY], 0.0);
    }

    #[test]
    fn test_flat_keys_and_average() {
        let (flat, summaries) = aggregate(&[
            ("ExactMatch", vec![1.0, 0.0]),
            ("RougeScore", vec![1.0, 0.5]),
        ]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(flat.len(), 2 * 6 + 1);
        assert!((flat["ExactMatch"] - 0.5).abs() < 1e-12);
        assert!((flat["RougeScore_median"] - 0.75).abs() < 1e-12);
        assert!((flat[AVERAGE_SCORE_KEY] - 0.625).abs() < 1e-12);
    }
}
