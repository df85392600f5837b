//! Reference-based text metrics.
//!
//! All metrics score one response against one reference in `[0, 1]`. Text is
//! lowercased and split into word and punctuation tokens before comparison.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("reference is empty")]
    EmptyReference,

    #[error("{metric} produced a non-finite score")]
    NonFinite { metric: String },
}

/// A per-record scoring function.
pub trait Metric: Send + Sync {
    /// Column and key name, e.g. `RougeScore`.
    fn name(&self) -> &'static str;

    fn score(&self, response: &str, reference: &str) -> Result<f64, MetricError>;
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+|[^\w\s]").expect("valid token pattern"))
}

/// Lowercased word and punctuation tokens.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    token_pattern().find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

fn require_reference(reference: &str) -> Result<(), MetricError> {
    if reference.trim().is_empty() {
        Err(MetricError::EmptyReference)
    } else {
        Ok(())
    }
}

fn finite(metric: &str, score: f64) -> Result<f64, MetricError> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(MetricError::NonFinite { metric: metric.to_string() })
    }
}

/// 1.0 when the trimmed response equals the trimmed reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Metric for ExactMatch {
    fn name(&self) -> &'static str {
        "ExactMatch"
    }

    fn score(&self, response: &str, reference: &str) -> Result<f64, MetricError> {
        require_reference(reference)?;
        Ok(if response.trim() == reference.trim() { 1.0 } else { 0.0 })
    }
}

/// ROUGE-L F1 over longest common token subsequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct RougeScore;

impl Metric for RougeScore {
    fn name(&self) -> &'static str {
        "RougeScore"
    }

    fn score(&self, response: &str, reference: &str) -> Result<f64, MetricError> {
        require_reference(reference)?;
        let reference = tokenize(reference);
        let response = tokenize(response);
        if response.is_empty() || reference.is_empty() {
            return Ok(0.0);
        }

        let lcs = lcs_length(&reference, &response) as f64;
        let precision = lcs / response.len() as f64;
        let recall = lcs / reference.len() as f64;
        if precision + recall == 0.0 {
            return Ok(0.0);
        }
        finite(self.name(), 2.0 * precision * recall / (precision + recall))
    }
}

fn lcs_length(a: &[String], b: &[String]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y { prev[j] + 1 } else { prev[j + 1].max(curr[j]) };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Sentence BLEU up to 4-grams with exponential smoothing and brevity penalty.
///
/// Orders longer than the response are left out of the geometric mean, so a
/// one-word exact match scores 1.0.
#[derive(Debug, Clone, Copy)]
pub struct BleuScore {
    pub max_n: usize,
}

impl Default for BleuScore {
    fn default() -> Self {
        Self { max_n: 4 }
    }
}

impl Metric for BleuScore {
    fn name(&self) -> &'static str {
        "BleuScore"
    }

    fn score(&self, response: &str, reference: &str) -> Result<f64, MetricError> {
        require_reference(reference)?;
        let reference = tokenize(reference);
        let hypothesis = tokenize(response);
        if hypothesis.is_empty() {
            return Ok(0.0);
        }

        let mut log_sum = 0.0;
        let mut orders = 0usize;
        let mut smoothing = 1.0;
        for n in 1..=self.max_n {
            let (matches, total) = clipped_matches(&reference, &hypothesis, n);
            if total == 0 {
                break;
            }
            let precision = if matches == 0 {
                smoothing *= 2.0;
                1.0 / (smoothing * total as f64)
            } else {
                matches as f64 / total as f64
            };
            log_sum += precision.ln();
            orders += 1;
        }

        let hyp_len = hypothesis.len() as f64;
        let ref_len = reference.len() as f64;
        let brevity = if hyp_len >= ref_len { 1.0 } else { (1.0 - ref_len / hyp_len).exp() };

        finite(self.name(), brevity * (log_sum / orders.max(1) as f64).exp())
    }
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window).or_insert(0) += 1;
        }
    }
    counts
}

/// (clipped matching n-grams, total hypothesis n-grams)
fn clipped_matches(reference: &[String], hypothesis: &[String], n: usize) -> (usize, usize) {
    let hyp = ngram_counts(hypothesis, n);
    let refs = ngram_counts(reference, n);
    let total = hyp.values().sum();
    let matches = hyp
        .iter()
        .map(|(gram, &count)| count.min(refs.get(gram).copied().unwrap_or(0)))
        .sum();
    (matches, total)
}

/// The fixed, ordered metric set used by the evaluation stage.
#[must_use]
pub fn default_metrics() -> Vec<Box<dyn Metric>> {
    vec![Box::new(ExactMatch), Box::new(RougeScore), Box::new(BleuScore::default())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_punctuation() {
        assert_eq!(tokenize("Strong, you ARE!"), vec!["strong", ",", "you", "are", "!"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(ExactMatch.score("Hello there", "Hello there").unwrap(), 1.0);
        assert_eq!(ExactMatch.score(" Hello there ", "Hello there").unwrap(), 1.0);
        assert_eq!(ExactMatch.score("hello there", "Hello there").unwrap(), 0.0);
        assert_eq!(ExactMatch.score("x", ""), Err(MetricError::EmptyReference));
    }

    #[test]
    fn test_rouge_l() {
        assert!((RougeScore.score("the cat sat", "the cat sat").unwrap() - 1.0).abs() < 1e-12);
        // LCS "the sat" = 2; p = 2/3, r = 2/2
        let score = RougeScore.score("the dog sat", "the sat").unwrap();
        assert!((score - 0.8).abs() < 1e-12, "{score}");
        assert_eq!(RougeScore.score("", "the sat").unwrap(), 0.0);
    }

    #[test]
    fn test_bleu_identical_is_one() {
        let text = "Kale contains: Calories: 49 kcal, Protein: 4.3g";
        assert!((BleuScore::default().score(text, text).unwrap() - 1.0).abs() < 1e-12);
        assert!((BleuScore::default().score("Hello", "hello").unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bleu_partial_and_disjoint() {
        let bleu = BleuScore::default();
        let partial = bleu.score("the cat sat on a mat", "the cat sat on the mat").unwrap();
        assert!(partial > 0.0 && partial < 1.0, "{partial}");

        let disjoint = bleu.score("zebra", "the cat sat on the mat").unwrap();
        assert!(disjoint < 0.01, "{disjoint}");
    }

    #[test]
    fn test_bleu_brevity_penalty() {
        let bleu = BleuScore::default();
        let short = bleu.score("the cat", "the cat sat on the mat").unwrap();
        let long = bleu.score("the cat sat on the", "the cat sat on the mat").unwrap();
        assert!(short < long);
    }

    #[test]
    fn test_default_metric_order() {
        let names: Vec<&str> = default_metrics().iter().map(|m| m.name()).collect();
        assert_eq!(names, ["ExactMatch", "RougeScore", "BleuScore"]);
    }
}
