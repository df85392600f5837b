use crate::dataset::ConversationExample;
use crate::error::{TrainingError, TrainingResult};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

/// Result of a seeded train/test partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<ConversationExample>,
    pub test: Vec<ConversationExample>,
}

/// Number of test examples for `n` items at fraction `f`.
///
/// Rounds up, so any non-empty input with `f > 0` gets at least one test item.
#[must_use]
pub fn test_count(n: usize, test_fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let raw = (test_fraction * n as f64 - 1e-9).ceil().max(0.0) as usize;
    raw.clamp(1, n)
}

fn check_fraction(test_fraction: f64) -> TrainingResult<()> {
    if !test_fraction.is_finite() || test_fraction <= 0.0 || test_fraction >= 1.0 {
        return Err(TrainingError::InvalidSpec(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    Ok(())
}

/// Seeded index partition `(train, test)` over `0..n`.
pub fn split_indices(
    n: usize,
    test_fraction: f64,
    seed: u64,
) -> TrainingResult<(Vec<usize>, Vec<usize>)> {
    check_fraction(test_fraction)?;

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let train = order.split_off(test_count(n, test_fraction));
    Ok((train, order))
}

pub fn split_dataset(
    examples: &[ConversationExample],
    test_fraction: f64,
    seed: u64,
) -> TrainingResult<DatasetSplit> {
    let (train_idx, test_idx) = split_indices(examples.len(), test_fraction, seed)?;

    let split = DatasetSplit {
        train: train_idx.iter().map(|&i| examples[i].clone()).collect(),
        test: test_idx.iter().map(|&i| examples[i].clone()).collect(),
    };

    info!(train = split.train.len(), test = split.test.len(), seed, "split dataset");
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn examples(n: usize) -> Vec<ConversationExample> {
        (0..n).map(|i| ConversationExample::new(format!("q{i}"), format!("a{i}"))).collect()
    }

    #[test]
    fn test_ten_rows_fifth_split() {
        let data = examples(10);
        let a = split_dataset(&data, 0.2, 42).unwrap();
        let b = split_dataset(&data, 0.2, 42).unwrap();
        assert_eq!(a.train.len(), 8);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_is_complete_and_disjoint() {
        let (train, test) = split_indices(37, 0.3, 7).unwrap();
        let train_set: BTreeSet<_> = train.iter().copied().collect();
        let test_set: BTreeSet<_> = test.iter().copied().collect();
        assert!(train_set.is_disjoint(&test_set));
        assert_eq!(train_set.len() + test_set.len(), 37);
        assert_eq!(test.len(), 12);
    }

    #[test]
    fn test_small_input_keeps_one_test_example() {
        let (train, test) = split_indices(3, 0.1, 1).unwrap();
        assert_eq!(test.len(), 1);
        assert_eq!(train.len(), 2);
    }

    #[test]
    fn test_exact_product_does_not_round_up() {
        assert_eq!(test_count(10, 0.2), 2);
        assert_eq!(test_count(100, 0.1), 10);
        assert_eq!(test_count(5, 0.5), 3);
    }

    #[test]
    fn test_different_seeds_change_partition() {
        let (_, a) = split_indices(100, 0.2, 1).unwrap();
        let (_, b) = split_indices(100, 0.2, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        assert!(split_indices(10, 0.0, 1).is_err());
        assert!(split_indices(10, 1.0, 1).is_err());
        assert!(split_indices(10, f64::NAN, 1).is_err());
    }

    #[test]
    fn test_empty_input_yields_empty_split() {
        let split = split_dataset(&[], 0.2, 42).unwrap();
        assert!(split.train.is_empty());
        assert!(split.test.is_empty());
    }
}
