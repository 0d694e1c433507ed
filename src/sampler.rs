use std::collections::HashSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

pub fn total_pairs(count: usize) -> u64 {
    let count = count as u64;
    count * count.saturating_sub(1) / 2
}

// Unordered index pairs `(i, j)` with `i < j`, in lexicographic order.
#[derive(Debug, Clone)]
pub struct PairCombinations {
    count: usize,
    left: usize,
    right: usize,
}

impl PairCombinations {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            left: 0,
            right: 1,
        }
    }
}

impl Iterator for PairCombinations {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.right >= self.count {
            self.left += 1;
            self.right = self.left + 1;
            if self.right >= self.count {
                return None;
            }
        }

        let pair = (self.left, self.right);
        self.right += 1;
        Some(pair)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateMode {
    Exhaustive,
    Sampled { sample_size: usize, seed: u64 },
}

impl CandidateMode {
    pub fn from_config(sample_size: Option<usize>, seed: Option<u64>) -> Self {
        match sample_size {
            Some(sample_size) => Self::Sampled {
                sample_size,
                seed: seed.unwrap_or_else(rand::random),
            },
            None => Self::Exhaustive,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exhaustive => "exhaustive",
            Self::Sampled { .. } => "sampled",
        }
    }

    pub fn seed(self) -> Option<u64> {
        match self {
            Self::Exhaustive => None,
            Self::Sampled { seed, .. } => Some(seed),
        }
    }

    pub fn candidate_count(self, record_count: usize) -> u64 {
        let total = total_pairs(record_count);
        match self {
            Self::Exhaustive => total,
            Self::Sampled { sample_size, .. } => total.min(sample_size as u64),
        }
    }
}

// Multi-pass acceptance sampling without replacement. Each pass walks the
// combination stream accepting unseen pairs with probability
// `still_needed / still_unaccepted`, so the rate shrinks pass over pass.
// The distribution is only approximately uniform; the accepted set is fully
// determined by `(seed, count, sample_size)`.
pub fn sample_pairs(count: usize, sample_size: usize, seed: u64) -> Vec<(usize, usize)> {
    sample_pairs_with_passes(count, sample_size, seed).0
}

fn sample_pairs_with_passes(
    count: usize,
    sample_size: usize,
    seed: u64,
) -> (Vec<(usize, usize)>, usize) {
    let total = total_pairs(count);
    if sample_size as u64 >= total {
        return (PairCombinations::new(count).collect(), 0);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut accepted = HashSet::<(usize, usize)>::with_capacity(sample_size);
    let mut pass = 0usize;

    while accepted.len() < sample_size {
        let needed = sample_size - accepted.len();
        let unaccepted = total - accepted.len() as u64;
        let probability = needed as f64 / unaccepted as f64;
        pass += 1;

        for pair in PairCombinations::new(count) {
            if accepted.len() == sample_size {
                break;
            }
            if accepted.contains(&pair) {
                continue;
            }
            if rng.random::<f64>() < probability {
                accepted.insert(pair);
            }
        }

        debug!(
            pass,
            accepted = accepted.len(),
            sample_size,
            probability,
            "sampling pass completed"
        );
    }

    let mut pairs = accepted.into_iter().collect::<Vec<(usize, usize)>>();
    pairs.sort_unstable();
    (pairs, pass)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_enumerate_upper_triangle_in_order() {
        let pairs = PairCombinations::new(4).collect::<Vec<(usize, usize)>>();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(pairs.len() as u64, total_pairs(4));
    }

    #[test]
    fn combinations_of_fewer_than_two_records_are_empty() {
        assert_eq!(PairCombinations::new(0).count(), 0);
        assert_eq!(PairCombinations::new(1).count(), 0);
        assert_eq!(total_pairs(0), 0);
        assert_eq!(total_pairs(1), 0);
    }

    #[test]
    fn sampling_is_reproducible_for_a_fixed_seed() {
        let first = sample_pairs(1000, 50, 42);
        let second = sample_pairs(1000, 50, 42);
        assert_eq!(first.len(), 50);
        assert_eq!(first, second);
    }

    #[test]
    fn sampled_pairs_are_distinct_and_in_range() {
        let pairs = sample_pairs(200, 500, 7);
        assert_eq!(pairs.len(), 500);
        let unique = pairs.iter().copied().collect::<HashSet<(usize, usize)>>();
        assert_eq!(unique.len(), 500);
        assert!(pairs.iter().all(|(left, right)| left < right && *right < 200));
    }

    #[test]
    fn different_seeds_usually_pick_different_pairs() {
        assert_ne!(sample_pairs(1000, 50, 42), sample_pairs(1000, 50, 43));
    }

    #[test]
    fn oversized_sample_returns_every_pair() {
        assert_eq!(sample_pairs(5, 100, 1).len(), 10);
        assert_eq!(sample_pairs_with_passes(5, 100, 1).1, 0);
    }

    #[test]
    fn dense_samples_take_extra_passes_and_stay_exact() {
        let mut max_passes = 0;
        for seed in 0..32 {
            let (pairs, passes) = sample_pairs_with_passes(20, 185, seed);
            assert_eq!(pairs.len(), 185);
            let unique = pairs.iter().copied().collect::<HashSet<(usize, usize)>>();
            assert_eq!(unique.len(), 185);
            assert!(pairs.iter().all(|(left, right)| left < right && *right < 20));
            assert_eq!(pairs, sample_pairs(20, 185, seed));
            max_passes = max_passes.max(passes);
        }
        assert!(max_passes > 1);
    }

    #[test]
    fn candidate_mode_reports_expected_candidate_count() {
        assert_eq!(CandidateMode::Exhaustive.candidate_count(10), 45);
        let sampled = CandidateMode::from_config(Some(20), Some(3));
        assert_eq!(sampled, CandidateMode::Sampled { sample_size: 20, seed: 3 });
        assert_eq!(sampled.candidate_count(10), 20);
        assert_eq!(sampled.candidate_count(4), 6);
    }
}
