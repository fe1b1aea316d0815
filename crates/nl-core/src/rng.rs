//! Seeded random number generation.
//!
//! Every component that samples owns its own Mersenne-Twister generator
//! seeded from a declared parameter; there is no process-wide generator.

use crate::Real;
use rand::seq::SliceRandom;
use rand::Rng as _;
use rand_mt::Mt19937GenRand64;

/// The pseudo-random generator used throughout the library (MT19937-64).
pub type Rng = Mt19937GenRand64;

/// Create a generator from the given seed.
pub fn make_rng(seed: u64) -> Rng {
    Mt19937GenRand64::new(seed)
}

/// Draw `count` distinct indices from `samples`, returned sorted.
pub fn sample_without_replacement(samples: &[usize], count: usize, rng: &mut Rng) -> Vec<usize> {
    let count = count.min(samples.len());
    let mut pool = samples.to_vec();
    pool.shuffle(rng);
    pool.truncate(count);
    pool.sort_unstable();
    pool
}

/// Draw `count` indices from `samples` with replacement, returned sorted.
pub fn sample_with_replacement(samples: &[usize], count: usize, rng: &mut Rng) -> Vec<usize> {
    let mut picked: Vec<usize> = (0..count)
        .map(|_| samples[rng.gen_range(0..samples.len())])
        .collect();
    picked.sort_unstable();
    picked
}

/// Draw `count` indices from `samples` with replacement, proportionally to
/// the given non-negative weights, returned sorted.
pub fn sample_weighted_with_replacement(
    samples: &[usize],
    weights: &[Real],
    count: usize,
    rng: &mut Rng,
) -> Vec<usize> {
    assert_eq!(samples.len(), weights.len());

    let total: Real = weights.iter().sum();
    if total <= 0.0 {
        return sample_with_replacement(samples, count, rng);
    }

    let mut picked = Vec::with_capacity(count);
    for _ in 0..count {
        let mut ticket = rng.gen_range(0.0..total);
        let mut chosen = samples[samples.len() - 1];
        for (index, weight) in samples.iter().zip(weights.iter()) {
            if ticket < *weight {
                chosen = *index;
                break;
            }
            ticket -= *weight;
        }
        picked.push(chosen);
    }
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_draws() {
        let mut rng1 = make_rng(42);
        let mut rng2 = make_rng(42);
        let draws1: Vec<u64> = (0..8).map(|_| rng1.gen_range(0..1000u64)).collect();
        let draws2: Vec<u64> = (0..8).map(|_| rng2.gen_range(0..1000u64)).collect();
        assert_eq!(draws1, draws2);
    }

    #[test]
    fn without_replacement_is_distinct_and_sorted() {
        let samples: Vec<usize> = (0..100).collect();
        let mut rng = make_rng(7);
        let picked = sample_without_replacement(&samples, 30, &mut rng);
        assert_eq!(picked.len(), 30);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn with_replacement_stays_in_pool() {
        let samples = vec![3usize, 5, 8];
        let mut rng = make_rng(7);
        let picked = sample_with_replacement(&samples, 10, &mut rng);
        assert_eq!(picked.len(), 10);
        assert!(picked.iter().all(|i| samples.contains(i)));
    }

    #[test]
    fn weighted_sampling_prefers_heavy_indices() {
        let samples: Vec<usize> = (0..4).collect();
        let weights = [0.0, 0.0, 0.0, 1.0];
        let mut rng = make_rng(11);
        let picked = sample_weighted_with_replacement(&samples, &weights, 20, &mut rng);
        assert!(picked.iter().all(|&i| i == 3));
    }
}
