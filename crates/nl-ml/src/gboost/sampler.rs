//! Sample selection for fitting weak learners.

use nl_core::{make_rng, rng, Real, Rng};
use nl_tensor::Vector;

/// How the boosting round selects its fitting samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsample {
    /// Use all training samples.
    Off,
    /// Sample a ratio without replacement.
    Subsample,
    /// Sample a ratio with replacement.
    Bootstrap,
    /// Bootstrap weighted by the per-sample loss values.
    WeightedBootstrap,
}

impl Subsample {
    /// Resolve a subsampling scheme from its id.
    pub fn from_id(id: &str) -> Self {
        match id {
            "subsample" => Subsample::Subsample,
            "bootstrap" => Subsample::Bootstrap,
            "wei-loss-bootstrap" => Subsample::WeightedBootstrap,
            _ => Subsample::Off,
        }
    }
}

/// A seeded per-round sample selector.
pub struct Sampler {
    samples: Vec<usize>,
    kind: Subsample,
    ratio: Real,
    rng: Rng,
}

impl Sampler {
    /// Create a selector over the training samples.
    pub fn new(samples: &[usize], kind: Subsample, ratio: Real, seed: u64) -> Self {
        assert!(ratio > 0.0 && ratio <= 1.0);
        Self { samples: samples.to_vec(), kind, ratio, rng: make_rng(seed) }
    }

    /// Select the samples for the next boosting round; `losses` holds the
    /// current per-sample loss values (indexed by dataset sample).
    pub fn sample(&mut self, losses: &Vector) -> Vec<usize> {
        let count = ((self.ratio * self.samples.len() as Real) as usize).max(1);
        match self.kind {
            Subsample::Off => self.samples.clone(),
            Subsample::Subsample => rng::sample_without_replacement(&self.samples, count, &mut self.rng),
            Subsample::Bootstrap => rng::sample_with_replacement(&self.samples, count, &mut self.rng),
            Subsample::WeightedBootstrap => {
                let weights: Vec<Real> = self.samples.iter().map(|&sample| losses[sample]).collect();
                rng::sample_weighted_with_replacement(&self.samples, &weights, count, &mut self.rng)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_returns_everything() {
        let samples: Vec<usize> = (0..10).collect();
        let mut sampler = Sampler::new(&samples, Subsample::Off, 0.5, 1);
        assert_eq!(sampler.sample(&Vector::zeros(10)), samples);
    }

    #[test]
    fn subsample_respects_the_ratio() {
        let samples: Vec<usize> = (0..100).collect();
        let mut sampler = Sampler::new(&samples, Subsample::Subsample, 0.3, 1);
        let picked = sampler.sample(&Vector::zeros(100));
        assert_eq!(picked.len(), 30);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn weighted_bootstrap_prefers_lossy_samples() {
        let samples: Vec<usize> = (0..4).collect();
        let mut losses = Vector::zeros(4);
        losses[2] = 1.0;
        let mut sampler = Sampler::new(&samples, Subsample::WeightedBootstrap, 1.0, 1);
        let picked = sampler.sample(&losses);
        assert!(picked.iter().all(|&sample| sample == 2));
    }

    #[test]
    fn seeding_is_reproducible() {
        let samples: Vec<usize> = (0..50).collect();
        let losses = Vector::zeros(50);
        let mut first = Sampler::new(&samples, Subsample::Bootstrap, 0.5, 9);
        let mut second = Sampler::new(&samples, Subsample::Bootstrap, 0.5, 9);
        assert_eq!(first.sample(&losses), second.sample(&losses));
    }
}
