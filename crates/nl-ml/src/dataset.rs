//! In-memory datasets.
//!
//! The interface dataset loaders target: a samples-by-features matrix, one
//! scalar target per sample and a per-feature mask flagging missing values.
//! Also hosts the seeded synthetic linear generator used by the test suites.

use nl_core::{ensure, make_rng, Real, Result};
use nl_tensor::{Mask, Matrix, Vector};
use rand::Rng as _;

/// An in-memory tabular dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Matrix,
    targets: Vector,
    masks: Vec<Mask>,
}

impl Dataset {
    /// Create a dataset with all feature values present.
    pub fn new(inputs: Matrix, targets: Vector) -> Result<Self> {
        ensure!(
            inputs.rows() == targets.size(),
            "dataset: {} input rows but {} targets",
            inputs.rows(),
            targets.size()
        );
        let masks = (0..inputs.cols()).map(|_| Mask::full(inputs.rows())).collect();
        Ok(Self { inputs, targets, masks })
    }

    /// Number of samples.
    pub fn samples(&self) -> usize {
        self.inputs.rows()
    }

    /// Number of features.
    pub fn features(&self) -> usize {
        self.inputs.cols()
    }

    /// The full input matrix.
    pub fn inputs(&self) -> &Matrix {
        &self.inputs
    }

    /// The targets.
    pub fn targets(&self) -> &Vector {
        &self.targets
    }

    /// Feature vector of one sample.
    pub fn input(&self, sample: usize) -> Vector {
        self.inputs.row(sample)
    }

    /// Target of one sample.
    pub fn target(&self, sample: usize) -> Real {
        self.targets[sample]
    }

    /// Single feature value.
    pub fn value(&self, sample: usize, feature: usize) -> Real {
        self.inputs[(sample, feature)]
    }

    /// Mark a feature value as missing.
    pub fn set_missing(&mut self, sample: usize, feature: usize) {
        self.masks[feature].unset(sample);
    }

    /// Return `true` if the feature value is available for the sample.
    pub fn has_value(&self, sample: usize, feature: usize) -> bool {
        self.masks[feature].get(sample)
    }

    /// The mask of one feature column.
    pub fn mask(&self, feature: usize) -> &Mask {
        &self.masks[feature]
    }

    /// All sample indices, in order.
    pub fn all_samples(&self) -> Vec<usize> {
        (0..self.samples()).collect()
    }
}

/// A seeded synthetic linear regression problem.
///
/// Only the features with index divisible by `modulo` are correlated with
/// the targets; the remaining generating weights are exactly zero.
pub struct SyntheticLinear {
    /// The generated dataset.
    pub dataset: Dataset,
    /// The generating weights.
    pub weights: Vector,
    /// The generating bias.
    pub bias: Real,
}

/// Generate `targets = W·x + b (+ noise)` with uniform inputs in `[0, 1]`.
pub fn make_synthetic_linear(
    samples: usize,
    features: usize,
    modulo: usize,
    noise: Real,
    seed: u64,
) -> SyntheticLinear {
    assert!(modulo >= 1);
    let mut rng = make_rng(seed);

    let inputs = Matrix::from_fn(samples, features, |_, _| rng.gen_range(0.0..1.0));
    let mut weights = Vector::from_fn(features, |_| rng.gen_range(0.5..2.0));
    for feature in 0..features {
        if feature % modulo != 0 {
            weights[feature] = 0.0;
        }
    }
    let bias = rng.gen_range(-0.5..0.5);

    let targets = Vector::from_fn(samples, |sample| {
        let clean = inputs.row(sample).dot(&weights) + bias;
        if noise > 0.0 {
            clean + rng.gen_range(-noise..noise)
        } else {
            clean
        }
    });

    SyntheticLinear {
        dataset: Dataset::new(inputs, targets).expect("consistent shapes by construction"),
        weights,
        bias,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_and_access() {
        let inputs = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let targets = Vector::from_slice(&[1.0, -1.0]);
        let dataset = Dataset::new(inputs, targets).unwrap();

        assert_eq!(dataset.samples(), 2);
        assert_eq!(dataset.features(), 3);
        assert_eq!(dataset.input(1).as_slice(), &[4.0, 5.0, 6.0]);
        assert_eq!(dataset.target(1), -1.0);
        assert!(dataset.has_value(0, 0));
    }

    #[test]
    fn missing_values_are_tracked_per_feature() {
        let inputs = Matrix::zeros(4, 2);
        let dataset = Dataset::new(inputs, Vector::zeros(4));
        let mut dataset = dataset.unwrap();
        dataset.set_missing(2, 1);
        assert!(dataset.has_value(2, 0));
        assert!(!dataset.has_value(2, 1));
        assert!(dataset.mask(1).is_optional());
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        assert!(Dataset::new(Matrix::zeros(3, 2), Vector::zeros(4)).is_err());
    }

    #[test]
    fn synthetic_generator_is_reproducible_and_sparse() {
        let first = make_synthetic_linear(50, 8, 2, 0.0, 7);
        let second = make_synthetic_linear(50, 8, 2, 0.0, 7);
        assert_eq!(first.weights.as_slice(), second.weights.as_slice());
        assert_eq!(first.bias, second.bias);

        // odd features carry no signal
        for feature in (1..8).step_by(2) {
            assert_eq!(first.weights[feature], 0.0);
        }
        // noise-free targets reproduce the linear model exactly
        let sample = first.dataset.input(13);
        let expected = sample.dot(&first.weights) + first.bias;
        assert!((first.dataset.target(13) - expected).abs() < 1e-12);
    }
}
