//! Feature and target scaling.
//!
//! Statistics are computed on the training samples only and applied
//! everywhere else, so no validation information leaks into the fit.

use nl_core::Real;
use nl_tensor::{Matrix, Vector};

/// The scaling schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    /// Use the values as they are.
    None,
    /// Mean normalization: `(x − mean) / (max − min)`.
    Mean,
    /// Min-max normalization: `(x − min) / (max − min)`.
    MinMax,
    /// Standardization: `(x − mean) / stdev`.
    Standard,
}

impl Scaling {
    /// Resolve a scaling scheme from its id.
    pub fn from_id(id: &str) -> Self {
        match id {
            "mean" => Scaling::Mean,
            "minmax" => Scaling::MinMax,
            "standard" => Scaling::Standard,
            _ => Scaling::None,
        }
    }
}

/// Per-feature affine transform `(x − offset) / scale` fitted on training
/// samples.
#[derive(Debug, Clone)]
pub struct FeatureScaler {
    offsets: Vector,
    scales: Vector,
}

fn column_stats(inputs: &Matrix, samples: &[usize], feature: usize) -> (Real, Real, Real, Real) {
    let mut mean = 0.0;
    let mut min = Real::INFINITY;
    let mut max = Real::NEG_INFINITY;
    for &sample in samples {
        let value = inputs[(sample, feature)];
        mean += value;
        min = min.min(value);
        max = max.max(value);
    }
    mean /= samples.len() as Real;

    let mut variance = 0.0;
    for &sample in samples {
        let delta = inputs[(sample, feature)] - mean;
        variance += delta * delta;
    }
    let stdev = (variance / samples.len() as Real).sqrt();
    (mean, min, max, stdev)
}

fn guard(scale: Real) -> Real {
    if scale.abs() > nl_core::EPSILON0 {
        scale
    } else {
        1.0
    }
}

impl FeatureScaler {
    /// Fit the transform of every feature on the given training samples.
    pub fn fit(scaling: Scaling, inputs: &Matrix, samples: &[usize]) -> Self {
        assert!(!samples.is_empty());
        let features = inputs.cols();

        let mut offsets = Vector::zeros(features);
        let mut scales = Vector::constant(features, 1.0);
        for feature in 0..features {
            let (mean, min, max, stdev) = column_stats(inputs, samples, feature);
            match scaling {
                Scaling::None => {}
                Scaling::Mean => {
                    offsets[feature] = mean;
                    scales[feature] = guard(max - min);
                }
                Scaling::MinMax => {
                    offsets[feature] = min;
                    scales[feature] = guard(max - min);
                }
                Scaling::Standard => {
                    offsets[feature] = mean;
                    scales[feature] = guard(stdev);
                }
            }
        }
        Self { offsets, scales }
    }

    /// Transform a full input matrix.
    pub fn transform(&self, inputs: &Matrix) -> Matrix {
        Matrix::from_fn(inputs.rows(), inputs.cols(), |sample, feature| {
            (inputs[(sample, feature)] - self.offsets[feature]) / self.scales[feature]
        })
    }

    /// Transform one feature vector.
    pub fn transform_row(&self, input: &Vector) -> Vector {
        Vector::from_fn(input.size(), |feature| {
            (input[feature] - self.offsets[feature]) / self.scales[feature]
        })
    }

    /// Map weights and bias fitted in the scaled space back to the raw
    /// feature space.
    pub fn unscale_model(&self, weights: &Vector, bias: Real) -> (Vector, Real) {
        let raw_weights = weights.component_div(&self.scales);
        let raw_bias = bias - raw_weights.dot(&self.offsets);
        (raw_weights, raw_bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> Matrix {
        Matrix::from_row_slice(4, 2, &[0.0, 10.0, 2.0, 20.0, 4.0, 30.0, 6.0, 40.0])
    }

    #[test]
    fn standard_scaling_zero_mean_unit_variance() {
        let samples: Vec<usize> = (0..4).collect();
        let scaler = FeatureScaler::fit(Scaling::Standard, &inputs(), &samples);
        let scaled = scaler.transform(&inputs());

        for feature in 0..2 {
            let mean: Real = (0..4).map(|s| scaled[(s, feature)]).sum::<Real>() / 4.0;
            let var: Real = (0..4).map(|s| scaled[(s, feature)].powi(2)).sum::<Real>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn minmax_maps_to_unit_interval() {
        let samples: Vec<usize> = (0..4).collect();
        let scaler = FeatureScaler::fit(Scaling::MinMax, &inputs(), &samples);
        let scaled = scaler.transform(&inputs());
        assert_eq!(scaled[(0, 0)], 0.0);
        assert_eq!(scaled[(3, 0)], 1.0);
    }

    #[test]
    fn statistics_use_training_samples_only() {
        // fit on the first two samples only
        let scaler = FeatureScaler::fit(Scaling::MinMax, &inputs(), &[0, 1]);
        let scaled = scaler.transform(&inputs());
        // the third sample lies outside the fitted range
        assert!(scaled[(3, 0)] > 1.0);
    }

    #[test]
    fn unscale_model_round_trip() {
        let samples: Vec<usize> = (0..4).collect();
        let scaler = FeatureScaler::fit(Scaling::Standard, &inputs(), &samples);

        // a model fitted on scaled features must predict identically after
        // mapping back to raw features
        let weights_scaled = Vector::from_slice(&[1.5, -0.5]);
        let bias_scaled = 0.25;
        let (weights, bias) = scaler.unscale_model(&weights_scaled, bias_scaled);

        let raw = inputs().row(2);
        let scaled = scaler.transform_row(&raw);
        let from_scaled = weights_scaled.dot(&scaled) + bias_scaled;
        let from_raw = weights.dot(&raw) + bias;
        assert!((from_scaled - from_raw).abs() < 1e-12);
    }

    #[test]
    fn constant_features_do_not_divide_by_zero() {
        let constant = Matrix::zeros(3, 1);
        let scaler = FeatureScaler::fit(Scaling::Standard, &constant, &[0, 1, 2]);
        let scaled = scaler.transform(&constant);
        assert!(scaled[(0, 0)].is_finite());
    }
}
