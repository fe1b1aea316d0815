//! Gradient boosting over weak learners.
//!
//! Functional gradient rounds: fit the configured weak learner to the
//! pseudo-residuals of the current predictions, line-search the learner
//! scale, and stop early on the validation error. Subsampling draws the
//! fitting samples per round from a seeded selector.

pub mod early_stopping;
pub mod sampler;
pub mod wlearner;

pub use early_stopping::EarlyStopping;
pub use sampler::{Sampler, Subsample};
pub use wlearner::{wlearners, WLearner};

use crate::dataset::Dataset;
use crate::loss::{losses, Loss};
use crate::splitter::{splitters, Splitter as _};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_tensor::Vector;
use tracing::debug;

/// A gradient-boosting model over one weak-learner family.
pub struct GBoostModel {
    config: Configurable,
}

impl GBoostModel {
    /// Create with the default stump learner and squared loss.
    pub fn new() -> Self {
        let mut config = Configurable::new();
        config
            .register(
                Parameter::enumeration("model::loss", "mse", &losses().ids())
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("gboost::wlearner", "stump", &wlearners().ids())
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("gboost::rounds", 100, Bounds::closed(1, 10_000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("gboost::patience", 10, Bounds::closed(1, 1000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("gboost::epsilon", 1e-8, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("gboost::shrinkage", 1.0, Bounds::open_closed(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration(
                    "gboost::subsample",
                    "off",
                    &["off", "subsample", "bootstrap", "wei-loss-bootstrap"],
                )
                .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("gboost::subsample_ratio", 1.0, Bounds::open_closed(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("gboost::seed", 42, Bounds::closed(0, 1_000_000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("gboost::valid_per", 20, Bounds::closed(0, 50))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }

    /// The registered parameters.
    pub fn config(&self) -> &Configurable {
        &self.config
    }

    /// Mutable access to the registered parameters.
    pub fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    /// Fit on the given training samples with early stopping on a held-out
    /// validation share.
    pub fn fit(&self, dataset: &Dataset, samples: &[usize]) -> Result<FittedGBoost> {
        ensure!(samples.len() >= 4, "gboost: at least 4 training samples are needed");

        let loss = losses().get(self.config.enumeration("model::loss")?)?;
        let learner_id = self.config.enumeration("gboost::wlearner")?.to_string();
        let rounds = self.config.size("gboost::rounds")?;
        let patience = self.config.size("gboost::patience")?;
        let epsilon = self.config.float("gboost::epsilon")?;
        let shrinkage = self.config.float("gboost::shrinkage")?;
        let subsample = Subsample::from_id(self.config.enumeration("gboost::subsample")?);
        let ratio = self.config.float("gboost::subsample_ratio")?;
        let seed = self.config.int("gboost::seed")? as u64;
        let valid_per = self.config.size("gboost::valid_per")?;

        // hold out a validation share for early stopping
        let (train, valid) = if valid_per > 0 && samples.len() >= 10 {
            let mut splitter = splitters().get("random")?;
            splitter.config_mut().set_int("splitter::seed", seed as i64)?;
            splitter.config_mut().set_int("splitter::folds", 2)?;
            splitter
                .config_mut()
                .set_int("splitter::random::train_per", (100 - valid_per) as i64)?;
            let splits = splitter.split(samples)?;
            splits[0].clone()
        } else {
            (samples.to_vec(), Vec::new())
        };

        // the constant model minimizing the loss over the training samples
        let bias = fit_bias(dataset, &train, loss.as_ref());
        let mut predictions = Vector::constant(dataset.samples(), bias);

        let mut sampler = Sampler::new(&train, subsample, ratio, seed);
        let mut tracker = EarlyStopping::new();
        let mut learners: Vec<Box<dyn WLearner>> = Vec::new();

        for round in 1..=rounds {
            // pseudo-residuals: the negative loss gradients wrt predictions
            let mut residuals = Vector::zeros(dataset.samples());
            let mut sample_losses = Vector::zeros(dataset.samples());
            for &sample in &train {
                let (value, slope) = loss.vgrad(predictions[sample], dataset.target(sample));
                residuals[sample] = -slope;
                sample_losses[sample] = value;
            }

            let fitting_samples = sampler.sample(&sample_losses);
            let mut learner = wlearners().get(&learner_id)?;
            learner.fit(dataset, &fitting_samples, &residuals)?;

            // line-searched learner scale, then fixed shrinkage
            let corrections =
                Vector::from_fn(dataset.samples(), |sample| learner.predict(&dataset.input(sample)));
            let scale = line_search_scale(loss.as_ref(), dataset, &train, &predictions, &corrections);
            learner.scale(scale * shrinkage);

            for &sample in samples {
                predictions[sample] += scale * shrinkage * corrections[sample];
            }
            learners.push(learner);

            let train_error = mean_error(loss.as_ref(), dataset, &train, &predictions);
            let valid_error = if valid.is_empty() {
                train_error
            } else {
                mean_error(loss.as_ref(), dataset, &valid, &predictions)
            };
            debug!(round, train_error, valid_error, "gboost");

            if tracker.done(train_error, valid_error, !valid.is_empty(), round, epsilon, patience) {
                break;
            }
        }

        // keep only the optimum number of rounds
        learners.truncate(tracker.round().max(1));
        Ok(FittedGBoost { bias, learners, valid_error: tracker.value() })
    }
}

impl Default for GBoostModel {
    fn default() -> Self {
        Self::new()
    }
}

/// A fitted boosting model: a bias plus scaled weak learners.
pub struct FittedGBoost {
    /// The constant model.
    pub bias: Real,
    /// The scaled weak learners, in boosting order.
    pub learners: Vec<Box<dyn WLearner>>,
    /// The validation error at the selected round.
    pub valid_error: Real,
}

impl FittedGBoost {
    /// Number of boosting rounds kept.
    pub fn rounds(&self) -> usize {
        self.learners.len()
    }

    /// Predict the target of one feature vector.
    pub fn predict(&self, input: &Vector) -> Real {
        self.bias + self.learners.iter().map(|learner| learner.predict(input)).sum::<Real>()
    }
}

/// The constant minimizing the loss: the mean target for regression
/// losses, found by a short scalar descent otherwise.
fn fit_bias(dataset: &Dataset, samples: &[usize], loss: &dyn Loss) -> Real {
    let mut bias =
        samples.iter().map(|&sample| dataset.target(sample)).sum::<Real>() / samples.len() as Real;
    for _ in 0..50 {
        let slope: Real =
            samples.iter().map(|&sample| loss.vgrad(bias, dataset.target(sample)).1).sum();
        if slope.abs() < 1e-12 {
            break;
        }
        bias -= slope / samples.len() as Real;
    }
    bias
}

fn mean_error(loss: &dyn Loss, dataset: &Dataset, samples: &[usize], predictions: &Vector) -> Real {
    samples
        .iter()
        .map(|&sample| loss.error(predictions[sample], dataset.target(sample)))
        .sum::<Real>()
        / samples.len().max(1) as Real
}

/// Scalar line search on `ν ↦ Σ ℓ(prediction + ν·correction, target)` by
/// bisection on the derivative.
fn line_search_scale(
    loss: &dyn Loss,
    dataset: &Dataset,
    samples: &[usize],
    predictions: &Vector,
    corrections: &Vector,
) -> Real {
    let slope = |scale: Real| -> Real {
        samples
            .iter()
            .map(|&sample| {
                let output = predictions[sample] + scale * corrections[sample];
                loss.vgrad(output, dataset.target(sample)).1 * corrections[sample]
            })
            .sum()
    };

    let (mut lo, mut hi) = (0.0, 1.0);
    if slope(0.0) >= 0.0 {
        return 1.0;
    }
    // expand until the derivative turns positive
    while slope(hi) < 0.0 && hi < 64.0 {
        hi *= 2.0;
    }
    for _ in 0..40 {
        let mid = 0.5 * (lo + hi);
        if slope(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::make_synthetic_linear;
    use nl_tensor::Matrix;

    #[test]
    fn boosting_reduces_the_training_error() {
        let problem = make_synthetic_linear(120, 4, 1, 0.0, 21);
        let samples = problem.dataset.all_samples();

        let model = GBoostModel::new();
        let fitted = model.fit(&problem.dataset, &samples).unwrap();
        assert!(fitted.rounds() >= 1);

        let error: Real = samples
            .iter()
            .map(|&sample| {
                (fitted.predict(&problem.dataset.input(sample)) - problem.dataset.target(sample)).abs()
            })
            .sum::<Real>()
            / samples.len() as Real;
        assert!(error < 0.2, "mean error = {error}");
    }

    #[test]
    fn affine_learners_nail_linear_targets() {
        let problem = make_synthetic_linear(100, 1, 1, 0.0, 5);
        let samples = problem.dataset.all_samples();

        let mut model = GBoostModel::new();
        model.config_mut().set_enum("gboost::wlearner", "affine").unwrap();
        model.config_mut().set_int("gboost::valid_per", 0).unwrap();
        let fitted = model.fit(&problem.dataset, &samples).unwrap();

        let input = problem.dataset.input(7);
        let target = problem.dataset.target(7);
        assert!((fitted.predict(&input) - target).abs() < 1e-4);
    }

    #[test]
    fn early_stopping_caps_the_rounds() {
        // pure noise: validation error cannot improve for long
        let inputs = Matrix::from_fn(60, 2, |sample, feature| ((sample * 7 + feature * 3) % 11) as Real);
        let targets = Vector::from_fn(60, |sample| ((sample * 13) % 5) as Real);
        let dataset = Dataset::new(inputs, targets).unwrap();

        let mut model = GBoostModel::new();
        model.config_mut().set_int("gboost::rounds", 500).unwrap();
        model.config_mut().set_int("gboost::patience", 3).unwrap();
        let fitted = model.fit(&dataset, &dataset.all_samples()).unwrap();
        assert!(fitted.rounds() < 500);
    }

    #[test]
    fn subsampling_is_reproducible() {
        let problem = make_synthetic_linear(80, 3, 1, 0.0, 9);
        let samples = problem.dataset.all_samples();

        let mut model = GBoostModel::new();
        model.config_mut().set_enum("gboost::subsample", "subsample").unwrap();
        model.config_mut().set_float("gboost::subsample_ratio", 0.7).unwrap();

        let first = model.fit(&problem.dataset, &samples).unwrap();
        let second = model.fit(&problem.dataset, &samples).unwrap();
        let input = problem.dataset.input(11);
        assert_eq!(first.predict(&input), second.predict(&input));
    }
}
