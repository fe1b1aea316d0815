//! Linear models trained by empirical risk minimization.
//!
//! The ordinary / lasso / ridge / elastic-net variants share one criterion
//! `1/(2N) Σ ℓ(w·xᵢ+b, yᵢ) + α₁‖w‖₁ + ½α₂‖w‖²` and differ only in which
//! regularization strengths are tuned. With the squared loss the
//! L1-regularized fit is reformulated as a linearly-constrained quadratic
//! program (auxiliary `z ≥ |w|`) and solved exactly by the interior-point
//! method; every other combination goes through the configured solver.

pub mod function;

pub use function::ErmFunction;

use crate::dataset::Dataset;
use crate::loss::{losses, Loss};
use crate::scaling::{FeatureScaler, Scaling};
use crate::splitter::{splitters, Splitter as _};
use crate::tuner::{tuners, ParamSpace, Tuner as _, TunerStep};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_solver::{solvers, Logger, SolverIpm};
use nl_solver::Solver as _;
use nl_function::QuadraticProgram;
use nl_tensor::{Matrix, Vector};
use tracing::debug;

/// Which regularization strengths are tuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearVariant {
    /// No regularization (`α₁ = α₂ = 0`).
    Ordinary,
    /// L1 only (`α₂ = 0`).
    Lasso,
    /// L2 only (`α₁ = 0`).
    Ridge,
    /// Both L1 and L2.
    ElasticNet,
}

/// A linear model fitted by cross-validated empirical risk minimization.
pub struct LinearModel {
    config: Configurable,
    variant: LinearVariant,
}

impl LinearModel {
    fn new(variant: LinearVariant) -> Self {
        let mut config = Configurable::new();
        config
            .register(
                Parameter::enumeration("model::scaling", "standard", &["none", "mean", "minmax", "standard"])
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("model::loss", "mse", &losses().ids())
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("model::solver", "lbfgs", &["gd", "lbfgs", "cgd", "osga", "rqb", "fpba1", "fpba2"])
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("model::splitter", "k-fold", &["k-fold", "random"])
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::enumeration("model::tuner", "local-search", &["local-search", "surrogate"])
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("model::folds", 5, Bounds::closed(2, 100))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("model::seed", 42, Bounds::closed(0, 1_000_000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config, variant }
    }

    /// Ordinary least-risk fit.
    pub fn ordinary() -> Self {
        Self::new(LinearVariant::Ordinary)
    }

    /// L1-regularized fit (sparse solutions, feature selection).
    pub fn lasso() -> Self {
        Self::new(LinearVariant::Lasso)
    }

    /// L2-regularized fit (small coefficients).
    pub fn ridge() -> Self {
        Self::new(LinearVariant::Ridge)
    }

    /// Combined L1 + L2 fit.
    pub fn elastic_net() -> Self {
        Self::new(LinearVariant::ElasticNet)
    }

    /// The registered parameters.
    pub fn config(&self) -> &Configurable {
        &self.config
    }

    /// Mutable access to the registered parameters.
    pub fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn param_spaces(&self) -> Result<Vec<ParamSpace>> {
        Ok(match self.variant {
            LinearVariant::Ordinary => vec![],
            LinearVariant::Lasso | LinearVariant::Ridge => vec![ParamSpace::log10_range(-7, 1)?],
            LinearVariant::ElasticNet => {
                vec![ParamSpace::log10_range(-7, 1)?, ParamSpace::log10_range(-7, 1)?]
            }
        })
    }

    fn alphas(&self, values: &Vector) -> (Real, Real) {
        match self.variant {
            LinearVariant::Ordinary => (0.0, 0.0),
            LinearVariant::Lasso => (values[0], 0.0),
            LinearVariant::Ridge => (0.0, values[0]),
            LinearVariant::ElasticNet => (values[0], values[1]),
        }
    }

    /// Fit on the given training samples: scale on training statistics,
    /// tune the regularization by cross-validation, refit on the full
    /// training set.
    pub fn fit(&self, dataset: &Dataset, samples: &[usize]) -> Result<FittedLinear> {
        ensure!(!samples.is_empty(), "linear model: no training samples");

        let scaling = Scaling::from_id(self.config.enumeration("model::scaling")?);
        let loss = losses().get(self.config.enumeration("model::loss")?)?;
        let solver_id = self.config.enumeration("model::solver")?;
        let seed = self.config.int("model::seed")?;
        let folds = self.config.int("model::folds")?;

        let scaler = FeatureScaler::fit(scaling, dataset.inputs(), samples);
        let scaled = scaler.transform(dataset.inputs());

        let spaces = self.param_spaces()?;
        let mut tuning = Vec::new();
        let (alpha1, alpha2) = if spaces.is_empty() {
            (0.0, 0.0)
        } else {
            let mut splitter = splitters().get(self.config.enumeration("model::splitter")?)?;
            splitter.config_mut().set_int("splitter::seed", seed)?;
            splitter.config_mut().set_int("splitter::folds", folds)?;
            let splits = splitter.split(samples)?;

            let tuner = tuners().get(self.config.enumeration("model::tuner")?)?;
            let mut callback = |values: &Vector| -> Result<Real> {
                let (alpha1, alpha2) = self.alphas(values);
                let mut score = 0.0;
                for (train, valid) in &splits {
                    let (weights, bias) =
                        solve_erm(&scaled, dataset.targets(), train, loss.as_ref(), alpha1, alpha2, solver_id)?;
                    score += mean_loss(&scaled, dataset.targets(), valid, loss.as_ref(), &weights, bias);
                }
                Ok(score / splits.len() as Real)
            };
            tuning = tuner.optimize(&spaces, &mut callback)?;
            ensure!(!tuning.is_empty(), "linear model: tuning produced no steps");
            self.alphas(&tuning[0].values)
        };
        debug!(alpha1, alpha2, "linear model: refitting with the tuned strengths");

        let (weights_scaled, bias_scaled) =
            solve_erm(&scaled, dataset.targets(), samples, loss.as_ref(), alpha1, alpha2, solver_id)?;
        let train_error = mean_error(&scaled, dataset.targets(), samples, loss.as_ref(), &weights_scaled, bias_scaled);

        let (weights, bias) = scaler.unscale_model(&weights_scaled, bias_scaled);
        Ok(FittedLinear { weights, bias, alpha1, alpha2, tuning, train_error })
    }
}

/// The outcome of a linear fit, mapped back to the raw feature space.
#[derive(Debug, Clone)]
pub struct FittedLinear {
    /// Weights in the raw (unscaled) feature space.
    pub weights: Vector,
    /// Bias in the raw feature space.
    pub bias: Real,
    /// The selected L1 strength.
    pub alpha1: Real,
    /// The selected L2 strength.
    pub alpha2: Real,
    /// The cross-validation history (best step first).
    pub tuning: Vec<TunerStep>,
    /// Mean training error of the refitted model.
    pub train_error: Real,
}

impl FittedLinear {
    /// Predict the target of one raw feature vector.
    pub fn predict(&self, input: &Vector) -> Real {
        self.weights.dot(input) + self.bias
    }
}

fn gather(inputs: &Matrix, targets: &Vector, samples: &[usize]) -> (Matrix, Vector) {
    let features = inputs.cols();
    let mut sub_inputs = Matrix::zeros(samples.len(), features);
    let mut sub_targets = Vector::zeros(samples.len());
    for (row, &sample) in samples.iter().enumerate() {
        sub_inputs.set_row(row, &inputs.row(sample));
        sub_targets[row] = targets[sample];
    }
    (sub_inputs, sub_targets)
}

fn mean_loss(
    inputs: &Matrix,
    targets: &Vector,
    samples: &[usize],
    loss: &dyn Loss,
    weights: &Vector,
    bias: Real,
) -> Real {
    let mut total = 0.0;
    for &sample in samples {
        total += loss.value(weights.dot(&inputs.row(sample)) + bias, targets[sample]);
    }
    total / samples.len().max(1) as Real
}

fn mean_error(
    inputs: &Matrix,
    targets: &Vector,
    samples: &[usize],
    loss: &dyn Loss,
    weights: &Vector,
    bias: Real,
) -> Real {
    let mut total = 0.0;
    for &sample in samples {
        total += loss.error(weights.dot(&inputs.row(sample)) + bias, targets[sample]);
    }
    total / samples.len().max(1) as Real
}

/// Solve one ERM instance, returning `(weights, bias)` in the scaled space.
fn solve_erm(
    inputs: &Matrix,
    targets: &Vector,
    samples: &[usize],
    loss: &dyn Loss,
    alpha1: Real,
    alpha2: Real,
    solver_id: &str,
) -> Result<(Vector, Real)> {
    let (sub_inputs, sub_targets) = gather(inputs, targets, samples);

    if loss.id() == "mse" && alpha1 > 0.0 {
        return solve_erm_qp(&sub_inputs, &sub_targets, alpha1, alpha2);
    }

    let function = ErmFunction::new(sub_inputs, sub_targets, loss.clone_box(), alpha1, alpha2);
    let features = function.features();

    let solver = solvers().get(solver_id)?;
    let state = solver.minimize(&function, &Vector::zeros(features + 1), &mut Logger::none())?;
    let weights = state.x().segment(0, features);
    let bias = state.x()[features];
    Ok((weights, bias))
}

/// The constrained reformulation of the L1 path for the squared loss:
/// variables `[w | b | z]` with `−z ≤ w ≤ z`, solved by the interior-point
/// method for exactly sparse solutions.
fn solve_erm_qp(inputs: &Matrix, targets: &Vector, alpha1: Real, alpha2: Real) -> Result<(Vector, Real)> {
    let samples = inputs.rows();
    let features = inputs.cols();
    let n = 2 * features + 1;
    let norm = 1.0 / samples as Real;

    let mut p = Matrix::zeros(n, n);
    let gram = &inputs.transpose() * inputs;
    for i in 0..features {
        for j in 0..features {
            p[(i, j)] = norm * gram[(i, j)];
        }
        p[(i, i)] += alpha2;
    }
    let ones = Vector::constant(samples, 1.0);
    let column_sums = inputs.tr_mul_vec(&ones);
    for i in 0..features {
        p[(i, features)] = norm * column_sums[i];
        p[(features, i)] = norm * column_sums[i];
    }
    p[(features, features)] = 1.0;

    let mut q = Vector::zeros(n);
    let target_sums = inputs.tr_mul_vec(targets);
    for i in 0..features {
        q[i] = -norm * target_sums[i];
    }
    q[features] = -norm * targets.sum();
    for i in 0..features {
        q[features + 1 + i] = alpha1;
    }

    // w − z ≤ 0 and −w − z ≤ 0
    let mut g = Matrix::zeros(2 * features, n);
    let h = Vector::zeros(2 * features);
    for i in 0..features {
        g[(i, i)] = 1.0;
        g[(i, features + 1 + i)] = -1.0;
        g[(features + i, i)] = -1.0;
        g[(features + i, features + 1 + i)] = -1.0;
    }

    let program = QuadraticProgram::new(p, q)?.with_inequality(g, h)?;
    let ipm = SolverIpm::new();
    let state = ipm.solve_quadratic(&program, &mut Logger::none())?;

    let weights = state.x().segment(0, features);
    let bias = state.x()[features];
    Ok((weights, bias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::make_synthetic_linear;

    #[test]
    fn ordinary_recovers_a_noise_free_model() {
        let problem = make_synthetic_linear(120, 5, 1, 0.0, 17);
        let model = LinearModel::ordinary();
        let fitted = model.fit(&problem.dataset, &problem.dataset.all_samples()).unwrap();

        assert!((&fitted.weights - &problem.weights).lp_norm_inf() < 1e-4);
        assert!((fitted.bias - problem.bias).abs() < 1e-4);
        assert!(fitted.train_error < 1e-4);
    }

    #[test]
    fn lasso_selects_the_relevant_features() {
        // features 0, 3, 6, 9 carry signal; the rest are noise columns
        let problem = make_synthetic_linear(200, 12, 3, 0.0, 42);
        let model = LinearModel::lasso();
        let fitted = model.fit(&problem.dataset, &problem.dataset.all_samples()).unwrap();

        for feature in 0..12 {
            if feature % 3 == 0 {
                assert!(
                    fitted.weights[feature].abs() >= 1e-3,
                    "relevant weight {feature} vanished: {}",
                    fitted.weights[feature]
                );
            } else {
                assert!(
                    fitted.weights[feature].abs() <= 1e-6,
                    "irrelevant weight {feature} survived: {}",
                    fitted.weights[feature]
                );
            }
        }
        assert!((fitted.bias - problem.bias).abs() < 1e-6, "bias error = {}", (fitted.bias - problem.bias).abs());
    }

    #[test]
    fn ridge_shrinks_but_keeps_all_features() {
        let problem = make_synthetic_linear(150, 6, 1, 0.01, 7);
        let model = LinearModel::ridge();
        let fitted = model.fit(&problem.dataset, &problem.dataset.all_samples()).unwrap();

        assert!(!fitted.tuning.is_empty());
        assert!((&fitted.weights - &problem.weights).lp_norm_inf() < 0.2);
    }

    #[test]
    fn elastic_net_tunes_both_strengths() {
        let problem = make_synthetic_linear(100, 6, 2, 0.0, 3);
        let mut model = LinearModel::elastic_net();
        model.config_mut().set_int("model::folds", 3).unwrap();
        let fitted = model.fit(&problem.dataset, &problem.dataset.all_samples()).unwrap();

        assert_eq!(fitted.tuning[0].values.size(), 2);
        let sample = problem.dataset.input(4);
        assert!((fitted.predict(&sample) - problem.dataset.target(4)).abs() < 0.1);
    }
}
