//! Gradient sampling for nonsmooth nonconvex minimization.

use crate::interior::SolverIpm;
use crate::solver::{base_config, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, make_rng, Bounds, Configurable, Parameter, Real, Result};
use nl_function::{Function, QuadraticProgram};
use nl_tensor::{Matrix, Vector};
use rand::Rng as _;
use rand_distr::StandardNormal;

/// Gradient sampling: estimate the minimum-norm element of the sampled
/// subdifferential from `m ≥ n+1` ball perturbations and descend along its
/// negative; the sampling radius shrinks when the line search stalls.
pub struct SolverGs {
    config: Configurable,
}

impl SolverGs {
    /// Create with the default sampling plan.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::integer("solver::gs::multiplier", 2, Bounds::closed(1, 16))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::gs::radius", 0.1, Bounds::open(0.0, 1e+3))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::gs::theta", 0.5, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::integer("solver::gs::seed", 42, Bounds::closed(0, 1_000_000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverGs {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum-norm convex combination of the sampled gradients: a small QP on
/// the simplex solved by the interior-point method.
fn min_norm_combination(gradients: &Matrix) -> Result<Vector> {
    let m = gradients.rows();

    let mut gram = gradients * &gradients.transpose();
    for i in 0..m {
        gram[(i, i)] += 1e-12;
    }

    let program = QuadraticProgram::new(gram, Vector::zeros(m))?
        .with_equality(Matrix::from_fn(1, m, |_, _| 1.0), Vector::from_slice(&[1.0]))?
        .with_nonnegative();

    let mut ipm = SolverIpm::new();
    ipm.config_mut().set_float("solver::epsilon", 1e-10)?;
    let weights = ipm.solve_quadratic(&program, &mut Logger::none())?;
    Ok(gradients.tr_mul_vec(&weights.x().positive_part()))
}

impl Solver for SolverGs {
    fn id(&self) -> &str {
        "gs"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Solver> {
        Box::new(Self { config: self.config.clone() })
    }

    fn minimize(&self, function: &dyn Function, x0: &Vector, logger: &mut Logger) -> Result<SolverState> {
        let n = function.size();
        ensure!(x0.size() == n, "gs: x0 must be {n}-dimensional");
        warn_constrained("gs", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let samples = self.config.size("solver::gs::multiplier")? * (n + 1);
        let mut radius = self.config.float("solver::gs::radius")?;
        let theta = self.config.float("solver::gs::theta")?;
        let seed = self.config.int("solver::gs::seed")? as u64;

        let mut rng = make_rng(seed);
        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);
        let mut x = x0.clone();
        let mut fx = tracked.state().fx();
        let mut gx = tracked.state().gx().clone();

        while function.evals() < max_evals {
            // the current gradient plus m sampled gradients from the ball
            let mut gradients = Matrix::zeros(samples + 1, n);
            gradients.set_row(0, &gx);
            let mut sample_gx = Vector::zeros(n);
            for row in 1..=samples {
                let direction = Vector::from_fn(n, |_| rng.sample(StandardNormal));
                let scale = radius * rng.gen_range(0.0f64..1.0).powf(1.0 / n as Real)
                    / direction.norm().max(nl_core::EPSILON0);
                let point = &x + &(scale * &direction);
                function.vgrad(&point, &mut sample_gx);
                gradients.set_row(row, &sample_gx);
            }

            let descent = -min_norm_combination(&gradients)?;
            let dnorm = descent.norm();

            if dnorm <= epsilon && radius <= epsilon {
                tracked.state_mut().finish(Status::Converged);
                break;
            }
            if dnorm <= epsilon {
                radius *= theta;
                continue;
            }

            // Armijo backtracking along the stabilized direction
            let mut t = 1.0;
            let mut moved = false;
            for _ in 0..30 {
                let trial = &x + &(t * &descent);
                let trial_fx = function.value(&trial);
                if trial_fx <= fx - 1e-4 * t * dnorm * dnorm {
                    fx = function.vgrad(&trial, &mut gx);
                    x = trial;
                    moved = true;
                    break;
                }
                t *= 0.5;
            }
            if moved {
                tracked.update_if_better(&x, &gx, fx);
            } else {
                radius *= theta;
            }

            tracked.state_mut().set_calls(function);
            tracked.state_mut().next_iteration();
            if tracked.converged(epsilon) {
                tracked.state_mut().finish(Status::Converged);
                break;
            }
            if !logger.call(tracked.state()) {
                tracked.state_mut().finish(Status::Stopped);
                break;
            }
        }
        let mut state = tracked.into_state();
        state.finish(Status::MaxIters);
        state.set_calls(function);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{ChainedLq, MaxQ};
    use nl_function::Function as _;

    #[test]
    fn min_norm_combination_of_opposed_gradients_vanishes() {
        // the subdifferential hull of {+1, -1} contains 0
        let gradients = Matrix::from_row_slice(2, 1, &[1.0, -1.0]);
        let combination = min_norm_combination(&gradients).unwrap();
        assert!(combination.lp_norm_inf() < 1e-6);
    }

    #[test]
    fn descends_on_nonsmooth_objectives() {
        let mut solver = SolverGs::new();
        solver.config_mut().set_int("solver::max_evals", 50_000).unwrap();
        let function = MaxQ::new(3);
        let x0 = Vector::constant(3, 1.0);
        let state = solver.minimize(&function, &x0, &mut Logger::none()).unwrap();
        assert!(state.fx() < 1e-2, "f = {}", state.fx());
    }

    #[test]
    fn reproducible_runs_for_a_fixed_seed() {
        let solver = SolverGs::new();
        let function1 = ChainedLq::new(3);
        let function2 = ChainedLq::new(3);
        let x0 = Vector::zeros(3);
        let state1 = solver.minimize(&function1, &x0, &mut Logger::none()).unwrap();
        let state2 = solver.minimize(&function2, &x0, &mut Logger::none()).unwrap();
        assert_eq!(state1.fx(), state2.fx());
        assert_eq!(state1.x().as_slice(), state2.x().as_slice());
    }
}
