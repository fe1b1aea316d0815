//! The universal fast gradient method (FGM).

use crate::solver::{base_config, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Result};
use nl_function::Function;
use nl_tensor::Vector;

/// Nesterov's universal fast gradient method.
///
/// Designed for structured composite problems, applied here to a
/// sub-differentiable function directly: the local Lipschitz estimate is
/// adapted by an inner doubling search against the smoothed descent
/// condition.
pub struct SolverFgm {
    config: Configurable,
}

impl SolverFgm {
    /// Create with the default inner search budget.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::integer("solver::fgm::lsearch_max_iterations", 20, Bounds::closed(10, 30))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverFgm {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverFgm {
    fn id(&self) -> &str {
        "fgm"
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
        ensure!(x0.size() == function.size(), "fgm: x0 must be {}-dimensional", function.size());
        warn_constrained("fgm", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let max_inner = self.config.size("solver::fgm::lsearch_max_iterations")?;

        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);

        let mut y = x0.clone();
        let mut v = x0.clone();
        let mut lipschitz =
            (tracked.state().gx().norm() / x0.norm().max(1.0)).clamp(1e-6, 1e+6);
        let mut total = 0.0;

        let mut gx = Vector::zeros(function.size());
        'outer: while function.evals() < max_evals {
            let mut accepted = None;

            let mut trial_l = lipschitz;
            for _ in 0..max_inner {
                let a = (1.0 + (1.0 + 4.0 * trial_l * total).sqrt()) / (2.0 * trial_l);
                let tau = a / (total + a);

                let x = &(tau * &v) + &((1.0 - tau) * &y);
                let fx = function.vgrad(&x, &mut gx);
                tracked.update_if_better(&x, &gx, fx);

                let v_trial = &v - &(a * &gx);
                let y_trial = &(tau * &v_trial) + &((1.0 - tau) * &y);
                let fy = function.value(&y_trial);

                let dy = &y_trial - &x;
                let bound = fx + gx.dot(&dy) + 0.5 * trial_l * dy.norm_squared() + 0.5 * epsilon * tau;
                if fy <= bound {
                    accepted = Some((a, v_trial, y_trial, fy));
                    break;
                }
                trial_l *= 2.0;
                if function.evals() >= max_evals {
                    break 'outer;
                }
            }

            let Some((a, v_next, y_next, fy)) = accepted else {
                tracked.state_mut().finish(Status::Failed);
                break;
            };

            v = v_next;
            y = y_next;
            total += a;
            lipschitz = 0.5 * trial_l;

            let fy_grad = function.vgrad(&y, &mut gx);
            debug_assert!((fy_grad - fy).abs() <= 1e-12 * fy.abs().max(1.0));
            tracked.update_if_better(&y, &gx, fy_grad);

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
