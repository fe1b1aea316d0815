//! The sub-gradient method.

use crate::solver::{base_config, done_value_test, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Result, EPSILON0};
use nl_function::Function;
use nl_tensor::Vector;

/// The classical sub-gradient method with the decreasing step
/// `x ← x − g / ((k+1)^p ‖g‖₂)`, `p ∈ [½, 1]`.
///
/// Slow, but a useful baseline on nonsmooth convex problems; stops when no
/// significant decrease is seen over the recent iterations.
pub struct SolverSgm {
    config: Configurable,
}

impl SolverSgm {
    /// Create with the default power `p = 0.75`.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::float("solver::sgm::power", 0.75, Bounds::closed(0.5, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverSgm {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverSgm {
    fn id(&self) -> &str {
        "sgm"
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
        ensure!(x0.size() == function.size(), "sgm: x0 must be {}-dimensional", function.size());
        warn_constrained("sgm", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let power = self.config.float("solver::sgm::power")?;

        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);
        let mut x = tracked.state().x().clone();
        let mut gx = tracked.state().gx().clone();

        let mut iteration = 0usize;
        while function.evals() < max_evals {
            if gx.lp_norm_inf() < EPSILON0 {
                tracked.state_mut().finish(Status::Converged);
                break;
            }

            let lambda = 1.0 / ((iteration + 1) as f64).powf(power);
            x -= &((lambda / gx.norm()) * &gx);
            let fx = function.vgrad(&x, &mut gx);
            tracked.update_if_better(&x, &gx, fx);

            iteration += 1;
            if done_value_test(&mut tracked, function, epsilon, logger) {
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
    fn maxq_decreases_to_zero() {
        let solver = SolverSgm::new();
        let function = MaxQ::new(3);
        let state = solver
            .minimize(&function, &Vector::constant(3, 1.0), &mut Logger::none())
            .unwrap();
        assert!(state.status().is_terminal());
        assert!(state.fx() < function.value(&Vector::constant(3, 1.0)));
    }

    #[test]
    fn chained_lq_reaches_the_known_optimum_range() {
        let mut solver = SolverSgm::new();
        solver.config_mut().set_int("solver::max_evals", 200_000).unwrap();
        let function = ChainedLq::new(3);
        let state = solver.minimize(&function, &Vector::zeros(3), &mut Logger::none()).unwrap();

        let fbest = function.optimum().fx.unwrap();
        assert!(state.fx() - fbest < 1e-2, "gap = {}", state.fx() - fbest);
    }
}
