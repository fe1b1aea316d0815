//! Gradient descent with line-search.

use crate::solver::{
    base_config, done_gradient_test, warn_constrained, warn_nonsmooth, Logger, LsearchDriver, Solver,
};
use crate::state::{SolverState, Status};
use nl_core::{ensure, Configurable, Result};
use nl_function::Function;
use nl_tensor::Vector;

/// Steepest descent: `d = −g` refined by the configured line-search.
pub struct SolverGd {
    config: Configurable,
}

impl SolverGd {
    /// Create with the default quadratic initializer and More-Thuente
    /// refiner.
    pub fn new() -> Self {
        let mut config = base_config();
        crate::solver::with_lsearch(&mut config, 1e-1, 9e-1, "quadratic", "morethuente");
        Self { config }
    }
}

impl Default for SolverGd {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverGd {
    fn id(&self) -> &str {
        "gd"
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
        ensure!(x0.size() == function.size(), "gd: x0 must be {}-dimensional", function.size());
        warn_nonsmooth("gd", function);
        warn_constrained("gd", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;

        let mut lsearch = LsearchDriver::from_config(&self.config)?;
        let mut state = SolverState::new(function, x0);
        if state.gradient_test() < epsilon {
            state.finish(Status::Converged);
            state.set_calls(function);
            return Ok(state);
        }

        while function.evals() < max_evals {
            let descent = -state.gx();
            let iter_ok = lsearch.get(function, &mut state, &descent);
            if done_gradient_test(&mut state, function, epsilon, iter_ok, logger) {
                break;
            }
        }
        state.finish(Status::MaxIters);
        state.set_calls(function);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{Sphere, Trid};

    #[test]
    fn converges_on_quadratics() {
        let solver = SolverGd::new();
        let function = Sphere::new(5);
        let state = solver
            .minimize(&function, &Vector::constant(5, 3.0), &mut Logger::none())
            .unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!(state.x().lp_norm_inf() < 1e-6);
    }

    #[test]
    fn cancellation_stops_with_best_state() {
        let solver = SolverGd::new();
        let function = Trid::new(4);
        let mut cancel = |_: &SolverState| false;
        let mut logger = Logger::on(&mut cancel);
        let state = solver.minimize(&function, &Vector::zeros(4), &mut logger).unwrap();
        assert_eq!(state.status(), Status::Stopped);
        assert!(state.is_valid());
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let solver = SolverGd::new();
        let function = Sphere::new(3);
        assert!(solver.minimize(&function, &Vector::zeros(2), &mut Logger::none()).is_err());
    }
}
