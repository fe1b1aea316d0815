//! Line-search Newton method.

use crate::solver::{
    base_config, done_gradient_test, warn_constrained, warn_nonsmooth, Logger, LsearchDriver, Solver,
};
use crate::state::{SolverState, Status};
use nl_core::{ensure, Configurable, Result};
use nl_function::Function;
use nl_tensor::{Matrix, Vector};

/// Newton's method: `H d = −g` solved by LDLᵀ, falling back to steepest
/// descent when the Hessian is not positive definite.
pub struct SolverNewton {
    config: Configurable,
}

impl SolverNewton {
    /// Create with the default line-search.
    pub fn new() -> Self {
        let mut config = base_config();
        crate::solver::with_lsearch(&mut config, 1e-1, 9e-1, "constant", "morethuente");
        Self { config }
    }
}

impl Default for SolverNewton {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SolverNewton {
    fn id(&self) -> &str {
        "newton"
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
        ensure!(x0.size() == function.size(), "newton: x0 must be {}-dimensional", function.size());
        warn_nonsmooth("newton", function);
        warn_constrained("newton", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;

        let n = function.size();
        let mut lsearch = LsearchDriver::from_config(&self.config)?;
        let mut state = SolverState::new(function, x0);
        if state.gradient_test() < epsilon {
            state.finish(Status::Converged);
            state.set_calls(function);
            return Ok(state);
        }

        let mut hessian = Matrix::zeros(n, n);
        while function.evals() < max_evals {
            function.evaluate(state.x(), None, Some(&mut hessian));

            let descent = match hessian.ldlt() {
                Some(ldlt) if ldlt.is_positive(0.0) => match ldlt.solve(&-state.gx()) {
                    Some(direction) => direction,
                    None => -state.gx(),
                },
                _ => -state.gx(),
            };

            let iter_ok = lsearch.get(function, &mut state, &descent);
            if done_gradient_test(&mut state, function, epsilon, iter_ok, logger) {
                break;
            }
        }
        state.set_hessian(hessian);
        state.finish(Status::MaxIters);
        state.set_calls(function);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{Rosenbrock, Sphere, Trid};

    #[test]
    fn one_step_on_quadratics() {
        let solver = SolverNewton::new();
        let function = Sphere::new(6);
        let state = solver
            .minimize(&function, &Vector::constant(6, 5.0), &mut Logger::none())
            .unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!(state.iterations() <= 2, "iterations = {}", state.iterations());
        assert!(state.x().lp_norm_inf() < 1e-10);
    }

    #[test]
    fn quadratic_valley() {
        let solver = SolverNewton::new();
        let function = Trid::new(5);
        let state = solver.minimize(&function, &Vector::zeros(5), &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged);
        let optimum = nl_function::Function::optimum(&function).x.unwrap();
        assert!((state.x() - &optimum).lp_norm_inf() < 1e-7);
    }

    #[test]
    fn falls_back_on_indefinite_hessians() {
        // Rosenbrock's Hessian is indefinite away from the valley floor
        let solver = SolverNewton::new();
        let function = Rosenbrock::new(2);
        let state = solver
            .minimize(&function, &Vector::from_slice(&[-1.2, 1.0]), &mut Logger::none())
            .unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!((state.x() - &Vector::constant(2, 1.0)).lp_norm_inf() < 1e-6);
    }
}
