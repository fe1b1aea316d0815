//! Limited-memory BFGS.

use crate::solver::{
    base_config, done_gradient_test, warn_constrained, warn_nonsmooth, Logger, LsearchDriver, Solver,
};
use crate::state::{SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Result, EPSILON1};
use nl_function::Function;
use nl_tensor::Vector;
use std::collections::VecDeque;

/// L-BFGS: the two-loop recursion over a bounded history of `(s, y)`
/// pairs, with the scaled initial Hessian `γ = sᵀy / yᵀy`.
pub struct SolverLbfgs {
    config: Configurable,
}

impl SolverLbfgs {
    /// Create with the default history of 6 pairs.
    pub fn new() -> Self {
        let mut config = base_config();
        crate::solver::with_lsearch(&mut config, 1e-4, 9e-1, "quadratic", "morethuente");
        config
            .register(
                Parameter::integer("solver::lbfgs::history", 6, Bounds::closed(1, 1000))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverLbfgs {
    fn default() -> Self {
        Self::new()
    }
}

fn two_loop(gx: &Vector, pairs: &VecDeque<(Vector, Vector)>) -> Vector {
    let mut q = gx.clone();
    let mut alphas = Vec::with_capacity(pairs.len());

    for (s, y) in pairs.iter().rev() {
        let rho = 1.0 / s.dot(y);
        let alpha = rho * s.dot(&q);
        q -= &(alpha * y);
        alphas.push(alpha);
    }

    if let Some((s, y)) = pairs.back() {
        q *= s.dot(y) / y.dot(y);
    }

    for ((s, y), alpha) in pairs.iter().zip(alphas.into_iter().rev()) {
        let rho = 1.0 / s.dot(y);
        let beta = rho * y.dot(&q);
        q += &((alpha - beta) * s);
    }
    -q
}

impl Solver for SolverLbfgs {
    fn id(&self) -> &str {
        "lbfgs"
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
        ensure!(x0.size() == function.size(), "lbfgs: x0 must be {}-dimensional", function.size());
        warn_nonsmooth("lbfgs", function);
        warn_constrained("lbfgs", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let history = self.config.size("solver::lbfgs::history")?;

        let mut lsearch = LsearchDriver::from_config(&self.config)?;
        let mut state = SolverState::new(function, x0);
        if state.gradient_test() < epsilon {
            state.finish(Status::Converged);
            state.set_calls(function);
            return Ok(state);
        }

        let mut pairs: VecDeque<(Vector, Vector)> = VecDeque::with_capacity(history);

        while function.evals() < max_evals {
            let prev_x = state.x().clone();
            let prev_g = state.gx().clone();

            let descent = two_loop(state.gx(), &pairs);
            let iter_ok = lsearch.get(function, &mut state, &descent);
            if done_gradient_test(&mut state, function, epsilon, iter_ok, logger) {
                break;
            }

            let s = state.x() - &prev_x;
            let y = state.gx() - &prev_g;
            // reject pairs with too little curvature, they break the
            // positive-definiteness of the implicit Hessian approximation
            if s.dot(&y) > EPSILON1 * s.norm() * y.norm() {
                if pairs.len() == history {
                    pairs.pop_front();
                }
                pairs.push_back((s, y));
            }
        }
        state.finish(Status::MaxIters);
        state.set_calls(function);
        Ok(state)
    }
}
