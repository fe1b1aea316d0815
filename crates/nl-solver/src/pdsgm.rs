//! Primal-dual subgradient methods (dual averaging).

use crate::solver::{base_config, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result, EPSILON0};
use nl_function::Function;
use nl_tensor::Vector;

/// Which dual-averaging weights to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    /// Simple dual averages: unit weights.
    Sda,
    /// Weighted dual averages: subgradients normalized by their norm.
    Wda,
}

/// Nesterov's primal-dual subgradient method with the Euclidean
/// prox-function.
///
/// Accumulates (weighted) subgradients `z = Σ λᵢ gᵢ` and produces
/// `x_{k+1} = x₀ − γ z / β̂_{k+1}` with `β̂_{k+1} = β̂_k + 1/β̂_k`. The
/// `sda` variant uses unit weights, `wda` normalizes each subgradient.
/// Sensitive to the estimated distance between `x₀` and the optimum (the
/// `gamma` scale).
pub struct SolverPdsgm {
    config: Configurable,
    variant: Variant,
}

impl SolverPdsgm {
    fn new(variant: Variant) -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::float("solver::pdsgm::gamma", 1.0, Bounds::open(0.0, 1e+6))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config, variant }
    }

    /// Simple dual averages.
    pub fn sda() -> Self {
        Self::new(Variant::Sda)
    }

    /// Weighted dual averages.
    pub fn wda() -> Self {
        Self::new(Variant::Wda)
    }
}

impl Solver for SolverPdsgm {
    fn id(&self) -> &str {
        match self.variant {
            Variant::Sda => "sda",
            Variant::Wda => "wda",
        }
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn clone_box(&self) -> Box<dyn Solver> {
        Box::new(Self { config: self.config.clone(), variant: self.variant })
    }

    fn minimize(&self, function: &dyn Function, x0: &Vector, logger: &mut Logger) -> Result<SolverState> {
        ensure!(x0.size() == function.size(), "{}: x0 must be {}-dimensional", self.id(), function.size());
        warn_constrained(self.id(), function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let gamma = self.config.float("solver::pdsgm::gamma")?;

        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);

        let mut z = Vector::zeros(function.size());
        let mut beta_hat: Real = 1.0;
        let mut gx = tracked.state().gx().clone();

        while function.evals() < max_evals {
            let gnorm = gx.norm();
            if gnorm < EPSILON0 {
                tracked.state_mut().finish(Status::Converged);
                break;
            }
            let lambda = match self.variant {
                Variant::Sda => 1.0,
                Variant::Wda => 1.0 / gnorm,
            };
            z += &(lambda * &gx);
            beta_hat += 1.0 / beta_hat;

            let x = x0 - &(&z * (gamma / beta_hat));
            let fx = function.vgrad(&x, &mut gx);
            tracked.update_if_better(&x, &gx, fx);

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
    use nl_function::functions::{Kinks, MaxQ};
    use nl_function::Function as _;

    #[test]
    fn both_variants_reduce_nonsmooth_objectives() {
        for solver in [SolverPdsgm::sda(), SolverPdsgm::wda()] {
            let function = MaxQ::new(3);
            let x0 = Vector::constant(3, 1.0);
            let f0 = function.value(&x0);
            let state = solver.minimize(&function, &x0, &mut Logger::none()).unwrap();
            assert!(state.status().is_terminal(), "{}", solver.id());
            assert!(state.fx() < f0, "{}: f = {}", solver.id(), state.fx());
        }
    }

    #[test]
    fn kinks_gap() {
        let mut solver = SolverPdsgm::wda();
        solver.config_mut().set_int("solver::max_evals", 100_000).unwrap();
        let function = Kinks::new(3, 42);
        let state = solver.minimize(&function, &Vector::zeros(3), &mut Logger::none()).unwrap();
        let fbest = function.optimum().fx.unwrap();
        assert!(state.fx() - fbest <= 1e-2, "gap = {}", state.fx() - fbest);
    }
}
