//! The optimal subgradient algorithm (OSGA).

use crate::solver::{base_config, warn_constrained, Logger, Solver};
use crate::state::{NonsmoothState, SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result, EPSILON0};
use nl_function::Function;
use nl_tensor::Vector;

/// OSGA: a fast universal method maintaining the best value seen and a
/// linear lower-bound model of the objective.
///
/// The auxiliary problem `E(γ_b, h) = sup_z −(γ_b + hᵀz)/Q(z)` with the
/// quadratic prox `Q(z) = Q₀ + ½‖z − z₀‖²` has a closed-form solution; its
/// value `η` bounds the optimality gap and drives both the stopping test
/// and the step-size adaptation: `α` grows by `exp(κ'(R−1))` or shrinks by
/// `exp(−κ)` depending on the ratio `R` of observed to predicted decrease.
pub struct SolverOsga {
    config: Configurable,
}

impl SolverOsga {
    /// Create with the published default constants.
    pub fn new() -> Self {
        let mut config = base_config();
        config
            .register(
                Parameter::float("solver::osga::delta", 0.9, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::osga::alpha_max", 1e+6, Bounds::open(0.0, 1e+12))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float_pair("solver::osga::kappas", (0.5, 0.5), Bounds::open(0.0, 10.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for SolverOsga {
    fn default() -> Self {
        Self::new()
    }
}

const Q0: Real = 0.5;

/// Closed-form solution of the auxiliary problem: the error factor `e` and
/// the maximizer `u = z₀ − h/e`.
fn solve_auxiliary(gamma_b: Real, h: &Vector, z0: &Vector) -> (Real, Vector) {
    let gamma_bar = -(gamma_b + h.dot(z0));
    let e = (gamma_bar + (gamma_bar * gamma_bar + 2.0 * Q0 * h.norm_squared()).sqrt()) / (2.0 * Q0);
    if e > EPSILON0 {
        (e, z0 - &(h / e))
    } else {
        (0.0, z0.clone())
    }
}

impl Solver for SolverOsga {
    fn id(&self) -> &str {
        "osga"
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
        ensure!(x0.size() == function.size(), "osga: x0 must be {}-dimensional", function.size());
        warn_constrained("osga", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let patience = self.config.size("solver::patience")?;
        let delta = self.config.float("solver::osga::delta")?;
        let alpha_max = self.config.float("solver::osga::alpha_max")?;
        let (kappa_prime, kappa) = self.config.float_pair("solver::osga::kappas")?;

        let mut tracked = NonsmoothState::new(SolverState::new(function, x0), patience);
        let z0 = x0.clone();

        // linear lower bound f(z) >= gamma + h.z from convexity at x0
        let mut h = tracked.state().gx().clone();
        let mut gamma = tracked.state().fx() - h.dot(x0);
        let (mut eta, mut u) = solve_auxiliary(gamma - tracked.state().fx(), &h, &z0);

        let mut alpha = alpha_max.min(1.0);
        let mut gx = Vector::zeros(function.size());

        while function.evals() < max_evals {
            if eta <= epsilon * tracked.state().fx().abs().max(1.0) {
                tracked.state_mut().finish(Status::Converged);
                break;
            }

            let xb = tracked.state().x().clone();
            let x = &xb + &(alpha * &(&u - &xb));
            let fx = function.vgrad(&x, &mut gx);

            let h_hat = &h + &(alpha * &(&gx - &h));
            let gamma_hat = gamma + alpha * (fx - gx.dot(&x) - gamma);
            tracked.update_if_better(&x, &gx, fx);

            // an extra trial at the maximizer of the updated model
            let (_, u_mid) = solve_auxiliary(gamma_hat - tracked.state().fx(), &h_hat, &z0);
            let xb_mid = tracked.state().x().clone();
            let x_prime = &xb_mid + &(alpha * &(&u_mid - &xb_mid));
            let fx_prime = function.vgrad(&x_prime, &mut gx);
            tracked.update_if_better(&x_prime, &gx, fx_prime);

            let (eta_hat, u_hat) = solve_auxiliary(gamma_hat - tracked.state().fx(), &h_hat, &z0);

            // parameter schedule on the observed/predicted decrease ratio
            let ratio = (eta - eta_hat) / (delta * alpha * eta);
            alpha = if ratio < 1.0 {
                alpha * (-kappa).exp()
            } else {
                (alpha * (kappa_prime * (ratio - 1.0)).exp()).min(alpha_max)
            };
            if eta_hat < eta {
                h = h_hat;
                gamma = gamma_hat;
                eta = eta_hat;
                u = u_hat;
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
    use nl_function::functions::{ChainedLq, MaxQ, Sphere};
    use nl_function::Function as _;

    #[test]
    fn smooth_quadratic() {
        let solver = SolverOsga::new();
        let function = Sphere::new(4);
        let state = solver
            .minimize(&function, &Vector::constant(4, 2.0), &mut Logger::none())
            .unwrap();
        assert!(state.status().is_terminal());
        assert!(state.fx() < 1e-4, "f = {}", state.fx());
    }

    #[test]
    fn nonsmooth_convex_gap() {
        let mut solver = SolverOsga::new();
        solver.config_mut().set_int("solver::max_evals", 100_000).unwrap();
        for function in [Box::new(MaxQ::new(4)) as Box<dyn Function>, Box::new(ChainedLq::new(4))] {
            let state = solver
                .minimize(function.as_ref(), &Vector::constant(4, 1.5), &mut Logger::none())
                .unwrap();
            let fbest = function.optimum().fx.unwrap();
            assert!(
                state.fx() - fbest <= 1e-3 * fbest.abs().max(1.0),
                "{}: gap = {}",
                function.name(),
                state.fx() - fbest
            );
        }
    }
}
