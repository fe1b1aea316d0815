//! Nonlinear conjugate gradient descent.
//!
//! The `β` coefficient is computed per family (HS, FR, PR+, CD, DY, LS,
//! hybrids, Hager-Zhang, Dai-Liao) and the direction restarts to `−g` on
//! loss of conjugacy, after `n` iterations, or on a non-descent direction.

use crate::solver::{
    base_config, done_gradient_test, warn_constrained, warn_nonsmooth, Logger, LsearchDriver, Solver,
};
use crate::state::{SolverState, Status};
use nl_core::{ensure, Bounds, Configurable, Parameter, Real, Result};
use nl_function::Function;
use nl_tensor::Vector;

const VARIANTS: [&str; 14] =
    ["hs", "fr", "prp", "pr+", "cd", "dy", "ls", "dycd", "dyhs", "frpr", "hz", "n", "dl", "dl+"];

/// Nonlinear conjugate gradient with selectable update family.
pub struct SolverCgd {
    config: Configurable,
}

impl SolverCgd {
    /// Create with the default PR+ update.
    pub fn new() -> Self {
        let mut config = base_config();
        crate::solver::with_lsearch(&mut config, 1e-4, 1e-1, "quadratic", "morethuente");
        config
            .register(
                Parameter::enumeration("solver::cgd::variant", "pr+", &VARIANTS)
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::cgd::eta", 0.1, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("solver::cgd::tau", 0.1, Bounds::open(0.0, 10.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }

    /// Create with an explicit update family.
    pub fn with_variant(variant: &str) -> Result<Self> {
        let mut solver = Self::new();
        solver.config.set_enum("solver::cgd::variant", variant)?;
        Ok(solver)
    }
}

impl Default for SolverCgd {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
fn make_beta(
    variant: &str,
    g: &Vector,
    g0: &Vector,
    d0: &Vector,
    s: &Vector,
    eta: Real,
    tau: Real,
) -> Real {
    let y = g - g0;
    let dy = d0.dot(&y);
    let dg0 = d0.dot(g0);

    match variant {
        "hs" => g.dot(&y) / dy,
        "fr" => g.norm_squared() / g0.norm_squared(),
        "prp" => g.dot(&y) / g0.norm_squared(),
        "pr+" => (g.dot(&y) / g0.norm_squared()).max(0.0),
        "cd" => -g.norm_squared() / dg0,
        "dy" => g.norm_squared() / dy,
        "ls" => -g.dot(&y) / dg0,
        "dycd" => g.norm_squared() / dy.max(-dg0),
        "dyhs" => (g.norm_squared() / dy).min(g.dot(&y) / dy).max(0.0),
        "frpr" => {
            let fr = g.norm_squared() / g0.norm_squared();
            let pr = g.dot(&y) / g0.norm_squared();
            if pr < -fr {
                -fr
            } else if pr.abs() <= fr {
                pr
            } else {
                fr
            }
        }
        "n" => {
            let scaled = &y - &((2.0 * y.norm_squared() / dy) * d0);
            scaled.dot(g) / dy
        }
        "hz" => {
            // Hager-Zhang with the eta-truncation that guarantees descent
            let scaled = &y - &((2.0 * y.norm_squared() / dy) * d0);
            let beta = scaled.dot(g) / dy;
            let floor = -1.0 / (d0.norm() * eta.min(g0.norm()));
            beta.max(floor)
        }
        "dl" => (g.dot(&y) - tau * g.dot(s)) / dy,
        "dl+" => (g.dot(&y) / dy).max(0.0) - tau * g.dot(s) / dy,
        _ => 0.0,
    }
}

impl Solver for SolverCgd {
    fn id(&self) -> &str {
        "cgd"
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
        ensure!(x0.size() == function.size(), "cgd: x0 must be {}-dimensional", function.size());
        warn_nonsmooth("cgd", function);
        warn_constrained("cgd", function);

        let epsilon = self.config.float("solver::epsilon")?;
        let max_evals = self.config.int("solver::max_evals")? as u64;
        let variant = self.config.enumeration("solver::cgd::variant")?.to_string();
        let eta = self.config.float("solver::cgd::eta")?;
        let tau = self.config.float("solver::cgd::tau")?;

        let mut lsearch = LsearchDriver::from_config(&self.config)?;
        let mut state = SolverState::new(function, x0);
        if state.gradient_test() < epsilon {
            state.finish(Status::Converged);
            state.set_calls(function);
            return Ok(state);
        }

        let n = function.size();
        let mut descent = -state.gx();
        let mut since_restart = 0usize;

        while function.evals() < max_evals {
            let prev_x = state.x().clone();
            let prev_g = state.gx().clone();
            let prev_d = descent.clone();

            let iter_ok = lsearch.get(function, &mut state, &descent);
            if done_gradient_test(&mut state, function, epsilon, iter_ok, logger) {
                break;
            }

            since_restart += 1;
            let s = state.x() - &prev_x;
            let beta = make_beta(&variant, state.gx(), &prev_g, &prev_d, &s, eta, tau);
            descent = &(-state.gx()) + &(beta * &prev_d);

            // restart on loss of conjugacy or after a full cycle
            let gnorm = state.gx().norm();
            let dnorm = descent.norm();
            let orthogonality = descent.dot(&(-state.gx())) / (dnorm * gnorm);
            if !beta.is_finite() || since_restart >= n || !(orthogonality >= eta) {
                descent = -state.gx();
                since_restart = 0;
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
    use nl_function::functions::{Rosenbrock, Sphere, Trid};

    #[test]
    fn all_variants_solve_quadratics() {
        for variant in VARIANTS {
            let solver = SolverCgd::with_variant(variant).unwrap();
            let function = Sphere::new(6);
            let state = solver
                .minimize(&function, &Vector::constant(6, 2.0), &mut Logger::none())
                .unwrap();
            assert_eq!(state.status(), Status::Converged, "variant = {variant}");
            assert!(state.x().lp_norm_inf() < 1e-6, "variant = {variant}");
        }
    }

    #[test]
    fn pr_plus_handles_rosenbrock() {
        let solver = SolverCgd::new();
        let function = Rosenbrock::new(2);
        let state = solver
            .minimize(&function, &Vector::from_slice(&[-1.2, 1.0]), &mut Logger::none())
            .unwrap();
        assert_eq!(state.status(), Status::Converged);
        assert!((state.x() - &Vector::constant(2, 1.0)).lp_norm_inf() < 1e-5);
    }

    #[test]
    fn trid_ill_conditioning() {
        let solver = SolverCgd::with_variant("hz").unwrap();
        let function = Trid::new(8);
        let state = solver.minimize(&function, &Vector::zeros(8), &mut Logger::none()).unwrap();
        assert_eq!(state.status(), Status::Converged);
        let optimum = nl_function::Function::optimum(&function);
        assert!((state.fx() - optimum.fx.unwrap()).abs() < 1e-6);
    }
}
