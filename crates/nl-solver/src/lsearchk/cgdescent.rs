//! Hager-Zhang (CG-DESCENT) line-search.
//!
//! Accepts either exact Wolfe points or approximate Wolfe points
//! `(2c₁−1)φ'(0) ≥ φ'(t) ≥ c₂φ'(0)` with the value staying below
//! `φ(0) + ε_k`. The interval update follows the U1-U3 rules with the
//! `θ`-bisection inner loop, secant trials and `ρ`-expansion bracketing.

use super::{common_config, CommonParams, Lsearchk, LsearchResult, LsearchStep, Phi, STPMAX};
use crate::state::SolverState;
use nl_core::{Bounds, Configurable, Parameter, Real};
use nl_function::Function;
use nl_tensor::Vector;

/// The CG-DESCENT approximate-Wolfe line-search.
pub struct LsearchkCgDescent {
    config: Configurable,
}

impl LsearchkCgDescent {
    /// Create with the published default constants.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearchk::cgdescent::epsilon", 1e-6, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearchk::cgdescent::theta", 0.5, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearchk::cgdescent::gamma", 0.66, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearchk::cgdescent::rho", 5.0, Bounds::open(1.0, 100.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for LsearchkCgDescent {
    fn default() -> Self {
        Self::new()
    }
}

fn accepted(step: &LsearchStep, f0: Real, dg0: Real, c1: Real, c2: Real, epsilon_k: Real) -> bool {
    (step.has_armijo(f0, dg0, c1) && step.has_wolfe(dg0, c2))
        || (step.has_approx_wolfe(dg0, c1, c2) && step.phi <= f0 + epsilon_k)
}

/// The U3 inner loop: shrink `[a, c]` by `θ`-bisection until an end point
/// with admissible value or non-negative slope appears.
fn theta_bisection(
    phi: &mut Phi<'_>,
    mut a: LsearchStep,
    mut b: LsearchStep,
    theta: Real,
    epsilon_k: Real,
    budget: usize,
) -> (LsearchStep, LsearchStep) {
    for _ in 0..budget {
        let d = phi.eval((1.0 - theta) * a.t + theta * b.t);
        if d.dphi >= 0.0 {
            return (a, d);
        }
        if d.phi <= phi.f0 + epsilon_k {
            a = d;
        } else {
            b = d;
        }
        if (b.t - a.t).abs() < Real::EPSILON * b.t.abs().max(1.0) {
            break;
        }
    }
    (a, b)
}

/// The U1-U3 interval update with a trial `c`.
fn update(
    phi: &mut Phi<'_>,
    a: LsearchStep,
    b: LsearchStep,
    c: LsearchStep,
    theta: Real,
    epsilon_k: Real,
    budget: usize,
) -> (LsearchStep, LsearchStep) {
    if c.t <= a.t || c.t >= b.t {
        return (a, b);
    }
    if c.dphi >= 0.0 {
        return (a, c);
    }
    if c.phi <= phi.f0 + epsilon_k {
        return (c, b);
    }
    theta_bisection(phi, a, c, theta, epsilon_k, budget)
}

fn secant(a: &LsearchStep, b: &LsearchStep) -> Real {
    let denominator = b.dphi - a.dphi;
    if denominator.abs() > 0.0 {
        (a.t * b.dphi - b.t * a.dphi) / denominator
    } else {
        0.5 * (a.t + b.t)
    }
}

impl Lsearchk for LsearchkCgDescent {
    fn id(&self) -> &str {
        "cgdescent"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&self, function: &dyn Function, state0: &SolverState, descent: &Vector, t0: Real) -> LsearchResult {
        let params = CommonParams::from_config(&self.config);
        let epsilon = self.config.float("lsearchk::cgdescent::epsilon").expect("registered parameter");
        let theta = self.config.float("lsearchk::cgdescent::theta").expect("registered parameter");
        let gamma = self.config.float("lsearchk::cgdescent::gamma").expect("registered parameter");
        let rho = self.config.float("lsearchk::cgdescent::rho").expect("registered parameter");

        let mut phi = Phi::new(function, state0, descent);
        let epsilon_k = epsilon * phi.f0.abs();
        let origin = LsearchStep { t: 0.0, phi: phi.f0, dphi: phi.dg0 };

        let mut c = phi.eval(t0);
        if accepted(&c, phi.f0, phi.dg0, params.c1, params.c2, epsilon_k) {
            return phi.into_result(true, c.t);
        }

        // bracketing: expand by rho until the slope turns or the value rises
        let mut a = origin;
        let mut b;
        loop {
            if c.dphi >= 0.0 {
                b = c;
                break;
            }
            if c.phi > phi.f0 + epsilon_k {
                let (na, nb) = theta_bisection(&mut phi, origin, c, theta, epsilon_k, params.max_iterations);
                a = na;
                b = nb;
                break;
            }
            a = c;
            if c.t * rho >= STPMAX {
                b = c;
                break;
            }
            c = phi.eval(c.t * rho);
            if accepted(&c, phi.f0, phi.dg0, params.c1, params.c2, epsilon_k) {
                return phi.into_result(true, c.t);
            }
        }

        // secant refinement of the bracket
        for _ in 0..params.max_iterations {
            let width = b.t - a.t;
            if width.abs() < Real::EPSILON * b.t.abs().max(1.0) {
                break;
            }

            let trial = secant(&a, &b);
            let trial = if trial > a.t && trial < b.t { trial } else { 0.5 * (a.t + b.t) };
            let c = phi.eval(trial);
            if accepted(&c, phi.f0, phi.dg0, params.c1, params.c2, epsilon_k) {
                return phi.into_result(true, c.t);
            }

            let (na, nb) = update(&mut phi, a, b, c, theta, epsilon_k, params.max_iterations);
            a = na;
            b = nb;

            // force bisection when the interval shrinks too slowly
            if b.t - a.t > gamma * width {
                let c = phi.eval(0.5 * (a.t + b.t));
                if accepted(&c, phi.f0, phi.dg0, params.c1, params.c2, epsilon_k) {
                    return phi.into_result(true, c.t);
                }
                let (na, nb) = update(&mut phi, a, b, c, theta, epsilon_k, params.max_iterations);
                a = na;
                b = nb;
            }
        }
        let t = a.t.max(super::STPMIN);
        phi.into_result(false, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{Rosenbrock, Sphere};

    #[test]
    fn approx_wolfe_accepts_near_minimum_trials() {
        let function = Sphere::new(2);
        let state0 = SolverState::new(&function, &Vector::from_slice(&[1.0, -1.0]));
        let descent = -state0.gx().clone();
        let refiner = LsearchkCgDescent::new();

        // the exact minimizer of the quadratic along -g is t = 1
        let result = refiner.get(&function, &state0, &descent, 1.0 + 1e-12);
        assert!(result.ok);
        assert!(result.fx <= state0.fx());
    }

    #[test]
    fn expands_tiny_trials() {
        let function = Rosenbrock::new(2);
        let state0 = SolverState::new(&function, &Vector::from_slice(&[-1.2, 1.0]));
        let descent = -state0.gx().clone();
        let refiner = LsearchkCgDescent::new();

        let result = refiner.get(&function, &state0, &descent, 1e-10);
        assert!(result.ok);
        assert!(result.fx < state0.fx());
    }
}
