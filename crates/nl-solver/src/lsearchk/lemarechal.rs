//! Lemarechal's bracketing line-search.

use super::{common_config, CommonParams, Lsearchk, LsearchResult, LsearchStep, Phi, STPMAX};
use crate::state::SolverState;
use nl_core::{Bounds, Configurable, Parameter, Real};
use nl_function::Function;
use nl_tensor::Vector;

/// Bracketing search accepting Wolfe points, with the interval end points
/// updated from the Armijo test.
pub struct LsearchkLemarechal {
    config: Configurable,
}

impl LsearchkLemarechal {
    /// Create with the default `τ₁ = 9` expansion factor.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearchk::lemarechal::tau1", 9.0, Bounds::open(1.0, 100.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }
}

impl Default for LsearchkLemarechal {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearchk for LsearchkLemarechal {
    fn id(&self) -> &str {
        "lemarechal"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&self, function: &dyn Function, state0: &SolverState, descent: &Vector, t0: Real) -> LsearchResult {
        let params = CommonParams::from_config(&self.config);
        let tau1 = self.config.float("lsearchk::lemarechal::tau1").expect("registered parameter");

        let mut phi = Phi::new(function, state0, descent);
        let origin = LsearchStep { t: 0.0, phi: phi.f0, dphi: phi.dg0 };

        let mut left = origin;
        let mut right = origin;
        let mut right_updated = false;

        let mut step = phi.eval(t0);
        for _ in 1..params.max_iterations {
            let (tmin, tmax);
            if step.has_armijo(phi.f0, phi.dg0, params.c1) {
                if step.has_wolfe(phi.dg0, params.c2) {
                    return phi.into_result(true, step.t);
                }
                left = step;
                if !right_updated {
                    tmin = left.t.max(right.t) + 2.0 * (left.t - right.t).abs();
                    tmax = left.t.max(right.t) + tau1 * (left.t - right.t).abs();
                } else {
                    tmin = left.t.min(right.t);
                    tmax = left.t.max(right.t);
                }
            } else {
                right = step;
                right_updated = true;
                tmin = left.t.min(right.t);
                tmax = left.t.max(right.t);
            }

            let next = super::interpolate(&left, &right, params.interpolation).clamp(tmin, tmax);
            if !next.is_finite() || next >= STPMAX || (next - step.t).abs() < Real::EPSILON * step.t {
                break;
            }
            step = phi.eval(next);
        }
        let t = step.t;
        phi.into_result(false, t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::Sphere;

    #[test]
    fn wolfe_point_on_a_quadratic() {
        let function = Sphere::new(3);
        let state0 = SolverState::new(&function, &Vector::from_slice(&[1.0, 2.0, -2.0]));
        let descent = -state0.gx().clone();

        let refiner = LsearchkLemarechal::new();
        let result = refiner.get(&function, &state0, &descent, 0.01);
        assert!(result.ok);

        let dg0 = descent.dot(state0.gx());
        let (c1, c2) = refiner.config().float_pair("lsearchk::tolerance").unwrap();
        assert!(result.fx <= state0.fx() + c1 * result.t * dg0);
        assert!(result.gx.dot(&descent) >= c2 * dg0);
    }
}
