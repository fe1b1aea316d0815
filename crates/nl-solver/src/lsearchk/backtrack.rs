//! Backtracking line-search stopping at the Armijo condition.

use super::{common_config, CommonParams, Lsearchk, LsearchResult, LsearchStep, Phi, STPMIN};
use crate::state::SolverState;
use nl_core::{Configurable, Real};
use nl_function::Function;
use nl_tensor::Vector;

/// Shrink the trial step until sufficient decrease holds.
pub struct LsearchkBacktrack {
    config: Configurable,
}

impl LsearchkBacktrack {
    /// Create with the default parameters.
    pub fn new() -> Self {
        Self { config: common_config() }
    }
}

impl Default for LsearchkBacktrack {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearchk for LsearchkBacktrack {
    fn id(&self) -> &str {
        "backtrack"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&self, function: &dyn Function, state0: &SolverState, descent: &Vector, t0: Real) -> LsearchResult {
        let params = CommonParams::from_config(&self.config);
        let mut phi = Phi::new(function, state0, descent);
        let origin = LsearchStep { t: 0.0, phi: phi.f0, dphi: phi.dg0 };

        let mut step = phi.eval(t0);
        for _ in 0..params.max_iterations {
            if step.has_armijo(phi.f0, phi.dg0, params.c1) {
                return phi.into_result(true, step.t);
            }

            // interpolated trial, safeguarded inside the current interval
            let next = super::interpolate(&origin, &step, params.interpolation)
                .clamp(0.1 * step.t, 0.9 * step.t);
            if !next.is_finite() || next < STPMIN {
                break;
            }
            step = phi.eval(next);
        }
        let t = step.t;
        phi.into_result(false, t)
    }
}
