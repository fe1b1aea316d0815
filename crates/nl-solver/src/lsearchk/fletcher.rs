//! Bracketing + zoom line-search producing strong-Wolfe points.
//!
//! The bracketing phase expands the trial step until the minimizer is
//! bracketed, then the zoom phase shrinks the interval of uncertainty with
//! interpolated trials. The `τ₁/τ₂/τ₃` tie-breaks bound the expansion and
//! keep every zoom trial strictly inside the interval.

use super::{common_config, CommonParams, Lsearchk, LsearchResult, LsearchStep, Phi, STPMAX};
use crate::state::SolverState;
use nl_core::{Bounds, Configurable, Parameter, Real};
use nl_function::Function;
use nl_tensor::Vector;

/// Fletcher's bracketing + sectioning strong-Wolfe line-search.
pub struct LsearchkFletcher {
    config: Configurable,
}

impl LsearchkFletcher {
    /// Create with the default `τ₁ = 9, τ₂ = 0.1, τ₃ = 0.5` tie-breaks.
    pub fn new() -> Self {
        let mut config = common_config();
        config
            .register(
                Parameter::float("lsearchk::fletcher::tau1", 9.0, Bounds::open(1.0, 100.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearchk::fletcher::tau2", 0.1, Bounds::open(0.0, 0.5))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        config
            .register(
                Parameter::float("lsearchk::fletcher::tau3", 0.5, Bounds::open(0.0, 1.0))
                    .expect("static parameter defaults are valid"),
            )
            .expect("unique parameter name");
        Self { config }
    }

    fn zoom(
        &self,
        phi: &mut Phi<'_>,
        params: &CommonParams,
        mut lo: LsearchStep,
        mut hi: LsearchStep,
        tau2: Real,
        tau3: Real,
    ) -> (bool, Real) {
        for _ in 0..params.max_iterations {
            let width = hi.t - lo.t;
            if width.abs() < Real::EPSILON * lo.t.abs().max(1.0) {
                return (false, lo.t);
            }

            // interpolated trial, kept strictly inside the section
            let tmin = lo.t + tau2 * width;
            let tmax = hi.t - tau3 * width;
            let trial = super::interpolate(&lo, &hi, params.interpolation);
            let trial = if tmin < tmax { trial.clamp(tmin, tmax) } else { trial.clamp(tmax, tmin) };

            let step = phi.eval(trial);
            if !step.has_armijo(phi.f0, phi.dg0, params.c1) || step.phi >= lo.phi {
                hi = step;
            } else {
                if step.has_strong_wolfe(phi.dg0, params.c2) {
                    return (true, step.t);
                }
                if step.dphi * width >= 0.0 {
                    hi = lo;
                }
                lo = step;
            }
        }
        (false, lo.t)
    }
}

impl Default for LsearchkFletcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Lsearchk for LsearchkFletcher {
    fn id(&self) -> &str {
        "fletcher"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&self, function: &dyn Function, state0: &SolverState, descent: &Vector, t0: Real) -> LsearchResult {
        let params = CommonParams::from_config(&self.config);
        let tau1 = self.config.float("lsearchk::fletcher::tau1").expect("registered parameter");
        let tau2 = self.config.float("lsearchk::fletcher::tau2").expect("registered parameter");
        let tau3 = self.config.float("lsearchk::fletcher::tau3").expect("registered parameter");

        let mut phi = Phi::new(function, state0, descent);
        let mut prev = LsearchStep { t: 0.0, phi: phi.f0, dphi: phi.dg0 };
        let mut step = phi.eval(t0);

        for iteration in 0..params.max_iterations {
            if !step.has_armijo(phi.f0, phi.dg0, params.c1) || (iteration > 0 && step.phi >= prev.phi) {
                let (ok, t) = self.zoom(&mut phi, &params, prev, step, tau2, tau3);
                return phi.into_result(ok, t);
            }
            if step.has_strong_wolfe(phi.dg0, params.c2) {
                return phi.into_result(true, step.t);
            }
            if step.dphi >= 0.0 {
                let (ok, t) = self.zoom(&mut phi, &params, step, prev, tau2, tau3);
                return phi.into_result(ok, t);
            }

            // expand the bracket
            let span = step.t - prev.t;
            let next = (step.t + 2.0 * span).min(step.t + tau1 * span).min(STPMAX);
            prev = step;
            step = phi.eval(next);
            if step.t >= STPMAX {
                break;
            }
        }
        let t = step.t;
        phi.into_result(false, t)
    }
}
