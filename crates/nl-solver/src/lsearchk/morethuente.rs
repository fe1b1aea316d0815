//! More-Thuente line-search with guaranteed sufficient decrease.
//!
//! Ports the `dcsrch`/`dcstep` routines from MINPACK-2: a safeguarded
//! interval of uncertainty `[stx, sty]` updated from a modified function in
//! the first stage, with bracketed and unbracketed extrapolation modes.

use super::{common_config, CommonParams, Lsearchk, LsearchResult, Phi, STPMAX, STPMIN};
use crate::state::SolverState;
use nl_core::{Configurable, Real, EPSILON2};
use nl_function::Function;
use nl_tensor::Vector;

/// The More-Thuente safeguarded Wolfe line-search.
pub struct LsearchkMoreThuente {
    config: Configurable,
}

impl LsearchkMoreThuente {
    /// Create with the default parameters.
    pub fn new() -> Self {
        Self { config: common_config() }
    }
}

impl Default for LsearchkMoreThuente {
    fn default() -> Self {
        Self::new()
    }
}

struct Endpoint {
    t: Real,
    f: Real,
    d: Real,
}

/// One `dcstep` update of the interval of uncertainty.
///
/// `x`/`y` are the best and the other end point, `p` the current trial; on
/// return the interval is updated and the new trial step is produced.
#[allow(clippy::too_many_arguments)]
fn dcstep(
    x: &mut Endpoint,
    y: &mut Endpoint,
    p: &Endpoint,
    brackt: &mut bool,
    stpmin: Real,
    stpmax: Real,
) -> Real {
    let sgnd = p.d * x.d.signum();

    let stpf;
    if p.f > x.f {
        // first case: a higher function value, the minimum is bracketed
        let theta = 3.0 * (x.f - p.f) / (p.t - x.t) + x.d + p.d;
        let s = theta.abs().max(x.d.abs()).max(p.d.abs());
        let mut gamma = s * ((theta / s) * (theta / s) - (x.d / s) * (p.d / s)).max(0.0).sqrt();
        if p.t < x.t {
            gamma = -gamma;
        }
        let r = ((gamma - x.d) + theta) / (((gamma - x.d) + gamma) + p.d);
        let stpc = x.t + r * (p.t - x.t);
        let stpq = x.t + ((x.d / ((x.f - p.f) / (p.t - x.t) + x.d)) / 2.0) * (p.t - x.t);
        stpf = if (stpc - x.t).abs() < (stpq - x.t).abs() { stpc } else { stpc + (stpq - stpc) / 2.0 };
        *brackt = true;
    } else if sgnd < 0.0 {
        // second case: opposite slope signs, the minimum is bracketed
        let theta = 3.0 * (x.f - p.f) / (p.t - x.t) + x.d + p.d;
        let s = theta.abs().max(x.d.abs()).max(p.d.abs());
        let mut gamma = s * ((theta / s) * (theta / s) - (x.d / s) * (p.d / s)).max(0.0).sqrt();
        if p.t > x.t {
            gamma = -gamma;
        }
        let r = ((gamma - p.d) + theta) / (((gamma - p.d) + gamma) + x.d);
        let stpc = p.t + r * (x.t - p.t);
        let stpq = p.t + (p.d / (p.d - x.d)) * (x.t - p.t);
        stpf = if (stpc - p.t).abs() > (stpq - p.t).abs() { stpc } else { stpq };
        *brackt = true;
    } else if p.d.abs() < x.d.abs() {
        // third case: same slope sign, decreasing magnitude
        let theta = 3.0 * (x.f - p.f) / (p.t - x.t) + x.d + p.d;
        let s = theta.abs().max(x.d.abs()).max(p.d.abs());
        let mut gamma = s * ((theta / s) * (theta / s) - (x.d / s) * (p.d / s)).max(0.0).sqrt();
        if p.t > x.t {
            gamma = -gamma;
        }
        let r = ((gamma - p.d) + theta) / ((gamma + (x.d - p.d)) + gamma);
        let stpc = if r < 0.0 && gamma != 0.0 {
            p.t + r * (x.t - p.t)
        } else if p.t > x.t {
            stpmax
        } else {
            stpmin
        };
        let stpq = p.t + (p.d / (p.d - x.d)) * (x.t - p.t);
        stpf = if *brackt {
            let candidate = if (stpc - p.t).abs() < (stpq - p.t).abs() { stpc } else { stpq };
            if p.t > x.t {
                candidate.min(p.t + 0.66 * (y.t - p.t))
            } else {
                candidate.max(p.t + 0.66 * (y.t - p.t))
            }
        } else {
            let candidate = if (stpc - p.t).abs() > (stpq - p.t).abs() { stpc } else { stpq };
            candidate.clamp(stpmin, stpmax)
        };
    } else {
        // fourth case: same slope sign, not decreasing
        stpf = if *brackt {
            let theta = 3.0 * (p.f - y.f) / (y.t - p.t) + y.d + p.d;
            let s = theta.abs().max(y.d.abs()).max(p.d.abs());
            let mut gamma = s * ((theta / s) * (theta / s) - (y.d / s) * (p.d / s)).max(0.0).sqrt();
            if p.t > y.t {
                gamma = -gamma;
            }
            let r = ((gamma - p.d) + theta) / (((gamma - p.d) + gamma) + y.d);
            p.t + r * (y.t - p.t)
        } else if p.t > x.t {
            stpmax
        } else {
            stpmin
        };
    }

    // update the interval of uncertainty
    if p.f > x.f {
        *y = Endpoint { t: p.t, f: p.f, d: p.d };
    } else {
        if sgnd < 0.0 {
            *y = Endpoint { t: x.t, f: x.f, d: x.d };
        }
        *x = Endpoint { t: p.t, f: p.f, d: p.d };
    }
    stpf
}

impl Lsearchk for LsearchkMoreThuente {
    fn id(&self) -> &str {
        "morethuente"
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }

    fn get(&self, function: &dyn Function, state0: &SolverState, descent: &Vector, t0: Real) -> LsearchResult {
        let params = CommonParams::from_config(&self.config);
        let xtol = EPSILON2;
        let (xtrapl, xtrapu) = (1.1, 4.0);

        let mut phi = Phi::new(function, state0, descent);
        let finit = phi.f0;
        let ginit = phi.dg0;
        let gtest = params.c1 * ginit;

        let mut brackt = false;
        let mut stage1 = true;
        let mut width = STPMAX - STPMIN;
        let mut width1 = 2.0 * width;

        let mut x = Endpoint { t: 0.0, f: finit, d: ginit };
        let mut y = Endpoint { t: 0.0, f: finit, d: ginit };
        let mut stmin = 0.0;
        let mut stmax = t0 + xtrapu * t0;
        let mut stp = t0.clamp(STPMIN, STPMAX);

        for _ in 0..params.max_iterations {
            let trial = phi.eval(stp);
            let (f, g) = (trial.phi, trial.dphi);
            let ftest = finit + stp * gtest;

            if stage1 && f <= ftest && g >= 0.0 {
                stage1 = false;
            }

            // convergence and safeguard exits
            if f <= ftest && g.abs() <= -params.c2 * ginit {
                return phi.into_result(true, stp);
            }
            if brackt && (stp <= stmin || stp >= stmax || stmax - stmin <= xtol * stmax) {
                return phi.into_result(false, x.t);
            }
            if stp >= STPMAX && f <= ftest && g <= gtest {
                return phi.into_result(false, stp);
            }
            if stp <= STPMIN && (f > ftest || g >= gtest) {
                return phi.into_result(false, stp);
            }

            // in the first stage a modified function with flattened slope is
            // used until a point with non-negative modified slope is found
            if stage1 && f <= x.f && f > ftest {
                let mut xm = Endpoint { t: x.t, f: x.f - x.t * gtest, d: x.d - gtest };
                let mut ym = Endpoint { t: y.t, f: y.f - y.t * gtest, d: y.d - gtest };
                let pm = Endpoint { t: stp, f: f - stp * gtest, d: g - gtest };
                stp = dcstep(&mut xm, &mut ym, &pm, &mut brackt, stmin, stmax);
                x = Endpoint { t: xm.t, f: xm.f + xm.t * gtest, d: xm.d + gtest };
                y = Endpoint { t: ym.t, f: ym.f + ym.t * gtest, d: ym.d + gtest };
            } else {
                let p = Endpoint { t: stp, f, d: g };
                stp = dcstep(&mut x, &mut y, &p, &mut brackt, stmin, stmax);
            }

            if brackt {
                // force sufficient interval shrinkage
                if (y.t - x.t).abs() >= 0.66 * width1 {
                    stp = x.t + 0.5 * (y.t - x.t);
                }
                width1 = width;
                width = (y.t - x.t).abs();
                stmin = x.t.min(y.t);
                stmax = x.t.max(y.t);
            } else {
                stmin = stp + xtrapl * (stp - x.t);
                stmax = stp + xtrapu * (stp - x.t);
            }

            stp = stp.clamp(STPMIN, STPMAX);
            if !stp.is_finite()
                || (brackt && (stp <= stmin || stp >= stmax || stmax - stmin <= xtol * stmax))
            {
                stp = x.t;
            }
        }
        phi.into_result(false, stp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::{Rosenbrock, Sphere};

    #[test]
    fn strong_wolfe_from_tiny_and_huge_trials() {
        let function = Sphere::new(2);
        let state0 = SolverState::new(&function, &Vector::from_slice(&[1.0, 1.0]));
        let descent = -state0.gx().clone();
        let refiner = LsearchkMoreThuente::new();

        for t0 in [1e-8, 1.0, 1e+4] {
            let result = refiner.get(&function, &state0, &descent, t0);
            assert!(result.ok, "no Wolfe point from t0 = {t0}");
            assert!(result.fx < state0.fx());
        }
    }

    #[test]
    fn handles_nonquadratic_curvature() {
        let function = Rosenbrock::new(2);
        let state0 = SolverState::new(&function, &Vector::from_slice(&[-1.2, 1.0]));
        let descent = -state0.gx().clone();
        let refiner = LsearchkMoreThuente::new();

        let result = refiner.get(&function, &state0, &descent, 1.0);
        assert!(result.ok);
        assert!(result.fx < state0.fx());
    }
}
