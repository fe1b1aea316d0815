//! Curve-search for penalized bundle methods.
//!
//! Decides between a serious step (sufficient descent, the stability center
//! moves), a null step (the trial only enriches the bundle) and a
//! cutting-plane step, with the standard constants `m₁ = ½, m₂ = 9/10,
//! m₃ = m₄ = 1`.

use super::{Bundle, BundleStep};
use nl_core::Real;
use nl_function::Function;
use nl_tensor::Vector;

/// The outcome of one curve-search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsearchStatus {
    /// The predicted decrease vanished: the center is optimal within
    /// tolerance.
    Converged,
    /// Sufficient descent: move the stability center to the trial point.
    DescentStep,
    /// No descent, but the trial linearization is informative.
    CuttingPlaneStep,
    /// No descent and weak curvature: plain bundle enrichment.
    NullStep,
    /// The curve-search exhausted its budget.
    MaxIters,
    /// A non-finite value was produced.
    Failed,
}

/// The point produced by one curve-search.
#[derive(Debug, Clone)]
pub struct CsearchPoint {
    /// The outcome.
    pub status: CsearchStatus,
    /// Curve-search step along the proximal direction.
    pub t: Real,
    /// Trial point `x̂ + t·d`.
    pub y: Vector,
    /// Objective value at the trial point.
    pub fy: Real,
    /// Subgradient at the trial point.
    pub gy: Vector,
}

/// Curve-search parameters.
#[derive(Debug, Clone, Copy)]
pub struct Csearch {
    /// Sufficient-descent fraction of the predicted decrease.
    pub m1: Real,
    /// Curvature fraction separating cutting-plane from null steps.
    pub m2: Real,
    /// Step growth on accepted interpolation (kept at 1: single trial).
    pub m3: Real,
    /// Step shrink factor between trials.
    pub m4: Real,
    /// Maximum number of trials per search.
    pub max_iterations: usize,
}

impl Default for Csearch {
    fn default() -> Self {
        Self { m1: 0.5, m2: 0.9, m3: 1.0, m4: 1.0, max_iterations: 20 }
    }
}

impl Csearch {
    /// Run one curve-search from the bundle's stability center along the
    /// proximal direction.
    pub fn search(
        &self,
        function: &dyn Function,
        bundle: &Bundle,
        step: &BundleStep,
        epsilon: Real,
    ) -> CsearchPoint {
        let fcenter = bundle.fcenter();
        let mut gy = Vector::zeros(bundle.center().size());

        if step.v <= epsilon * fcenter.abs().max(1.0) {
            return CsearchPoint {
                status: CsearchStatus::Converged,
                t: 0.0,
                y: bundle.center().clone(),
                fy: fcenter,
                gy: bundle.gcenter().clone(),
            };
        }

        let mut t = self.m3;
        for _ in 0..self.max_iterations {
            let y = bundle.center() + &(t * &step.d);
            let fy = function.vgrad(&y, &mut gy);
            if !fy.is_finite() {
                return CsearchPoint { status: CsearchStatus::Failed, t, y, fy, gy };
            }

            if fy <= fcenter - self.m1 * t * step.v {
                return CsearchPoint { status: CsearchStatus::DescentStep, t, y, fy, gy };
            }
            if gy.dot(&step.d) >= -self.m2 * step.v {
                return CsearchPoint { status: CsearchStatus::CuttingPlaneStep, t, y, fy, gy };
            }
            if t >= self.m4 {
                // a single full-step trial: enrich the bundle with it
                return CsearchPoint { status: CsearchStatus::NullStep, t, y, fy, gy };
            }
            t *= 0.5;
        }

        let y = bundle.center() + &(t * &step.d);
        let fy = function.vgrad(&y, &mut gy);
        CsearchPoint { status: CsearchStatus::MaxIters, t, y, fy, gy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interior::SolverIpm;
    use nl_function::functions::MaxQ;
    use nl_function::Function as _;

    #[test]
    fn far_from_optimum_the_search_descends() {
        let function = MaxQ::new(2);
        let center = Vector::from_slice(&[2.0, 1.0]);
        let mut gx = Vector::zeros(2);
        let fx = function.vgrad(&center, &mut gx);
        let mut bundle = Bundle::new(center, fx, gx, 10);

        let step = bundle.solve(1.0, &SolverIpm::new()).unwrap();
        let point = Csearch::default().search(&function, &bundle, &step, 1e-8);
        assert!(matches!(
            point.status,
            CsearchStatus::DescentStep | CsearchStatus::CuttingPlaneStep | CsearchStatus::NullStep
        ));
        if point.status == CsearchStatus::DescentStep {
            assert!(point.fy < fx);
        }
    }

    #[test]
    fn near_optimum_the_search_converges() {
        let function = MaxQ::new(2);
        let center = Vector::from_slice(&[1e-10, -1e-10]);
        let mut gx = Vector::zeros(2);
        let fx = function.vgrad(&center, &mut gx);
        let mut bundle = Bundle::new(center, fx, gx, 10);

        let step = bundle.solve(1.0, &SolverIpm::new()).unwrap();
        let point = Csearch::default().search(&function, &bundle, &step, 1e-8);
        assert_eq!(point.status, CsearchStatus::Converged);
    }
}
