//! The proximal parameter of penalized bundle methods.

use crate::state::SolverState;
use nl_core::{Real, EPSILON0, EPSILON1};
use nl_tensor::Vector;

/// Models the proximal parameter `μ > 0` with the reversal quasi-Newton
/// (RQB) update.
///
/// The initial value is `μ₀ = clamp(5‖g‖²/(|f|+ε₁), range)`; after a change
/// of stability center the curvature along the move updates
/// `μ ← ‖ν‖²/(ν·u)` with `ν = g₊ − g`, `u = ξ + (t/μ)ν`, `ξ = x₊ − x`,
/// skipped when `ν·u` is not safely positive (the objective is not strictly
/// convex along the move).
#[derive(Debug, Clone)]
pub struct Proximity {
    miu: Real,
    miu_min: Real,
    miu_max: Real,
}

impl Proximity {
    /// Initialize from the starting state and the declared clamping range.
    pub fn new(state: &SolverState, miu_range: (Real, Real)) -> Self {
        let miu0 = 5.0 * state.gx().norm_squared() / (state.fx().abs() + EPSILON1);
        Self {
            miu: miu0.clamp(miu_range.0, miu_range.1),
            miu_min: miu_range.0,
            miu_max: miu_range.1,
        }
    }

    /// The current proximal parameter value.
    pub fn miu(&self) -> Real {
        debug_assert!(self.miu.is_finite() && self.miu > 0.0);
        self.miu
    }

    /// RQB update after moving the stability center from `xn` to `xn1` with
    /// curve-search step `t` and subgradients `gn`/`gn1` at the centers.
    pub fn update(&mut self, t: Real, xn: &Vector, xn1: &Vector, gn: &Vector, gn1: &Vector) {
        let nu = gn1 - gn;
        let xi = xn1 - xn;
        let u = &xi + &((t / self.miu) * &nu);

        let nu_dot_u = nu.dot(&u);
        if nu_dot_u > EPSILON0 {
            self.miu = (nu.norm_squared() / nu_dot_u).clamp(self.miu_min, self.miu_max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nl_function::functions::Sphere;

    #[test]
    fn initial_value_follows_the_gradient_magnitude() {
        let function = Sphere::new(2);
        let state = SolverState::new(&function, &Vector::from_slice(&[3.0, 4.0]));
        let proximity = Proximity::new(&state, (1e-4, 1e+4));
        // 5 * 25 / 12.5 = 10
        assert!((proximity.miu() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn initial_value_is_clamped() {
        let function = Sphere::new(2);
        let state = SolverState::new(&function, &Vector::from_slice(&[3.0, 4.0]));
        let proximity = Proximity::new(&state, (1e-4, 1.0));
        assert_eq!(proximity.miu(), 1.0);
    }

    #[test]
    fn quadratic_curvature_is_recovered() {
        // on f = ½‖x‖², g = x, so ν = ξ and the update gives μ ≈ 1/(1 + t/μ)
        let mut proximity = Proximity {
            miu: 1.0,
            miu_min: 1e-4,
            miu_max: 1e+4,
        };
        let xn = Vector::zeros(2);
        let xn1 = Vector::from_slice(&[1.0, 0.0]);
        proximity.update(0.0, &xn, &xn1, &xn, &xn1);
        assert!((proximity.miu() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn nonconvex_moves_are_skipped() {
        let mut proximity = Proximity {
            miu: 2.0,
            miu_min: 1e-4,
            miu_max: 1e+4,
        };
        // ν opposes ξ, the curvature is negative
        let xn = Vector::zeros(1);
        let xn1 = Vector::from_slice(&[1.0]);
        let gn = Vector::from_slice(&[1.0]);
        let gn1 = Vector::from_slice(&[-5.0]);
        proximity.update(0.0, &xn, &xn1, &gn, &gn1);
        assert_eq!(proximity.miu(), 2.0);
    }
}
