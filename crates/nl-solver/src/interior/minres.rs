//! MINRES iterations for symmetric (indefinite) linear systems.
//!
//! Used as the fall-back when the LDLᵀ factorization of the condensed KKT
//! matrix is not positive on the expected block.

use nl_core::Real;
use nl_tensor::{Matrix, Vector};

/// Approximately solve `A x = b` for symmetric `A`, starting from `x`.
///
/// Returns `true` when the residual infinity norm drops below `tolerance`
/// within `max_iters` iterations.
pub fn minres(a: &Matrix, b: &Vector, x: &mut Vector, max_iters: usize, tolerance: Real) -> bool {
    let mut r = b - &a.mul_vec(x);
    let mut p0 = r.clone();
    let mut s0 = a.mul_vec(&p0);
    let mut p1 = p0.clone();
    let mut s1 = s0.clone();
    let mut p2;
    let mut s2;

    for iter in 0..max_iters {
        p2 = p1.clone();
        p1 = p0.clone();
        s2 = s1.clone();
        s1 = s0.clone();

        let alpha = r.dot(&s1) / s1.dot(&s1);
        if !alpha.is_finite() {
            return false;
        }

        *x += &(alpha * &p1);
        r -= &(alpha * &s1);

        if r.lp_norm_inf() < tolerance {
            return true;
        }

        p0 = s1.clone();
        s0 = a.mul_vec(&s1);

        let beta1 = s0.dot(&s1) / s1.dot(&s1);
        p0 -= &(beta1 * &p1);
        s0 -= &(beta1 * &s1);

        if iter > 0 {
            let beta2 = s0.dot(&s2) / s2.dot(&s2);
            p0 -= &(beta2 * &p2);
            s0 -= &(beta2 * &s2);
        }
    }
    false
}
