//! Modified Ruiz equilibration.
//!
//! Iteratively rescales variables and constraint rows by the inverse square
//! roots of their infinity norms until the norms stabilize around one or
//! the iteration cap is reached. The accumulated diagonal scalings map the
//! scaled solution and multipliers back to the original units.

use nl_core::Real;
use nl_tensor::{Matrix, Vector};

const MAX_ITERATIONS: usize = 10;
const TOLERANCE: Real = 0.1;

/// The accumulated diagonal scalings of an equilibrated program.
#[derive(Debug, Clone)]
pub struct Scaling {
    /// Per-variable scaling (`x = d ∘ x̂`).
    pub d: Vector,
    /// Per-equality-row scaling (`v = e ∘ v̂`).
    pub e: Vector,
    /// Per-inequality-row scaling (`u = f ∘ û`).
    pub f: Vector,
}

fn inv_sqrt(norm: Real) -> Real {
    if norm > 0.0 {
        1.0 / norm.sqrt()
    } else {
        1.0
    }
}

/// Equilibrate `(P, q, A, b, G, h)` in place and return the scalings.
#[allow(clippy::too_many_arguments)]
pub fn equilibrate(
    p: &mut Matrix,
    q: &mut Vector,
    a: &mut Matrix,
    b: &mut Vector,
    g: &mut Matrix,
    h: &mut Vector,
) -> Scaling {
    let n = q.size();
    let neqs = b.size();
    let nineqs = h.size();

    let mut scaling = Scaling {
        d: Vector::constant(n, 1.0),
        e: Vector::constant(neqs, 1.0),
        f: Vector::constant(nineqs, 1.0),
    };

    for _ in 0..MAX_ITERATIONS {
        let mut deviation: Real = 0.0;

        // variables: the stacked column norms over [P; A; G]
        for j in 0..n {
            let mut norm: Real = 0.0;
            for i in 0..n {
                norm = norm.max(p[(i, j)].abs());
            }
            for i in 0..neqs {
                norm = norm.max(a[(i, j)].abs());
            }
            for i in 0..nineqs {
                norm = norm.max(g[(i, j)].abs());
            }
            deviation = deviation.max((1.0 - norm).abs());

            let factor = inv_sqrt(norm);
            scaling.d[j] *= factor;
            p.scale_column(j, factor);
            p.scale_row(j, factor);
            q[j] *= factor;
            a.scale_column(j, factor);
            g.scale_column(j, factor);
        }

        // constraint rows
        for i in 0..neqs {
            let norm = a.row(i).lp_norm_inf();
            deviation = deviation.max((1.0 - norm).abs());
            let factor = inv_sqrt(norm);
            scaling.e[i] *= factor;
            a.scale_row(i, factor);
            b[i] *= factor;
        }
        for i in 0..nineqs {
            let norm = g.row(i).lp_norm_inf();
            deviation = deviation.max((1.0 - norm).abs());
            let factor = inv_sqrt(norm);
            scaling.f[i] *= factor;
            g.scale_row(i, factor);
            h[i] *= factor;
        }

        if deviation < TOLERANCE {
            break;
        }
    }
    scaling
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_badly_scaled_rows() {
        let mut p = Matrix::zeros(2, 2);
        let mut q = Vector::from_slice(&[1e+6, 1e-6]);
        let mut a = Matrix::from_row_slice(1, 2, &[1e+6, 2e+6]);
        let mut b = Vector::from_slice(&[1e+6]);
        let mut g = Matrix::from_row_slice(1, 2, &[1e-4, 3e-4]);
        let mut h = Vector::from_slice(&[1.0]);

        let scaling = equilibrate(&mut p, &mut q, &mut a, &mut b, &mut g, &mut h);

        for i in 0..1 {
            let norm = a.row(i).lp_norm_inf();
            assert!((0.3..3.0).contains(&norm), "eq row norm {norm}");
        }
        let norm = g.row(0).lp_norm_inf();
        assert!((0.3..3.0).contains(&norm), "ineq row norm {norm}");
        assert!(scaling.d.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn identity_program_is_a_fixed_point() {
        let mut p = Matrix::identity(2);
        let mut q = Vector::constant(2, 1.0);
        let mut a = Matrix::zeros(0, 2);
        let mut b = Vector::zeros(0);
        let mut g = Matrix::identity(2);
        let mut h = Vector::constant(2, 1.0);

        let scaling = equilibrate(&mut p, &mut q, &mut a, &mut b, &mut g, &mut h);
        assert!((scaling.d[0] - 1.0).abs() < 1e-12);
        assert!((p[(0, 0)] - 1.0).abs() < 1e-12);
    }
}
