//! Constraint sets attached to objective functions.
//!
//! A constraint set collects linear equalities `A x = b`, linear
//! inequalities `G x ≤ h`, quadratic constraints `½xᵀPx + qᵀx + r ≤ 0` and
//! generic nonlinear constraints `gᵢ(x) ≤ 0`, `hⱼ(x) = 0`. It is attached to
//! a function at construction and immutable afterwards. Linear equality rows
//! are reduced to an independent subset on attachment.

use crate::function::Function;
use nl_core::{ensure, Real, Result, EPSILON1};
use nl_tensor::{matrix::reduce_rows, Matrix, Vector};
use std::fmt;

/// A linear equality block `A x = b` with independent rows.
#[derive(Debug, Clone)]
pub struct LinearEquality {
    a: Matrix,
    b: Vector,
}

impl LinearEquality {
    /// The coefficient matrix.
    pub fn a(&self) -> &Matrix {
        &self.a
    }

    /// The right-hand side.
    pub fn b(&self) -> &Vector {
        &self.b
    }

    /// Largest absolute deviation `‖A x − b‖∞`.
    pub fn deviation(&self, x: &Vector) -> Real {
        (&self.a.mul_vec(x) - &self.b).lp_norm_inf()
    }
}

/// A linear inequality block `G x ≤ h`.
#[derive(Debug, Clone)]
pub struct LinearInequality {
    g: Matrix,
    h: Vector,
}

impl LinearInequality {
    /// The coefficient matrix.
    pub fn g(&self) -> &Matrix {
        &self.g
    }

    /// The right-hand side.
    pub fn h(&self) -> &Vector {
        &self.h
    }

    /// Largest positive violation `max(0, max_i (G x − h)_i)`.
    pub fn deviation(&self, x: &Vector) -> Real {
        (&self.g.mul_vec(x) - &self.h).max().max(0.0)
    }
}

/// A quadratic inequality constraint `½ xᵀ P x + qᵀ x + r ≤ 0`.
#[derive(Debug, Clone)]
pub struct QuadraticConstraint {
    /// Symmetric quadratic term.
    pub p: Matrix,
    /// Linear term.
    pub q: Vector,
    /// Constant term.
    pub r: Real,
}

impl QuadraticConstraint {
    /// Constraint value at `x`.
    pub fn value(&self, x: &Vector) -> Real {
        0.5 * self.p.quadratic_form(x) + self.q.dot(x) + self.r
    }

    /// Constraint gradient `P x + q`.
    pub fn gradient(&self, x: &Vector) -> Vector {
        &self.p.mul_vec(x) + &self.q
    }
}

/// The constraints attached to a function.
#[derive(Clone, Default)]
pub struct ConstraintSet {
    size: usize,
    equality: Option<LinearEquality>,
    inequality: Option<LinearInequality>,
    quadratics: Vec<QuadraticConstraint>,
    nonlinear_eqs: Vec<Box<dyn Function>>,
    nonlinear_ineqs: Vec<Box<dyn Function>>,
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintSet")
            .field("size", &self.size)
            .field("linear_equalities", &self.equality.as_ref().map_or(0, |eq| eq.a.rows()))
            .field("linear_inequalities", &self.inequality.as_ref().map_or(0, |ineq| ineq.g.rows()))
            .field("quadratics", &self.quadratics.len())
            .field("nonlinear_eqs", &self.nonlinear_eqs.len())
            .field("nonlinear_ineqs", &self.nonlinear_ineqs.len())
            .finish()
    }
}

impl ConstraintSet {
    /// Create an empty constraint set over `size`-dimensional points.
    pub fn new(size: usize) -> Self {
        Self { size, ..Default::default() }
    }

    /// Dimension of the constrained points.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Return `true` if no constraint is attached.
    pub fn is_empty(&self) -> bool {
        self.equality.is_none()
            && self.inequality.is_none()
            && self.quadratics.is_empty()
            && self.nonlinear_eqs.is_empty()
            && self.nonlinear_ineqs.is_empty()
    }

    /// Append linear equalities `A x = b`; rows are reduced to an
    /// independent subset together with any previously attached block.
    pub fn with_equality(mut self, a: Matrix, b: Vector) -> Result<Self> {
        ensure!(a.cols() == self.size, "equality: A has {} columns, expected {}", a.cols(), self.size);
        ensure!(a.rows() == b.size(), "equality: A has {} rows, b has {}", a.rows(), b.size());

        let (mut a, mut b) = match self.equality.take() {
            Some(existing) => (
                nl_tensor::vstack(&[&existing.a, &a]),
                {
                    let mut merged = Vector::zeros(existing.b.size() + b.size());
                    merged.set_segment(0, &existing.b);
                    merged.set_segment(existing.b.size(), &b);
                    merged
                },
            ),
            None => (a, b),
        };
        reduce_rows(&mut a, &mut b, EPSILON1);
        self.equality = Some(LinearEquality { a, b });
        Ok(self)
    }

    /// Append linear inequalities `G x ≤ h`.
    pub fn with_inequality(mut self, g: Matrix, h: Vector) -> Result<Self> {
        ensure!(g.cols() == self.size, "inequality: G has {} columns, expected {}", g.cols(), self.size);
        ensure!(g.rows() == h.size(), "inequality: G has {} rows, h has {}", g.rows(), h.size());

        self.inequality = Some(match self.inequality.take() {
            Some(existing) => {
                let mut merged_h = Vector::zeros(existing.h.size() + h.size());
                merged_h.set_segment(0, &existing.h);
                merged_h.set_segment(existing.h.size(), &h);
                LinearInequality { g: nl_tensor::vstack(&[&existing.g, &g]), h: merged_h }
            }
            None => LinearInequality { g, h },
        });
        Ok(self)
    }

    /// Append the box constraint `l ≤ x ≤ u` as linear inequalities.
    pub fn with_box(self, lower: &Vector, upper: &Vector) -> Result<Self> {
        ensure!(lower.size() == self.size && upper.size() == self.size, "box: bounds must be {}-dimensional", self.size);
        let n = self.size;
        let mut g = Matrix::zeros(2 * n, n);
        let mut h = Vector::zeros(2 * n);
        for i in 0..n {
            g[(i, i)] = -1.0;
            h[i] = -lower[i];
            g[(n + i, i)] = 1.0;
            h[n + i] = upper[i];
        }
        self.with_inequality(g, h)
    }

    /// Append a quadratic constraint `½ xᵀ P x + qᵀ x + r ≤ 0`.
    pub fn with_quadratic(mut self, p: Matrix, q: Vector, r: Real) -> Result<Self> {
        ensure!(p.rows() == self.size && p.cols() == self.size, "quadratic: P must be {0}x{0}", self.size);
        ensure!(q.size() == self.size, "quadratic: q must be {}-dimensional", self.size);
        self.quadratics.push(QuadraticConstraint { p, q, r });
        Ok(self)
    }

    /// Append a nonlinear equality `h(x) = 0`.
    pub fn with_nonlinear_equality(mut self, h: Box<dyn Function>) -> Result<Self> {
        ensure!(h.size() == self.size, "nonlinear equality: function must be {}-dimensional", self.size);
        self.nonlinear_eqs.push(h);
        Ok(self)
    }

    /// Append a nonlinear inequality `g(x) ≤ 0`.
    pub fn with_nonlinear_inequality(mut self, g: Box<dyn Function>) -> Result<Self> {
        ensure!(g.size() == self.size, "nonlinear inequality: function must be {}-dimensional", self.size);
        self.nonlinear_ineqs.push(g);
        Ok(self)
    }

    /// The attached linear equality block.
    pub fn equality(&self) -> Option<&LinearEquality> {
        self.equality.as_ref()
    }

    /// The attached linear inequality block.
    pub fn inequality(&self) -> Option<&LinearInequality> {
        self.inequality.as_ref()
    }

    /// The attached quadratic constraints.
    pub fn quadratics(&self) -> &[QuadraticConstraint] {
        &self.quadratics
    }

    /// Total number of scalar equality constraints.
    pub fn n_equalities(&self) -> usize {
        self.equality.as_ref().map_or(0, |eq| eq.a.rows()) + self.nonlinear_eqs.len()
    }

    /// Total number of scalar inequality constraints.
    pub fn n_inequalities(&self) -> usize {
        self.inequality.as_ref().map_or(0, |ineq| ineq.g.rows())
            + self.quadratics.len()
            + self.nonlinear_ineqs.len()
    }

    /// Value (and gradient) of the `j`-th equality constraint `hⱼ(x)`.
    ///
    /// Linear rows come first, then nonlinear equalities.
    pub fn eq_value_grad(&self, j: usize, x: &Vector, gx: Option<&mut Vector>) -> Real {
        let linear_rows = self.equality.as_ref().map_or(0, |eq| eq.a.rows());
        if j < linear_rows {
            let eq = self.equality.as_ref().expect("guarded by the row count");
            let row = eq.a.row(j);
            if let Some(gx) = gx {
                *gx = row.clone();
            }
            row.dot(x) - eq.b[j]
        } else {
            let function = &self.nonlinear_eqs[j - linear_rows];
            match gx {
                Some(gx) => function.vgrad(x, gx),
                None => function.value(x),
            }
        }
    }

    /// Value (and gradient) of the `i`-th inequality constraint `gᵢ(x)`.
    ///
    /// Linear rows come first, then quadratics, then nonlinear inequalities.
    pub fn ineq_value_grad(&self, i: usize, x: &Vector, gx: Option<&mut Vector>) -> Real {
        let linear_rows = self.inequality.as_ref().map_or(0, |ineq| ineq.g.rows());
        if i < linear_rows {
            let ineq = self.inequality.as_ref().expect("guarded by the row count");
            let row = ineq.g.row(i);
            if let Some(gx) = gx {
                *gx = row.clone();
            }
            row.dot(x) - ineq.h[i]
        } else if i < linear_rows + self.quadratics.len() {
            let quadratic = &self.quadratics[i - linear_rows];
            if let Some(gx) = gx {
                *gx = quadratic.gradient(x);
            }
            quadratic.value(x)
        } else {
            let function = &self.nonlinear_ineqs[i - linear_rows - self.quadratics.len()];
            match gx {
                Some(gx) => function.vgrad(x, gx),
                None => function.value(x),
            }
        }
    }

    /// Maximum constraint violation at `x` (0 when unconstrained).
    pub fn residual(&self, x: &Vector) -> Real {
        let mut residual: Real = 0.0;
        for j in 0..self.n_equalities() {
            residual = residual.max(self.eq_value_grad(j, x, None).abs());
        }
        for i in 0..self.n_inequalities() {
            residual = residual.max(self.ineq_value_grad(i, x, None).max(0.0));
        }
        residual
    }

    /// Return `true` if `x` satisfies all constraints within `tol`.
    pub fn valid(&self, x: &Vector, tol: Real) -> bool {
        self.residual(x) <= tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_always_valid() {
        let set = ConstraintSet::new(3);
        assert!(set.is_empty());
        assert_eq!(set.residual(&Vector::from_slice(&[1.0, -2.0, 3.0])), 0.0);
    }

    #[test]
    fn linear_equality_residual() {
        let set = ConstraintSet::new(2)
            .with_equality(Matrix::from_row_slice(1, 2, &[1.0, 1.0]), Vector::from_slice(&[1.0]))
            .unwrap();
        assert_eq!(set.n_equalities(), 1);
        assert!(set.valid(&Vector::from_slice(&[0.25, 0.75]), 1e-12));
        assert!((set.residual(&Vector::from_slice(&[1.0, 1.0])) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dependent_equality_rows_are_reduced() {
        let a = Matrix::from_row_slice(2, 2, &[1.0, 1.0, 2.0, 2.0]);
        let b = Vector::from_slice(&[1.0, 2.0]);
        let set = ConstraintSet::new(2).with_equality(a, b).unwrap();
        assert_eq!(set.n_equalities(), 1);
    }

    #[test]
    fn inequality_only_counts_violations() {
        let set = ConstraintSet::new(2)
            .with_inequality(Matrix::from_row_slice(1, 2, &[1.0, 0.0]), Vector::from_slice(&[1.0]))
            .unwrap();
        // inside: no violation
        assert_eq!(set.residual(&Vector::from_slice(&[0.0, 5.0])), 0.0);
        // outside: x0 - 1
        assert!((set.residual(&Vector::from_slice(&[3.0, 0.0])) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn box_constraint() {
        let set = ConstraintSet::new(2)
            .with_box(&Vector::from_slice(&[0.0, 0.0]), &Vector::from_slice(&[1.0, 1.0]))
            .unwrap();
        assert_eq!(set.n_inequalities(), 4);
        assert!(set.valid(&Vector::from_slice(&[0.5, 0.5]), 1e-12));
        assert!(!set.valid(&Vector::from_slice(&[-0.5, 0.5]), 1e-12));
    }

    #[test]
    fn quadratic_constraint_gradient() {
        let set = ConstraintSet::new(2)
            .with_quadratic(Matrix::identity(2), Vector::zeros(2), -1.0)
            .unwrap();
        let x = Vector::from_slice(&[2.0, 0.0]);
        let mut gx = Vector::zeros(2);
        // ½‖x‖² − 1 = 1 at (2, 0)
        let value = set.ineq_value_grad(0, &x, Some(&mut gx));
        assert!((value - 1.0).abs() < 1e-12);
        assert_eq!(gx.as_slice(), &[2.0, 0.0]);
    }
}
