//! Linear and quadratic programs.
//!
//! General form for both classes (the equality and the inequality blocks are
//! optional):
//!
//! ```text
//! min  ½ xᵀPx + qᵀx        (P = 0 for linear programs)
//! s.t. A x = b
//! and  G x ≤ h.
//! ```
//!
//! The module also provides the seeded textbook instances (Boyd's convex
//! optimization exercises, Nocedal-Wright numerical optimization exercises
//! and an OSQP-style random strictly convex program) used to exercise the
//! interior-point solver.

use crate::constraints::ConstraintSet;
use crate::function::{Convexity, Function, FunctionMeta, Optimum, Smoothness};
use crate::functions::{make_random_matrix, make_random_vector};
use nl_core::{ensure, make_rng, Real, Result, EPSILON2};
use nl_tensor::{Matrix, Vector};
use rand::Rng as _;

/// A linear program `min cᵀx  s.t. Ax = b, Gx ≤ h`.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    /// Objective gradient.
    pub c: Vector,
    /// Equality matrix (0 rows when absent).
    pub a: Matrix,
    /// Equality right-hand side.
    pub b: Vector,
    /// Inequality matrix (0 rows when absent).
    pub g: Matrix,
    /// Inequality right-hand side.
    pub h: Vector,
}

impl LinearProgram {
    /// Create an unconstrained linear objective.
    pub fn new(c: Vector) -> Self {
        let n = c.size();
        Self {
            c,
            a: Matrix::zeros(0, n),
            b: Vector::zeros(0),
            g: Matrix::zeros(0, n),
            h: Vector::zeros(0),
        }
    }

    /// Problem dimension.
    pub fn size(&self) -> usize {
        self.c.size()
    }

    /// Append equality constraints `A x = b`.
    pub fn with_equality(mut self, a: Matrix, b: Vector) -> Result<Self> {
        ensure!(a.cols() == self.size(), "equality: A has {} columns, expected {}", a.cols(), self.size());
        ensure!(a.rows() == b.size(), "equality: A has {} rows, b has {}", a.rows(), b.size());
        self.a = nl_tensor::vstack(&[&self.a, &a]);
        let mut merged = Vector::zeros(self.b.size() + b.size());
        merged.set_segment(0, &self.b);
        merged.set_segment(self.b.size(), &b);
        self.b = merged;
        Ok(self)
    }

    /// Append inequality constraints `G x ≤ h`.
    pub fn with_inequality(mut self, g: Matrix, h: Vector) -> Result<Self> {
        ensure!(g.cols() == self.size(), "inequality: G has {} columns, expected {}", g.cols(), self.size());
        ensure!(g.rows() == h.size(), "inequality: G has {} rows, h has {}", g.rows(), h.size());
        self.g = nl_tensor::vstack(&[&self.g, &g]);
        let mut merged = Vector::zeros(self.h.size() + h.size());
        merged.set_segment(0, &self.h);
        merged.set_segment(self.h.size(), &h);
        self.h = merged;
        Ok(self)
    }

    /// Append the standard-form constraint `x ≥ 0`.
    pub fn with_nonnegative(self) -> Self {
        let n = self.size();
        self.with_inequality(Matrix::identity(n).scale(-1.0), Vector::zeros(n))
            .expect("shapes are consistent by construction")
    }

    /// Append the box constraint `l ≤ x ≤ u`.
    pub fn with_box(self, lower: &Vector, upper: &Vector) -> Result<Self> {
        let n = self.size();
        ensure!(lower.size() == n && upper.size() == n, "box: bounds must be {n}-dimensional");
        let stacked = nl_tensor::vstack(&[&Matrix::identity(n).scale(-1.0), &Matrix::identity(n)]);
        let mut h = Vector::zeros(2 * n);
        h.set_segment(0, &(-lower));
        h.set_segment(n, upper);
        self.with_inequality(stacked, h)
    }

    /// Objective value `cᵀx`.
    pub fn objective(&self, x: &Vector) -> Real {
        self.c.dot(x)
    }

    /// Maximum constraint violation at `x`.
    pub fn residual(&self, x: &Vector) -> Real {
        let eq = if self.a.rows() > 0 {
            (&self.a.mul_vec(x) - &self.b).lp_norm_inf()
        } else {
            0.0
        };
        let ineq = if self.g.rows() > 0 {
            (&self.g.mul_vec(x) - &self.h).max().max(0.0)
        } else {
            0.0
        };
        eq.max(ineq)
    }

    /// Wrap into a constrained [`Function`] for the nonlinear drivers.
    pub fn to_function(&self) -> Result<Box<dyn Function>> {
        let mut constraints = ConstraintSet::new(self.size());
        if self.a.rows() > 0 {
            constraints = constraints.with_equality(self.a.clone(), self.b.clone())?;
        }
        if self.g.rows() > 0 {
            constraints = constraints.with_inequality(self.g.clone(), self.h.clone())?;
        }
        Ok(Box::new(ProgramFunction {
            meta: FunctionMeta::new(self.size())
                .convex(Convexity::Convex)
                .smooth(Smoothness::Smooth)
                .constraints(constraints),
            p: None,
            q: self.c.clone(),
            label: "linear-program".to_string(),
        }))
    }
}

/// A quadratic program `min ½xᵀPx + qᵀx  s.t. Ax = b, Gx ≤ h`.
#[derive(Debug, Clone)]
pub struct QuadraticProgram {
    /// Symmetric quadratic term.
    pub p: Matrix,
    /// Objective linear term.
    pub q: Vector,
    /// Equality matrix (0 rows when absent).
    pub a: Matrix,
    /// Equality right-hand side.
    pub b: Vector,
    /// Inequality matrix (0 rows when absent).
    pub g: Matrix,
    /// Inequality right-hand side.
    pub h: Vector,
}

impl QuadraticProgram {
    /// Create an unconstrained quadratic objective.
    pub fn new(p: Matrix, q: Vector) -> Result<Self> {
        let n = q.size();
        ensure!(p.rows() == n && p.cols() == n, "quadratic objective: P must be {n}x{n}");
        ensure!(p.is_symmetric(EPSILON2), "quadratic objective: P must be symmetric");
        Ok(Self {
            p,
            q,
            a: Matrix::zeros(0, n),
            b: Vector::zeros(0),
            g: Matrix::zeros(0, n),
            h: Vector::zeros(0),
        })
    }

    /// Create from the upper-triangular coefficients of a symmetric `P`.
    pub fn from_upper_triangular(coefficients: &[Real], q: Vector) -> Result<Self> {
        let n = q.size();
        ensure!(
            coefficients.len() * 2 == n * (n + 1),
            "quadratic objective: expected {} upper-triangular coefficients, got {}",
            n * (n + 1) / 2,
            coefficients.len()
        );
        let mut p = Matrix::zeros(n, n);
        let mut index = 0;
        for row in 0..n {
            for col in row..n {
                p[(row, col)] = coefficients[index];
                p[(col, row)] = coefficients[index];
                index += 1;
            }
        }
        Self::new(p, q)
    }

    /// Problem dimension.
    pub fn size(&self) -> usize {
        self.q.size()
    }

    /// Append equality constraints `A x = b`.
    pub fn with_equality(mut self, a: Matrix, b: Vector) -> Result<Self> {
        ensure!(a.cols() == self.size(), "equality: A has {} columns, expected {}", a.cols(), self.size());
        ensure!(a.rows() == b.size(), "equality: A has {} rows, b has {}", a.rows(), b.size());
        self.a = nl_tensor::vstack(&[&self.a, &a]);
        let mut merged = Vector::zeros(self.b.size() + b.size());
        merged.set_segment(0, &self.b);
        merged.set_segment(self.b.size(), &b);
        self.b = merged;
        Ok(self)
    }

    /// Append inequality constraints `G x ≤ h`.
    pub fn with_inequality(mut self, g: Matrix, h: Vector) -> Result<Self> {
        ensure!(g.cols() == self.size(), "inequality: G has {} columns, expected {}", g.cols(), self.size());
        ensure!(g.rows() == h.size(), "inequality: G has {} rows, h has {}", g.rows(), h.size());
        self.g = nl_tensor::vstack(&[&self.g, &g]);
        let mut merged = Vector::zeros(self.h.size() + h.size());
        merged.set_segment(0, &self.h);
        merged.set_segment(self.h.size(), &h);
        self.h = merged;
        Ok(self)
    }

    /// Append the constraint `x ≥ 0`.
    pub fn with_nonnegative(self) -> Self {
        let n = self.size();
        self.with_inequality(Matrix::identity(n).scale(-1.0), Vector::zeros(n))
            .expect("shapes are consistent by construction")
    }

    /// Return `true` if the program is convex (`P` positive semi-definite).
    pub fn is_convex(&self) -> bool {
        self.p.is_psd(EPSILON2)
    }

    /// Objective value `½xᵀPx + qᵀx`.
    pub fn objective(&self, x: &Vector) -> Real {
        0.5 * self.p.quadratic_form(x) + self.q.dot(x)
    }

    /// Maximum constraint violation at `x`.
    pub fn residual(&self, x: &Vector) -> Real {
        let eq = if self.a.rows() > 0 {
            (&self.a.mul_vec(x) - &self.b).lp_norm_inf()
        } else {
            0.0
        };
        let ineq = if self.g.rows() > 0 {
            (&self.g.mul_vec(x) - &self.h).max().max(0.0)
        } else {
            0.0
        };
        eq.max(ineq)
    }

    /// Wrap into a constrained [`Function`] for the nonlinear drivers.
    pub fn to_function(&self) -> Result<Box<dyn Function>> {
        let mut constraints = ConstraintSet::new(self.size());
        if self.a.rows() > 0 {
            constraints = constraints.with_equality(self.a.clone(), self.b.clone())?;
        }
        if self.g.rows() > 0 {
            constraints = constraints.with_inequality(self.g.clone(), self.h.clone())?;
        }
        let convexity = if self.is_convex() { Convexity::Convex } else { Convexity::Nonconvex };
        Ok(Box::new(ProgramFunction {
            meta: FunctionMeta::new(self.size())
                .convex(convexity)
                .smooth(Smoothness::Smooth)
                .constraints(constraints),
            p: Some(self.p.clone()),
            q: self.q.clone(),
            label: "quadratic-program".to_string(),
        }))
    }
}

#[derive(Clone)]
struct ProgramFunction {
    meta: FunctionMeta,
    p: Option<Matrix>,
    q: Vector,
    label: String,
}

impl Function for ProgramFunction {
    fn name(&self) -> String {
        format!("{}[{}]", self.label, self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        match &self.p {
            Some(p) => {
                let px = p.mul_vec(x);
                if let Some(gx) = gx {
                    *gx = &px + &self.q;
                }
                if let Some(hx) = hx {
                    *hx = p.clone();
                }
                0.5 * x.dot(&px) + self.q.dot(x)
            }
            None => {
                if let Some(gx) = gx {
                    *gx = self.q.clone();
                }
                if let Some(hx) = hx {
                    *hx = Matrix::zeros(x.size(), x.size());
                }
                self.q.dot(x)
            }
        }
    }
}

/// A seeded textbook program instance with its known solution, when any.
#[derive(Debug, Clone)]
pub struct Instance<P> {
    /// The generated program.
    pub program: P,
    /// A known optimum point, when available.
    pub xbest: Option<Vector>,
    /// The known optimal value, when available.
    pub fbest: Option<Real>,
}

/// Seeded textbook instances for the interior-point test-bed.
pub mod instances {
    use super::*;

    /// Boyd cvx-4.8(b): `min λaᵀx  s.t. aᵀx ≤ b` with `λ ≤ 0`; the optimal
    /// value is `λ·b`.
    pub fn cvx48b(dims: usize, lambda: Real, seed: u64) -> Instance<LinearProgram> {
        assert!(lambda <= 0.0);
        let mut rng = make_rng(seed);
        let a = make_random_vector(dims, 1.0, 2.0, &mut rng);
        let b = rng.gen_range(-1.0..1.0);

        let mut g = Matrix::zeros(1, dims);
        g.set_row(0, &a);
        let program = LinearProgram::new(lambda * &a)
            .with_inequality(g, Vector::from_slice(&[b]))
            .expect("consistent shapes");
        Instance { program, xbest: None, fbest: Some(lambda * b) }
    }

    /// Boyd cvx-4.8(c): `min cᵀx  s.t. l ≤ x ≤ u`; the optimum picks the
    /// active bound per coordinate by the sign of `c`.
    pub fn cvx48c(dims: usize, seed: u64) -> Instance<LinearProgram> {
        let mut rng = make_rng(seed);
        let c = make_random_vector(dims, -1.0, 1.0, &mut rng);
        let l = make_random_vector(dims, -1.0, 1.0, &mut rng);
        let u = make_random_vector(dims, 1.0, 3.0, &mut rng);

        let xbest = Vector::from_fn(dims, |i| if c[i] >= 0.0 { l[i] } else { u[i] });
        let fbest = c.dot(&xbest);
        let program = LinearProgram::new(c).with_box(&l, &u).expect("consistent shapes");
        Instance { program, xbest: Some(xbest), fbest: Some(fbest) }
    }

    /// Boyd cvx-4.9: `min cᵀx  s.t. x ≤ b` with `c ≤ 0`; the optimum is `b`.
    pub fn cvx49(dims: usize, seed: u64) -> Instance<LinearProgram> {
        let mut rng = make_rng(seed);
        let c = make_random_vector(dims, -1.0, -0.001, &mut rng);
        let b = make_random_vector(dims, -1.0, 1.0, &mut rng);

        let fbest = c.dot(&b);
        let program = LinearProgram::new(c)
            .with_inequality(Matrix::identity(dims), b.clone())
            .expect("consistent shapes");
        Instance { program, xbest: Some(b), fbest: Some(fbest) }
    }

    /// Nocedal-Wright 16.2: `min ½‖x − x₀‖²  s.t. A x = b` with a random
    /// unit-triangular `A = L·U`; the optimum is the projection of `x₀` onto
    /// the constraint plane.
    pub fn numopt162(dims: usize, neqs: usize, seed: u64) -> Instance<QuadraticProgram> {
        assert!(neqs >= 1 && neqs <= dims);
        let mut rng = make_rng(seed);
        let x0 = make_random_vector(dims, -1.0, 1.0, &mut rng);

        let mut l = make_random_matrix(neqs, neqs, -1.0, 1.0, &mut rng);
        let mut u = make_random_matrix(neqs, dims, -1.0, 1.0, &mut rng);
        for i in 0..neqs {
            for j in i..neqs {
                l[(i, j)] = if i == j { 1.0 } else { 0.0 };
            }
            for j in 0..=i.min(dims - 1) {
                u[(i, j)] = if i == j { 1.0 } else { 0.0 };
            }
        }
        let a = &l * &u;
        let b = make_random_vector(neqs, -1.0, 1.0, &mut rng);

        // xbest = x0 + Aᵀ(AAᵀ)⁻¹(b − A·x0)
        let gram = &a * &a.transpose();
        let residual = &b - &a.mul_vec(&x0);
        let multipliers = gram.lu_solve(&residual).expect("A has full row rank");
        let xbest = &x0 + &a.tr_mul_vec(&multipliers);

        let program = QuadraticProgram::new(Matrix::identity(dims), -&x0)
            .expect("P is symmetric")
            .with_equality(a, b)
            .expect("consistent shapes");
        let fbest = program.objective(&xbest);
        Instance { program, xbest: Some(xbest), fbest: Some(fbest) }
    }

    /// Nocedal-Wright 16.25: `min ½‖x − x₀‖²  s.t. x ≥ 0`; the optimum is the
    /// positive part of `x₀`.
    pub fn numopt1625(dims: usize, seed: u64) -> Instance<QuadraticProgram> {
        let mut rng = make_rng(seed);
        let x0 = make_random_vector(dims, -1.0, 1.0, &mut rng);

        let xbest = x0.positive_part();
        let program = QuadraticProgram::new(Matrix::identity(dims), -&x0)
            .expect("P is symmetric")
            .with_nonnegative();
        let fbest = program.objective(&xbest);
        Instance { program, xbest: Some(xbest), fbest: Some(fbest) }
    }

    /// OSQP-style random strictly convex program:
    /// `min ½xᵀPx + qᵀx  s.t. G x ≤ h` with `P = BBᵀ/n + αI` and `h`
    /// strictly feasible at a random point.
    pub fn random_qp(dims: usize, ineqs: usize, alpha: Real, seed: u64) -> Instance<QuadraticProgram> {
        let mut rng = make_rng(seed);
        let basis = make_random_matrix(dims, dims, -1.0, 1.0, &mut rng);
        let mut p = (&basis * &basis.transpose()).scale(1.0 / dims as Real);
        for i in 0..dims {
            p[(i, i)] += alpha;
        }
        let q = make_random_vector(dims, -1.0, 1.0, &mut rng);

        let g = make_random_matrix(ineqs, dims, -1.0, 1.0, &mut rng);
        let x_feasible = make_random_vector(dims, -1.0, 1.0, &mut rng);
        let slack = make_random_vector(ineqs, 0.1, 1.0, &mut rng);
        let h = &g.mul_vec(&x_feasible) + &slack;

        let program = QuadraticProgram::new(p, q)
            .expect("P is symmetric")
            .with_inequality(g, h)
            .expect("consistent shapes");
        Instance { program, xbest: None, fbest: None }
    }
}
