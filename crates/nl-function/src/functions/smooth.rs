//! Smooth convex benchmark functions.

use super::{make_random_matrix, make_random_vector};
use crate::function::{Convexity, Function, FunctionMeta, Optimum, Smoothness};
use nl_core::{make_rng, Real};
use nl_tensor::{Matrix, Vector};

fn convex_smooth(size: usize) -> FunctionMeta {
    FunctionMeta::new(size).convex(Convexity::Convex).smooth(Smoothness::Smooth)
}

// ── Sphere ────────────────────────────────────────────────────────────────────

/// `f(x) = ½ xᵀx` — the simplest strongly convex quadratic.
#[derive(Clone)]
pub struct Sphere {
    meta: FunctionMeta,
}

impl Sphere {
    /// Create a sphere function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size).strong_convexity(1.0) }
    }
}

impl Function for Sphere {
    fn name(&self) -> String {
        format!("sphere[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        if let Some(gx) = gx {
            *gx = x.clone();
        }
        if let Some(hx) = hx {
            *hx = Matrix::identity(x.size());
        }
        0.5 * x.dot(x)
    }
}

// ── Axis-parallel ellipsoid ───────────────────────────────────────────────────

/// `f(x) = Σᵢ (i+1)·xᵢ²`.
#[derive(Clone)]
pub struct AxisEllipsoid {
    meta: FunctionMeta,
    weights: Vector,
}

impl AxisEllipsoid {
    /// Create an axis-parallel ellipsoid of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            meta: convex_smooth(size).strong_convexity(2.0),
            weights: Vector::from_fn(size, |i| (i + 1) as Real),
        }
    }
}

impl Function for AxisEllipsoid {
    fn name(&self) -> String {
        format!("axis-ellipsoid[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        if let Some(gx) = gx {
            *gx = 2.0 * &x.component_mul(&self.weights);
        }
        if let Some(hx) = hx {
            *hx = Matrix::from_diagonal(&(2.0 * &self.weights));
        }
        x.component_mul(x).dot(&self.weights)
    }
}

// ── Rotated hyper-ellipsoid ───────────────────────────────────────────────────

/// `f(x) = Σᵢ (Σ_{j≤i} xⱼ)²` — an ill-conditioned convex quadratic.
#[derive(Clone)]
pub struct RotatedEllipsoid {
    meta: FunctionMeta,
}

impl RotatedEllipsoid {
    /// Create a rotated hyper-ellipsoid of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size) }
    }
}

impl Function for RotatedEllipsoid {
    fn name(&self) -> String {
        format!("rotated-ellipsoid[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let n = x.size();
        let mut fx = 0.0;
        let mut prefix = 0.0;
        let mut prefixes = Vector::zeros(n);
        for i in 0..n {
            prefix += x[i];
            prefixes[i] = prefix;
            fx += prefix * prefix;
        }
        if let Some(gx) = gx {
            // ∂f/∂xᵢ = 2 Σ_{k≥i} s_k, accumulated right to left
            let mut suffix = 0.0;
            for i in (0..n).rev() {
                suffix += prefixes[i];
                gx[i] = 2.0 * suffix;
            }
        }
        if let Some(hx) = hx {
            *hx = Matrix::from_fn(n, n, |i, j| 2.0 * (n - i.max(j)) as Real);
        }
        fx
    }
}

// ── Schumer-Steiglitz ─────────────────────────────────────────────────────────

/// `f(x) = Σᵢ xᵢ⁴`.
#[derive(Clone)]
pub struct SchumerSteiglitz {
    meta: FunctionMeta,
}

impl SchumerSteiglitz {
    /// Create a Schumer-Steiglitz function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size) }
    }
}

impl Function for SchumerSteiglitz {
    fn name(&self) -> String {
        format!("schumer-steiglitz[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        if let Some(gx) = gx {
            *gx = x.map(|v| 4.0 * v * v * v);
        }
        if let Some(hx) = hx {
            *hx = Matrix::from_diagonal(&x.map(|v| 12.0 * v * v));
        }
        x.iter().map(|v| v * v * v * v).sum()
    }
}

// ── Chung-Reynolds ────────────────────────────────────────────────────────────

/// `f(x) = (xᵀx)²`.
#[derive(Clone)]
pub struct ChungReynolds {
    meta: FunctionMeta,
}

impl ChungReynolds {
    /// Create a Chung-Reynolds function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size) }
    }
}

impl Function for ChungReynolds {
    fn name(&self) -> String {
        format!("chung-reynolds[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let u = x.dot(x);
        if let Some(gx) = gx {
            *gx = (4.0 * u) * x;
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::from_diagonal(&Vector::constant(x.size(), 4.0 * u));
            hessian.rank1_update(8.0, x, x);
            *hx = hessian;
        }
        u * u
    }
}

// ── Exponential ───────────────────────────────────────────────────────────────

/// `f(x) = exp(1 + xᵀx / n)`.
#[derive(Clone)]
pub struct Exponential {
    meta: FunctionMeta,
}

impl Exponential {
    /// Create an exponential function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size).strong_convexity(2.0 / size as Real) }
    }
}

impl Function for Exponential {
    fn name(&self) -> String {
        format!("exponential[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(std::f64::consts::E) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let alpha = 1.0 / x.size() as Real;
        let fx = (1.0 + alpha * x.dot(x)).exp();
        if let Some(gx) = gx {
            *gx = (2.0 * alpha * fx) * x;
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::from_diagonal(&Vector::constant(x.size(), 2.0 * alpha * fx));
            hessian.rank1_update(4.0 * alpha * alpha * fx, x, x);
            *hx = hessian;
        }
        fx
    }
}

// ── Sargan ────────────────────────────────────────────────────────────────────

/// `f(x) = 0.6 xᵀx + 0.4 (Σᵢ xᵢ)²`.
#[derive(Clone)]
pub struct Sargan {
    meta: FunctionMeta,
}

impl Sargan {
    /// Create a Sargan function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size).strong_convexity(1.2) }
    }
}

impl Function for Sargan {
    fn name(&self) -> String {
        format!("sargan[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let xsum = x.sum();
        if let Some(gx) = gx {
            *gx = &(1.2 * x) + &Vector::constant(x.size(), 0.8 * xsum);
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::from_fn(x.size(), x.size(), |_, _| 0.8);
            for i in 0..x.size() {
                hessian[(i, i)] += 1.2;
            }
            *hx = hessian;
        }
        0.6 * x.dot(x) + 0.4 * xsum * xsum
    }
}

// ── Zakharov ──────────────────────────────────────────────────────────────────

/// `f(x) = xᵀx + (bᵀx)² + (bᵀx)⁴` with `bᵢ = (i+1)/2`.
#[derive(Clone)]
pub struct Zakharov {
    meta: FunctionMeta,
    bias: Vector,
}

impl Zakharov {
    /// Create a Zakharov function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            meta: convex_smooth(size),
            bias: Vector::from_fn(size, |i| 0.5 * (i + 1) as Real),
        }
    }
}

impl Function for Zakharov {
    fn name(&self) -> String {
        format!("zakharov[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        Optimum { x: Some(Vector::zeros(self.size())), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let u = x.dot(x);
        let v = x.dot(&self.bias);
        if let Some(gx) = gx {
            *gx = &(2.0 * x) + &((2.0 * v + 4.0 * v * v * v) * &self.bias);
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::from_diagonal(&Vector::constant(x.size(), 2.0));
            hessian.rank1_update(2.0 + 12.0 * v * v, &self.bias, &self.bias);
            *hx = hessian;
        }
        u + v * v + v * v * v * v
    }
}

// ── Trid ──────────────────────────────────────────────────────────────────────

/// `f(x) = Σᵢ (xᵢ − 1)² − Σᵢ xᵢ·xᵢ₊₁`.
#[derive(Clone)]
pub struct Trid {
    meta: FunctionMeta,
}

impl Trid {
    /// Create a Trid function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_smooth(size) }
    }
}

impl Function for Trid {
    fn name(&self) -> String {
        format!("trid[{}]", self.size())
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size)))
    }

    fn optimum(&self) -> Optimum {
        let n = self.size() as Real;
        Optimum {
            x: Some(Vector::from_fn(self.size(), |i| {
                let i = (i + 1) as Real;
                i * (n + 1.0 - i)
            })),
            fx: Some(-n * (n + 4.0) * (n - 1.0) / 6.0),
        }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let n = x.size();
        let mut fx = 0.0;
        for i in 0..n {
            fx += (x[i] - 1.0) * (x[i] - 1.0);
            if i + 1 < n {
                fx -= x[i] * x[i + 1];
            }
        }
        if let Some(gx) = gx {
            for i in 0..n {
                gx[i] = 2.0 * (x[i] - 1.0);
                if i > 0 {
                    gx[i] -= x[i - 1];
                }
                if i + 1 < n {
                    gx[i] -= x[i + 1];
                }
            }
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::from_diagonal(&Vector::constant(n, 2.0));
            for i in 0..n.saturating_sub(1) {
                hessian[(i, i + 1)] = -1.0;
                hessian[(i + 1, i)] = -1.0;
            }
            *hx = hessian;
        }
        fx
    }
}

// ── Geometric optimization ────────────────────────────────────────────────────

/// `f(x) = Σᵢ exp(aᵢ + Aᵢ·x)` with random seeded coefficients.
#[derive(Clone)]
pub struct Geometric {
    meta: FunctionMeta,
    a: Vector,
    matrix: Matrix,
    seed: u64,
}

impl Geometric {
    /// Create a geometric optimization function of the given dimension.
    pub fn new(size: usize, seed: u64) -> Self {
        let mut rng = make_rng(seed);
        let summands = size.max(1);
        Self {
            meta: convex_smooth(size),
            a: make_random_vector(summands, -1.0, 1.0, &mut rng),
            matrix: make_random_matrix(summands, size, -1.0, 1.0, &mut rng).scale(1.0 / size as Real),
            seed,
        }
    }
}

impl Function for Geometric {
    fn name(&self) -> String {
        format!("geometric[{},seed={}]", self.size(), self.seed)
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size, self.seed)))
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let exponents = (&self.a + &self.matrix.mul_vec(x)).map(Real::exp);
        if let Some(gx) = gx {
            *gx = self.matrix.tr_mul_vec(&exponents);
        }
        if let Some(hx) = hx {
            // Aᵀ diag(e) A
            let scaled = Matrix::from_fn(self.matrix.rows(), self.matrix.cols(), |i, j| {
                exponents[i] * self.matrix[(i, j)]
            });
            *hx = &self.matrix.transpose() * &scaled;
        }
        exponents.sum()
    }
}

// ── Random convex quadratic ───────────────────────────────────────────────────

/// `f(x) = aᵀx + ½ xᵀA x` with a random seeded positive semi-definite `A`.
#[derive(Clone)]
pub struct Quadratic {
    meta: FunctionMeta,
    a: Vector,
    matrix: Matrix,
    seed: u64,
}

impl Quadratic {
    /// Create a random convex quadratic of the given dimension.
    pub fn new(size: usize, seed: u64) -> Self {
        let mut rng = make_rng(seed);
        let a = make_random_vector(size, -1.0, 1.0, &mut rng);
        let basis = make_random_matrix(size, size, -1.0, 1.0, &mut rng);
        // AᵀA is positive semi-definite, keeping the function convex
        let matrix = (&basis.transpose() * &basis).scale(1.0 / size as Real);
        Self { meta: convex_smooth(size), a, matrix, seed }
    }
}

impl Function for Quadratic {
    fn name(&self) -> String {
        format!("quadratic[{},seed={}]", self.size(), self.seed)
    }

    fn meta(&self) -> &FunctionMeta {
        &self.meta
    }

    fn clone_dyn(&self) -> Box<dyn Function> {
        Box::new(self.clone())
    }

    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        Some(Box::new(Self::new(size, self.seed)))
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let ax = self.matrix.mul_vec(x);
        if let Some(gx) = gx {
            *gx = &self.a + &ax;
        }
        if let Some(hx) = hx {
            *hx = self.matrix.clone();
        }
        x.dot(&self.a) + 0.5 * x.dot(&ax)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::gradient_accuracy;
    use nl_core::make_rng;

    fn check_gradient(function: &dyn Function) {
        let mut rng = make_rng(13);
        for _ in 0..4 {
            let x = make_random_vector(function.size(), -2.0, 2.0, &mut rng);
            let accuracy = gradient_accuracy(function, &x);
            assert!(accuracy < 1e-6, "{}: gradient accuracy {accuracy}", function.name());
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        for size in [2, 5, 8] {
            check_gradient(&Sphere::new(size));
            check_gradient(&AxisEllipsoid::new(size));
            check_gradient(&RotatedEllipsoid::new(size));
            check_gradient(&SchumerSteiglitz::new(size));
            check_gradient(&ChungReynolds::new(size));
            check_gradient(&Exponential::new(size));
            check_gradient(&Sargan::new(size));
            check_gradient(&Zakharov::new(size));
            check_gradient(&Trid::new(size));
            check_gradient(&Geometric::new(size, 42));
            check_gradient(&Quadratic::new(size, 42));
        }
    }

    #[test]
    fn optima_evaluate_to_declared_values() {
        for size in [2, 7] {
            let functions: Vec<Box<dyn Function>> = vec![
                Box::new(Sphere::new(size)),
                Box::new(AxisEllipsoid::new(size)),
                Box::new(Exponential::new(size)),
                Box::new(Trid::new(size)),
            ];
            for function in functions {
                let optimum = function.optimum();
                let x = optimum.x.expect("known minimizer");
                let fx = optimum.fx.expect("known minimum");
                assert!(
                    (function.value(&x) - fx).abs() < 1e-10,
                    "{}: f(x*) != fx*",
                    function.name()
                );
            }
        }
    }

    #[test]
    fn trid_optimum_is_stationary() {
        let function = Trid::new(6);
        let x = function.optimum().x.unwrap();
        let mut gx = Vector::zeros(6);
        function.vgrad(&x, &mut gx);
        assert!(gx.lp_norm_inf() < 1e-10);
    }
}
