//! Smooth nonconvex benchmark functions.

use crate::function::{Convexity, Function, FunctionMeta, Optimum, Smoothness};
use nl_core::Real;
use nl_tensor::{Matrix, Vector};

fn nonconvex_smooth(size: usize) -> FunctionMeta {
    FunctionMeta::new(size).convex(Convexity::Nonconvex).smooth(Smoothness::Smooth)
}

// ── Rosenbrock ────────────────────────────────────────────────────────────────

/// The chained Rosenbrock valley `Σᵢ 100(xᵢ₊₁ − xᵢ²)² + (xᵢ − 1)²`.
#[derive(Clone)]
pub struct Rosenbrock {
    meta: FunctionMeta,
}

impl Rosenbrock {
    /// Create a Rosenbrock function (at least 2-dimensional).
    pub fn new(size: usize) -> Self {
        Self { meta: nonconvex_smooth(size.max(2)) }
    }
}

impl Function for Rosenbrock {
    fn name(&self) -> String {
        format!("rosenbrock[{}]", self.size())
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
        Optimum { x: Some(Vector::constant(self.size(), 1.0)), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let n = x.size();
        let ct = 100.0;

        let mut fx = 0.0;
        for i in 0..n - 1 {
            let u = x[i + 1] - x[i] * x[i];
            let v = x[i] - 1.0;
            fx += ct * u * u + v * v;
        }
        if let Some(gx) = gx {
            gx.fill(0.0);
            for i in 0..n - 1 {
                let u = x[i + 1] - x[i] * x[i];
                gx[i] -= ct * 4.0 * u * x[i] - 2.0 * (x[i] - 1.0);
                gx[i + 1] += ct * 2.0 * u;
            }
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::zeros(n, n);
            for i in 0..n - 1 {
                let xi0 = x[i];
                let xi1 = x[i + 1];
                hessian[(i, i)] += 2.0 - ct * 4.0 * xi1 + ct * 12.0 * xi0 * xi0;
                hessian[(i, i + 1)] -= ct * 4.0 * xi0;
                hessian[(i + 1, i)] -= ct * 4.0 * xi0;
                hessian[(i + 1, i + 1)] += ct * 2.0;
            }
            *hx = hessian;
        }
        fx
    }
}

// ── Powell ────────────────────────────────────────────────────────────────────

/// The Powell singular function over groups of four variables.
#[derive(Clone)]
pub struct Powell {
    meta: FunctionMeta,
}

impl Powell {
    /// Create a Powell function (dimension rounded down to a multiple of 4).
    pub fn new(size: usize) -> Self {
        let size = (size - size % 4).max(4);
        Self { meta: nonconvex_smooth(size) }
    }
}

impl Function for Powell {
    fn name(&self) -> String {
        format!("powell[{}]", self.size())
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
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        let mut fx = 0.0;
        for i4 in (0..self.size()).step_by(4) {
            let u = x[i4] + 10.0 * x[i4 + 1];
            let v = x[i4 + 2] - x[i4 + 3];
            let w = x[i4 + 1] - 2.0 * x[i4 + 2];
            let z = x[i4] - x[i4 + 3];
            fx += u * u + 5.0 * v * v + w * w * w * w + 10.0 * z * z * z * z;
        }
        if let Some(gx) = gx {
            for i4 in (0..self.size()).step_by(4) {
                let gu = 2.0 * (x[i4] + 10.0 * x[i4 + 1]);
                let gv = 10.0 * (x[i4 + 2] - x[i4 + 3]);
                let w = x[i4 + 1] - 2.0 * x[i4 + 2];
                let gw = 4.0 * w * w * w;
                let z = x[i4] - x[i4 + 3];
                let gz = 40.0 * z * z * z;

                gx[i4] = gu + gz;
                gx[i4 + 1] = 10.0 * gu + gw;
                gx[i4 + 2] = gv - 2.0 * gw;
                gx[i4 + 3] = -gv - gz;
            }
        }
        fx
    }
}

// ── Qing ──────────────────────────────────────────────────────────────────────

/// `f(x) = Σᵢ (xᵢ² − (i+1))²`.
#[derive(Clone)]
pub struct Qing {
    meta: FunctionMeta,
    bias: Vector,
}

impl Qing {
    /// Create a Qing function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            meta: nonconvex_smooth(size),
            bias: Vector::from_fn(size, |i| (i + 1) as Real),
        }
    }
}

impl Function for Qing {
    fn name(&self) -> String {
        format!("qing[{}]", self.size())
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
        Optimum { x: Some(self.bias.map(Real::sqrt)), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let mut fx = 0.0;
        for i in 0..x.size() {
            let u = x[i] * x[i] - self.bias[i];
            fx += u * u;
        }
        if let Some(gx) = gx {
            for i in 0..x.size() {
                gx[i] = 4.0 * (x[i] * x[i] - self.bias[i]) * x[i];
            }
        }
        if let Some(hx) = hx {
            *hx = Matrix::from_diagonal(&Vector::from_fn(x.size(), |i| {
                12.0 * x[i] * x[i] - 4.0 * self.bias[i]
            }));
        }
        fx
    }
}

// ── Cauchy ────────────────────────────────────────────────────────────────────

/// `f(x) = log(1 + xᵀx)`.
#[derive(Clone)]
pub struct Cauchy {
    meta: FunctionMeta,
}

impl Cauchy {
    /// Create a Cauchy function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: nonconvex_smooth(size) }
    }
}

impl Function for Cauchy {
    fn name(&self) -> String {
        format!("cauchy[{}]", self.size())
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
        let u = 1.0 + x.dot(x);
        if let Some(gx) = gx {
            *gx = (2.0 / u) * x;
        }
        if let Some(hx) = hx {
            let mut hessian = Matrix::from_diagonal(&Vector::constant(x.size(), 2.0 / u));
            hessian.rank1_update(-4.0 / (u * u), x, x);
            *hx = hessian;
        }
        u.ln()
    }
}

// ── Styblinski-Tang ───────────────────────────────────────────────────────────

/// `f(x) = Σᵢ (xᵢ⁴ − 16xᵢ² + 5xᵢ)`.
#[derive(Clone)]
pub struct StyblinskiTang {
    meta: FunctionMeta,
}

impl StyblinskiTang {
    /// Create a Styblinski-Tang function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: nonconvex_smooth(size) }
    }
}

impl Function for StyblinskiTang {
    fn name(&self) -> String {
        format!("styblinski-tang[{}]", self.size())
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
        // per-dimension minimizer of t⁴ − 16t² + 5t
        Optimum { x: Some(Vector::constant(self.size(), -2.9035340181859203)), fx: None }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        if let Some(gx) = gx {
            *gx = x.map(|v| 4.0 * v * v * v - 32.0 * v + 5.0);
        }
        if let Some(hx) = hx {
            *hx = Matrix::from_diagonal(&x.map(|v| 12.0 * v * v - 32.0));
        }
        x.iter().map(|&v| v * v * v * v - 16.0 * v * v + 5.0 * v).sum()
    }
}

// ── Dixon-Price ───────────────────────────────────────────────────────────────

/// `f(x) = (x₀ − 1)² + Σᵢ (i+1)(2xᵢ² − xᵢ₋₁)²`.
#[derive(Clone)]
pub struct DixonPrice {
    meta: FunctionMeta,
    bias: Vector,
}

impl DixonPrice {
    /// Create a Dixon-Price function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            meta: nonconvex_smooth(size),
            bias: Vector::from_fn(size, |i| (i + 1) as Real),
        }
    }
}

impl Function for DixonPrice {
    fn name(&self) -> String {
        format!("dixon-price[{}]", self.size())
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

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        let n = x.size();
        let mut fx = (x[0] - 1.0) * (x[0] - 1.0);
        for i in 1..n {
            let u = 2.0 * x[i] * x[i] - x[i - 1];
            fx += self.bias[i] * u * u;
        }
        if let Some(gx) = gx {
            gx.fill(0.0);
            gx[0] = 2.0 * (x[0] - 1.0);
            for i in 1..n {
                let weight = self.bias[i] * 2.0 * (2.0 * x[i] * x[i] - x[i - 1]);
                gx[i] += weight * 4.0 * x[i];
                gx[i - 1] -= weight;
            }
        }
        fx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::{gradient_accuracy, hessian_accuracy};
    use crate::functions::make_random_vector;
    use nl_core::make_rng;

    fn check_gradient(function: &dyn Function) {
        let mut rng = make_rng(17);
        for _ in 0..4 {
            let x = make_random_vector(function.size(), -2.0, 2.0, &mut rng);
            let accuracy = gradient_accuracy(function, &x);
            assert!(accuracy < 1e-6, "{}: gradient accuracy {accuracy}", function.name());
        }
    }

    #[test]
    fn gradients_match_finite_differences() {
        for size in [4, 8] {
            check_gradient(&Rosenbrock::new(size));
            check_gradient(&Powell::new(size));
            check_gradient(&Qing::new(size));
            check_gradient(&Cauchy::new(size));
            check_gradient(&StyblinskiTang::new(size));
            check_gradient(&DixonPrice::new(size));
        }
    }

    #[test]
    fn hessians_match_finite_differences() {
        let mut rng = make_rng(19);
        for function in [&Rosenbrock::new(4) as &dyn Function, &Cauchy::new(4), &Qing::new(4)] {
            let x = make_random_vector(function.size(), -1.5, 1.5, &mut rng);
            let accuracy = hessian_accuracy(function, &x);
            assert!(accuracy < 1e-4, "{}: hessian accuracy {accuracy}", function.name());
        }
    }

    #[test]
    fn rosenbrock_minimum_is_flat() {
        let function = Rosenbrock::new(5);
        let optimum = function.optimum();
        let x = optimum.x.unwrap();
        assert!(function.value(&x).abs() < 1e-14);
        let mut gx = Vector::zeros(5);
        function.vgrad(&x, &mut gx);
        assert!(gx.lp_norm_inf() < 1e-12);
    }

    #[test]
    fn powell_rounds_dimension() {
        assert_eq!(Powell::new(4).size(), 4);
        assert_eq!(Powell::new(7).size(), 4);
        assert_eq!(Powell::new(9).size(), 8);
    }
}
