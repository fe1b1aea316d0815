//! Nonsmooth convex benchmark functions.
//!
//! At kinks the returned gradient is any subgradient of the convex
//! subdifferential.

use super::make_random_matrix;
use crate::function::{Convexity, Function, FunctionMeta, Optimum, Smoothness};
use nl_core::{make_rng, Real};
use nl_tensor::{Matrix, Vector};

fn convex_nonsmooth(size: usize) -> FunctionMeta {
    FunctionMeta::new(size).convex(Convexity::Convex).smooth(Smoothness::Nonsmooth)
}

fn median(mut values: Vec<Real>) -> Real {
    values.sort_by(Real::total_cmp);
    values[values.len() / 2]
}

// ── Kinks ─────────────────────────────────────────────────────────────────────

/// Sum of absolute deviations from seeded random kink locations, shifted so
/// that the minimum value is zero.
#[derive(Clone)]
pub struct Kinks {
    meta: FunctionMeta,
    kinks: Matrix,
    offset: Real,
    seed: u64,
}

impl Kinks {
    /// Create a kinks function of the given dimension.
    pub fn new(size: usize, seed: u64) -> Self {
        let mut rng = make_rng(seed);
        let rows = ((size as Real).sqrt() as usize).max(1);
        let kinks = make_random_matrix(rows, size, -1.0, 1.0, &mut rng);

        let mut offset = 0.0;
        for j in 0..size {
            let column: Vec<Real> = (0..rows).map(|i| kinks[(i, j)]).collect();
            let opt = median(column.clone());
            offset += column.iter().map(|v| (v - opt).abs()).sum::<Real>();
        }
        Self { meta: convex_nonsmooth(size), kinks, offset, seed }
    }
}

impl Function for Kinks {
    fn name(&self) -> String {
        format!("kinks[{},seed={}]", self.size(), self.seed)
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

    fn optimum(&self) -> Optimum {
        let rows = self.kinks.rows();
        let x = Vector::from_fn(self.size(), |j| {
            median((0..rows).map(|i| self.kinks[(i, j)]).collect())
        });
        Optimum { x: Some(x), fx: Some(0.0) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        if let Some(gx) = gx {
            gx.fill(0.0);
            for i in 0..self.kinks.rows() {
                for j in 0..x.size() {
                    gx[j] += (x[j] - self.kinks[(i, j)]).signum();
                }
            }
        }
        let mut fx = -self.offset;
        for i in 0..self.kinks.rows() {
            for j in 0..x.size() {
                fx += (x[j] - self.kinks[(i, j)]).abs();
            }
        }
        fx
    }
}

// ── MaxQ ──────────────────────────────────────────────────────────────────────

/// `f(x) = maxᵢ xᵢ²`.
#[derive(Clone)]
pub struct MaxQ {
    meta: FunctionMeta,
}

impl MaxQ {
    /// Create a MaxQ function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self { meta: convex_nonsmooth(size) }
    }
}

impl Function for MaxQ {
    fn name(&self) -> String {
        format!("maxq[{}]", self.size())
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

        let mut best = 0usize;
        let mut fx = 0.0;
        for i in 0..x.size() {
            let v = x[i] * x[i];
            if v > fx {
                fx = v;
                best = i;
            }
        }
        if let Some(gx) = gx {
            gx.fill(0.0);
            gx[best] = 2.0 * x[best];
        }
        fx
    }
}

// ── MaxHilb ───────────────────────────────────────────────────────────────────

/// `f(x) = maxᵢ |(H x)ᵢ|` with the Hilbert matrix `Hᵢⱼ = 1/(i+j+1)`.
#[derive(Clone)]
pub struct MaxHilb {
    meta: FunctionMeta,
    weights: Matrix,
}

impl MaxHilb {
    /// Create a MaxHilb function of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            meta: convex_nonsmooth(size),
            weights: Matrix::from_fn(size, size, |i, j| 1.0 / (i + j + 1) as Real),
        }
    }
}

impl Function for MaxHilb {
    fn name(&self) -> String {
        format!("maxhilb[{}]", self.size())
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

        let products = self.weights.mul_vec(x);
        let mut best = 0usize;
        let mut fx = 0.0;
        for i in 0..products.size() {
            if products[i].abs() > fx {
                fx = products[i].abs();
                best = i;
            }
        }
        if let Some(gx) = gx {
            let sign = if products[best] < 0.0 { -1.0 } else { 1.0 };
            *gx = sign * &self.weights.row(best);
        }
        fx
    }
}

// ── Chained LQ ────────────────────────────────────────────────────────────────

/// `f(x) = Σᵢ max(−xᵢ − xᵢ₊₁, −xᵢ − xᵢ₊₁ + xᵢ² + xᵢ₊₁² − 1)`.
#[derive(Clone)]
pub struct ChainedLq {
    meta: FunctionMeta,
}

impl ChainedLq {
    /// Create a chained LQ function (at least 2-dimensional).
    pub fn new(size: usize) -> Self {
        Self { meta: convex_nonsmooth(size.max(2)) }
    }
}

impl Function for ChainedLq {
    fn name(&self) -> String {
        format!("chained-lq[{}]", self.size())
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
        let n = self.size();
        Optimum {
            x: Some(Vector::constant(n, std::f64::consts::FRAC_1_SQRT_2)),
            fx: Some(-((n - 1) as Real) * std::f64::consts::SQRT_2),
        }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        let n = x.size();
        let values = |i: usize| {
            let v1 = -x[i] - x[i + 1];
            let v2 = v1 + x[i] * x[i] + x[i + 1] * x[i + 1] - 1.0;
            (v1, v2)
        };

        if let Some(gx) = gx {
            gx.fill(0.0);
            for i in 0..n - 1 {
                let (v1, v2) = values(i);
                if v2 > v1 {
                    gx[i] += -1.0 + 2.0 * x[i];
                    gx[i + 1] += -1.0 + 2.0 * x[i + 1];
                } else {
                    gx[i] += -1.0;
                    gx[i + 1] += -1.0;
                }
            }
        }
        let mut fx = 0.0;
        for i in 0..n - 1 {
            let (v1, v2) = values(i);
            fx += v1.max(v2);
        }
        fx
    }
}

// ── Chained CB3 II ────────────────────────────────────────────────────────────

/// `f(x) = max(Σ xᵢ⁴+xᵢ₊₁², Σ (2−xᵢ)²+(2−xᵢ₊₁)², Σ 2e^{−xᵢ+xᵢ₊₁})` — the
/// maximum is taken over the three full sums.
#[derive(Clone)]
pub struct ChainedCb3II {
    meta: FunctionMeta,
}

impl ChainedCb3II {
    /// Create a chained CB3-II function (at least 2-dimensional).
    pub fn new(size: usize) -> Self {
        Self { meta: convex_nonsmooth(size.max(2)) }
    }
}

impl Function for ChainedCb3II {
    fn name(&self) -> String {
        format!("chained-cb3ii[{}]", self.size())
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
        let n = self.size();
        Optimum { x: Some(Vector::constant(n, 1.0)), fx: Some(2.0 * (n - 1) as Real) }
    }

    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        assert!(hx.is_none(), "{}: Hessian not available", self.name());

        let n = x.size();
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        let mut s3 = 0.0;
        for i in 0..n - 1 {
            s1 += x[i] * x[i] * x[i] * x[i] + x[i + 1] * x[i + 1];
            s2 += (2.0 - x[i]) * (2.0 - x[i]) + (2.0 - x[i + 1]) * (2.0 - x[i + 1]);
            s3 += 2.0 * (-x[i] + x[i + 1]).exp();
        }
        let fx = s1.max(s2).max(s3);

        if let Some(gx) = gx {
            gx.fill(0.0);
            for i in 0..n - 1 {
                if fx == s1 {
                    gx[i] += 4.0 * x[i] * x[i] * x[i];
                    gx[i + 1] += 2.0 * x[i + 1];
                } else if fx == s2 {
                    gx[i] -= 2.0 * (2.0 - x[i]);
                    gx[i + 1] -= 2.0 * (2.0 - x[i + 1]);
                } else {
                    let e = 2.0 * (-x[i] + x[i + 1]).exp();
                    gx[i] -= e;
                    gx[i + 1] += e;
                }
            }
        }
        fx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::gradient_accuracy;
    use crate::functions::make_random_vector;
    use nl_core::make_rng;

    fn check_subgradient_away_from_kinks(function: &dyn Function) {
        // at a random point the function is almost surely differentiable,
        // so the subgradient must match the finite-difference gradient
        let mut rng = make_rng(23);
        let x = make_random_vector(function.size(), -1.8, 1.7, &mut rng);
        let accuracy = gradient_accuracy(function, &x);
        assert!(accuracy < 1e-6, "{}: gradient accuracy {accuracy}", function.name());
    }

    #[test]
    fn subgradients_match_finite_differences() {
        for size in [3, 6] {
            check_subgradient_away_from_kinks(&Kinks::new(size, 42));
            check_subgradient_away_from_kinks(&MaxQ::new(size));
            check_subgradient_away_from_kinks(&MaxHilb::new(size));
            check_subgradient_away_from_kinks(&ChainedLq::new(size));
            check_subgradient_away_from_kinks(&ChainedCb3II::new(size));
        }
    }

    #[test]
    fn declared_optima_are_lower_bounds() {
        let mut rng = make_rng(29);
        let functions: Vec<Box<dyn Function>> = vec![
            Box::new(Kinks::new(5, 42)),
            Box::new(MaxQ::new(5)),
            Box::new(MaxHilb::new(5)),
            Box::new(ChainedLq::new(5)),
            Box::new(ChainedCb3II::new(5)),
        ];
        for function in functions {
            let optimum = function.optimum();
            let fstar = function.value(&optimum.x.unwrap());
            if let Some(fx) = optimum.fx {
                assert!((fstar - fx).abs() < 1e-10, "{}: f(x*) != fx*", function.name());
            }
            for _ in 0..8 {
                let x = make_random_vector(function.size(), -2.0, 2.0, &mut rng);
                assert!(
                    function.value(&x) >= fstar - 1e-10,
                    "{}: found a point below the declared optimum",
                    function.name()
                );
            }
        }
    }

    #[test]
    fn chained_lq_optimum() {
        let function = ChainedLq::new(4);
        let optimum = function.optimum();
        assert!((function.value(&optimum.x.unwrap()) - optimum.fx.unwrap()).abs() < 1e-12);
    }
}
