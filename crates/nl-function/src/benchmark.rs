//! Benchmark corpus enumeration and derivative checking.

use crate::function::{Convexity, Function, Smoothness};
use crate::functions::*;
use nl_core::Real;
use nl_tensor::{Matrix, Vector};

/// Which part of the corpus to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFilter {
    /// Every registered function.
    Any,
    /// Only smooth functions.
    Smooth,
    /// Only nonsmooth functions.
    Nonsmooth,
    /// Only convex functions.
    Convex,
    /// Only convex smooth functions.
    ConvexSmooth,
    /// Only convex nonsmooth functions.
    ConvexNonsmooth,
}

impl FunctionFilter {
    fn matches(self, function: &dyn Function) -> bool {
        let convex = function.convexity() == Convexity::Convex;
        let smooth = function.smoothness() == Smoothness::Smooth;
        match self {
            FunctionFilter::Any => true,
            FunctionFilter::Smooth => smooth,
            FunctionFilter::Nonsmooth => !smooth,
            FunctionFilter::Convex => convex,
            FunctionFilter::ConvexSmooth => convex && smooth,
            FunctionFilter::ConvexNonsmooth => convex && !smooth,
        }
    }
}

/// Enumerates the benchmark corpus over a dimension sweep.
#[derive(Debug, Clone)]
pub struct BenchmarkBuilder {
    min_dims: usize,
    max_dims: usize,
    filter: FunctionFilter,
    seed: u64,
}

impl Default for BenchmarkBuilder {
    fn default() -> Self {
        Self { min_dims: 4, max_dims: 16, filter: FunctionFilter::Any, seed: 42 }
    }
}

impl BenchmarkBuilder {
    /// Create a builder with the default `[4, 16]` dimension sweep.
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest dimension to enumerate.
    pub fn min_dims(mut self, min_dims: usize) -> Self {
        self.min_dims = min_dims.max(1);
        self
    }

    /// Largest dimension to enumerate.
    pub fn max_dims(mut self, max_dims: usize) -> Self {
        self.max_dims = max_dims.max(1);
        self
    }

    /// Restrict the corpus by convexity/smoothness.
    pub fn filter(mut self, filter: FunctionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Seed forwarded to the randomized corpus members.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Instantiate the corpus: all registered functions for every
    /// power-of-two dimension in `[min_dims, max_dims]`.
    pub fn build(&self) -> Vec<Box<dyn Function>> {
        let mut functions: Vec<Box<dyn Function>> = Vec::new();
        let mut dims = self.min_dims;
        while dims <= self.max_dims {
            self.append(dims, &mut functions);
            if dims == usize::MAX / 2 {
                break;
            }
            dims *= 2;
        }
        functions
    }

    fn append(&self, dims: usize, out: &mut Vec<Box<dyn Function>>) {
        let seed = self.seed;
        let all: Vec<Box<dyn Function>> = vec![
            Box::new(Sphere::new(dims)),
            Box::new(AxisEllipsoid::new(dims)),
            Box::new(RotatedEllipsoid::new(dims)),
            Box::new(SchumerSteiglitz::new(dims)),
            Box::new(ChungReynolds::new(dims)),
            Box::new(Exponential::new(dims)),
            Box::new(Sargan::new(dims)),
            Box::new(Zakharov::new(dims)),
            Box::new(Trid::new(dims)),
            Box::new(Geometric::new(dims, seed)),
            Box::new(Quadratic::new(dims, seed)),
            Box::new(Rosenbrock::new(dims)),
            Box::new(Powell::new(dims)),
            Box::new(Qing::new(dims)),
            Box::new(Cauchy::new(dims)),
            Box::new(StyblinskiTang::new(dims)),
            Box::new(DixonPrice::new(dims)),
            Box::new(Kinks::new(dims, seed)),
            Box::new(MaxQ::new(dims)),
            Box::new(MaxHilb::new(dims)),
            Box::new(ChainedLq::new(dims)),
            Box::new(ChainedCb3II::new(dims)),
        ];
        for function in all {
            if self.filter.matches(function.as_ref()) {
                out.push(function);
            }
        }
    }
}

/// Relative disagreement between the analytic gradient and a central
/// finite-difference approximation at `x`.
pub fn gradient_accuracy(function: &dyn Function, x: &Vector) -> Real {
    let n = function.size();
    let mut gx = Vector::zeros(n);
    function.vgrad(x, &mut gx);

    let mut approx = Vector::zeros(n);
    for i in 0..n {
        let step = 1e-6 * x[i].abs().max(1.0);
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp[i] += step;
        xm[i] -= step;
        approx[i] = (function.value(&xp) - function.value(&xm)) / (2.0 * step);
    }
    (&gx - &approx).lp_norm_inf() / gx.lp_norm_inf().max(1.0)
}

/// Relative disagreement between the analytic Hessian and a central
/// finite-difference approximation of the gradient at `x`.
pub fn hessian_accuracy(function: &dyn Function, x: &Vector) -> Real {
    let n = function.size();
    let mut gx = Vector::zeros(n);
    let mut hx = Matrix::zeros(n, n);
    function.evaluate(x, Some(&mut gx), Some(&mut hx));

    let mut approx = Matrix::zeros(n, n);
    let mut gp = Vector::zeros(n);
    let mut gm = Vector::zeros(n);
    for j in 0..n {
        let step = 1e-5 * x[j].abs().max(1.0);
        let mut xp = x.clone();
        let mut xm = x.clone();
        xp[j] += step;
        xm[j] -= step;
        function.vgrad(&xp, &mut gp);
        function.vgrad(&xm, &mut gm);
        for i in 0..n {
            approx[(i, j)] = (gp[i] - gm[i]) / (2.0 * step);
        }
    }
    (&hx - &approx).lp_norm_inf() / hx.lp_norm_inf().max(1.0)
}
