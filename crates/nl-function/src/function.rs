//! The objective function abstraction.
//!
//! A [`Function`] is a scalar objective `f: Rⁿ → R` with an optional
//! gradient and Hessian, convexity/smoothness metadata, strong convexity
//! modulus, an attached constraint set and atomic evaluation counters.
//! Functions are logically immutable during evaluation except for the
//! counter increments, so they can be shared freely across threads.

use crate::constraints::ConstraintSet;
use nl_core::Real;
use nl_tensor::{Matrix, Vector};
use std::sync::atomic::{AtomicU64, Ordering};

/// Convexity flag of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convexity {
    /// The function is convex.
    Convex,
    /// The function is not convex.
    Nonconvex,
    /// Convexity is unknown or irrelevant.
    Ignore,
}

/// Smoothness flag of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoothness {
    /// The gradient is defined everywhere.
    Smooth,
    /// Only subgradients are available at some points.
    Nonsmooth,
}

/// The known optimum of a benchmark function, when available.
#[derive(Debug, Clone, Default)]
pub struct Optimum {
    /// A global minimizer, if known.
    pub x: Option<Vector>,
    /// The global minimum value, if known.
    pub fx: Option<Real>,
}

/// Metadata shared by every function: dimension, flags, constraints and
/// evaluation counters.
#[derive(Debug)]
pub struct FunctionMeta {
    size: usize,
    convexity: Convexity,
    smoothness: Smoothness,
    strong_convexity: Real,
    constraints: ConstraintSet,
    fcalls: AtomicU64,
    gcalls: AtomicU64,
    hcalls: AtomicU64,
}

impl Clone for FunctionMeta {
    fn clone(&self) -> Self {
        Self {
            size: self.size,
            convexity: self.convexity,
            smoothness: self.smoothness,
            strong_convexity: self.strong_convexity,
            constraints: self.constraints.clone(),
            fcalls: AtomicU64::new(self.fcalls()),
            gcalls: AtomicU64::new(self.gcalls()),
            hcalls: AtomicU64::new(self.hcalls()),
        }
    }
}

impl FunctionMeta {
    /// Create metadata for an `size`-dimensional function; defaults to
    /// nonconvex and smooth with no constraints.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            convexity: Convexity::Nonconvex,
            smoothness: Smoothness::Smooth,
            strong_convexity: 0.0,
            constraints: ConstraintSet::new(size),
            fcalls: AtomicU64::new(0),
            gcalls: AtomicU64::new(0),
            hcalls: AtomicU64::new(0),
        }
    }

    /// Declare the convexity flag.
    pub fn convex(mut self, convexity: Convexity) -> Self {
        self.convexity = convexity;
        self
    }

    /// Declare the smoothness flag.
    pub fn smooth(mut self, smoothness: Smoothness) -> Self {
        self.smoothness = smoothness;
        self
    }

    /// Declare the strong convexity modulus; a positive value implies
    /// convexity.
    pub fn strong_convexity(mut self, rho: Real) -> Self {
        assert!(rho >= 0.0);
        self.strong_convexity = rho;
        if rho > 0.0 {
            self.convexity = Convexity::Convex;
        }
        self
    }

    /// Attach a constraint set (construction time only).
    pub fn constraints(mut self, constraints: ConstraintSet) -> Self {
        assert_eq!(constraints.size(), self.size);
        self.constraints = constraints;
        self
    }

    /// Dimension of the domain.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of function value evaluations so far.
    pub fn fcalls(&self) -> u64 {
        self.fcalls.load(Ordering::Relaxed)
    }

    /// Number of gradient evaluations so far.
    pub fn gcalls(&self) -> u64 {
        self.gcalls.load(Ordering::Relaxed)
    }

    /// Number of Hessian evaluations so far.
    pub fn hcalls(&self) -> u64 {
        self.hcalls.load(Ordering::Relaxed)
    }
}

/// A scalar objective function `f: Rⁿ → R`.
///
/// Implementors provide [`Function::do_evaluate`]; callers go through
/// [`Function::evaluate`], which validates shapes and maintains the
/// evaluation counters. For nonsmooth functions the returned gradient is any
/// subgradient (an element of the convex subdifferential in the convex
/// case).
pub trait Function: Send + Sync {
    /// Human-readable identifier.
    fn name(&self) -> String;

    /// Shared metadata.
    fn meta(&self) -> &FunctionMeta;

    /// Clone into a boxed trait object.
    fn clone_dyn(&self) -> Box<dyn Function>;

    /// Compute the function value at `x`, filling in the gradient and the
    /// Hessian when requested. Shapes are validated by [`Function::evaluate`].
    fn do_evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real;

    /// Rebuild this function with another dimension, where supported.
    fn make(&self, size: usize) -> Option<Box<dyn Function>> {
        let _ = size;
        None
    }

    /// The known optimum, when available.
    fn optimum(&self) -> Optimum {
        Optimum::default()
    }

    /// Dimension of the domain.
    fn size(&self) -> usize {
        self.meta().size()
    }

    /// Evaluate the function at `x`, optionally with gradient and Hessian.
    ///
    /// Every call increments `fcalls`; `gcalls`/`hcalls` are incremented when
    /// the corresponding output is requested. Dimension mismatches are
    /// programming errors and panic with a descriptive message.
    fn evaluate(&self, x: &Vector, gx: Option<&mut Vector>, hx: Option<&mut Matrix>) -> Real {
        let n = self.size();
        let meta = self.meta();
        assert_eq!(x.size(), n, "{}: expected {n}-dimensional input", self.name());

        meta.fcalls.fetch_add(1, Ordering::Relaxed);
        if let Some(gx) = &gx {
            assert_eq!(gx.size(), n, "{}: expected {n}-dimensional gradient", self.name());
            meta.gcalls.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(hx) = &hx {
            assert_eq!(
                (hx.rows(), hx.cols()),
                (n, n),
                "{}: expected {n}x{n} Hessian",
                self.name()
            );
            meta.hcalls.fetch_add(1, Ordering::Relaxed);
        }
        self.do_evaluate(x, gx, hx)
    }

    /// Function value only.
    fn value(&self, x: &Vector) -> Real {
        self.evaluate(x, None, None)
    }

    /// Function value and gradient.
    fn vgrad(&self, x: &Vector, gx: &mut Vector) -> Real {
        self.evaluate(x, Some(gx), None)
    }

    /// Declared convexity.
    fn convexity(&self) -> Convexity {
        self.meta().convexity
    }

    /// Declared smoothness.
    fn smoothness(&self) -> Smoothness {
        self.meta().smoothness
    }

    /// Strong convexity modulus (0 when not strongly convex).
    fn strong_convexity(&self) -> Real {
        self.meta().strong_convexity
    }

    /// The attached constraint set.
    fn constraints(&self) -> &ConstraintSet {
        &self.meta().constraints
    }

    /// Return `true` if `x` satisfies all constraints within `tol`.
    fn valid(&self, x: &Vector, tol: Real) -> bool {
        self.constraints().valid(x, tol)
    }

    /// Maximum constraint violation at `x` (0 when unconstrained).
    fn constraint_residual(&self, x: &Vector) -> Real {
        self.constraints().residual(x)
    }

    /// Total number of evaluations charged to this function.
    fn evals(&self) -> u64 {
        let meta = self.meta();
        meta.fcalls() + meta.gcalls() + meta.hcalls()
    }
}

impl Clone for Box<dyn Function> {
    fn clone(&self) -> Self {
        self.clone_dyn()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct HalfSquare {
        meta: FunctionMeta,
    }

    impl HalfSquare {
        fn new(size: usize) -> Self {
            Self {
                meta: FunctionMeta::new(size)
                    .convex(Convexity::Convex)
                    .strong_convexity(1.0),
            }
        }
    }

    impl Function for HalfSquare {
        fn name(&self) -> String {
            "half-square".into()
        }

        fn meta(&self) -> &FunctionMeta {
            &self.meta
        }

        fn clone_dyn(&self) -> Box<dyn Function> {
            Box::new(self.clone())
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

    #[test]
    fn counters_are_monotone() {
        let function = HalfSquare::new(3);
        let x = Vector::from_slice(&[1.0, 2.0, 3.0]);
        let mut g = Vector::zeros(3);
        let mut h = Matrix::zeros(3, 3);

        assert_eq!(function.value(&x), 7.0);
        assert_eq!(function.meta().fcalls(), 1);
        assert_eq!(function.meta().gcalls(), 0);

        function.vgrad(&x, &mut g);
        assert_eq!(function.meta().fcalls(), 2);
        assert_eq!(function.meta().gcalls(), 1);
        assert_eq!(g.as_slice(), x.as_slice());

        function.evaluate(&x, None, Some(&mut h));
        assert_eq!(function.meta().hcalls(), 1);
    }

    #[test]
    fn strong_convexity_implies_convex() {
        let function = HalfSquare::new(2);
        assert_eq!(function.convexity(), Convexity::Convex);
        assert_eq!(function.strong_convexity(), 1.0);
    }

    #[test]
    fn cloned_functions_carry_counters() {
        let function = HalfSquare::new(2);
        function.value(&Vector::zeros(2));
        let cloned = function.clone_dyn();
        assert_eq!(cloned.meta().fcalls(), 1);
    }

    #[test]
    #[should_panic(expected = "expected 3-dimensional input")]
    fn dimension_mismatch_panics() {
        let function = HalfSquare::new(3);
        function.value(&Vector::zeros(2));
    }
}
