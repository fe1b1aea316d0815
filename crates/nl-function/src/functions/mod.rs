//! The benchmark function corpus.
//!
//! Smooth convex, smooth nonconvex and nonsmooth convex test functions with
//! analytic gradients (and Hessians where cheap), used by the solver test
//! suites and enumerable through [`crate::BenchmarkBuilder`].

mod nonconvex;
mod nonsmooth;
mod smooth;

pub use nonconvex::{Cauchy, DixonPrice, Powell, Qing, Rosenbrock, StyblinskiTang};
pub use nonsmooth::{ChainedCb3II, ChainedLq, Kinks, MaxHilb, MaxQ};
pub use smooth::{
    AxisEllipsoid, ChungReynolds, Exponential, Geometric, Quadratic, RotatedEllipsoid, Sargan,
    SchumerSteiglitz, Sphere, Trid, Zakharov,
};

use nl_core::{Real, Rng};
use nl_tensor::{Matrix, Vector};
use rand::Rng as _;

pub(crate) fn make_random_vector(size: usize, lo: Real, hi: Real, rng: &mut Rng) -> Vector {
    Vector::from_fn(size, |_| rng.gen_range(lo..hi))
}

pub(crate) fn make_random_matrix(rows: usize, cols: usize, lo: Real, hi: Real, rng: &mut Rng) -> Matrix {
    Matrix::from_fn(rows, cols, |_, _| rng.gen_range(lo..hi))
}
