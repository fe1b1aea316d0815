//! # nl-solver
//!
//! The optimization engine of nonlin-rs: initial step-length strategies and
//! Wolfe-condition step refiners, the shared solver state, smooth solvers
//! (gradient descent, L-BFGS, nonlinear conjugate gradients, Newton),
//! nonsmooth solvers (subgradient, ellipsoid, OSGA, FGM, dual averaging,
//! proximal bundle, gradient sampling), the primal-dual interior-point
//! solver for linear and quadratic programs, and the penalty /
//! augmented-Lagrangian drivers for general nonlinear constraints.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod augmented;
pub mod bundle;
pub mod cgd;
pub mod ellipsoid;
pub mod fgm;
pub mod gd;
pub mod gsample;
pub mod interior;
pub mod lbfgs;
pub mod lsearch0;
pub mod lsearchk;
pub mod newton;
pub mod osga;
pub mod pdsgm;
pub mod penalty;
pub mod sgm;
pub mod solver;
pub mod state;

pub use interior::SolverIpm;
pub use lsearch0::{lsearch0s, Lsearch0};
pub use lsearchk::{lsearchks, Lsearchk};
pub use solver::{solvers, Logger, Solver};
pub use state::{NonsmoothState, SolverState, Status};
