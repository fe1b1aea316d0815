//! # nl-function
//!
//! The contract between scalar objective functions and the solvers: the
//! [`Function`] trait with convexity/smoothness metadata and evaluation
//! counters, attached constraint sets, the benchmark corpus used by the test
//! suite, and the linear/quadratic program types consumed by the
//! interior-point solver.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod benchmark;
pub mod constraints;
pub mod function;
pub mod functions;
pub mod program;

pub use benchmark::{gradient_accuracy, hessian_accuracy, BenchmarkBuilder, FunctionFilter};
pub use constraints::{ConstraintSet, LinearEquality, LinearInequality, QuadraticConstraint};
pub use function::{Convexity, Function, FunctionMeta, Optimum, Smoothness};
pub use program::{LinearProgram, QuadraticProgram};
