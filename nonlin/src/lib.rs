//! # nonlin
//!
//! Numerical optimization and machine learning for Rust: smooth, nonsmooth
//! and constrained solvers with linear models and gradient boosting on top.
//!
//! This crate is a **façade** that re-exports all public items from the
//! underlying workspace crates. Application code should depend on this
//! crate rather than the individual `nl-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use nonlin::function::functions::Sphere;
//! use nonlin::solver::{solvers, Logger, Solver as _};
//! use nonlin::tensor::Vector;
//!
//! let function = Sphere::new(5);
//! let lbfgs = solvers().get("lbfgs").unwrap();
//! let state = lbfgs
//!     .minimize(&function, &Vector::constant(5, 3.0), &mut Logger::none())
//!     .unwrap();
//! assert!(state.status().is_converged());
//! assert!(state.x().lp_norm_inf() < 1e-6);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, parameters, registries and stream framing.
pub use nl_core as core;

/// Dense vectors, matrices, rank-N tensors and bit masks.
pub use nl_tensor as tensor;

/// Objective functions, constraints, the benchmark corpus and LP/QP types.
pub use nl_function as function;

/// Line-search machinery and the solver families.
pub use nl_solver as solver;

/// Losses, splitters, tuners, linear models and gradient boosting.
pub use nl_ml as ml;
