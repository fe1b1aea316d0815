//! # nl-core
//!
//! Core types, traits, and error definitions for nonlin-rs.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace – scalar aliases, the error hierarchy, the
//! named-parameter machinery behind every configurable component, the
//! versioned stream framing, the process-wide factory registries and the
//! seeded random number generation helpers.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// Machine epsilon of [`Real`].
pub const EPSILON0: Real = f64::EPSILON;

/// Graded numerical safeguard: `eps^(3/4)`.
pub const EPSILON1: Real = 1.8189894035458565e-12;

/// Graded numerical safeguard: `eps^(1/2)`.
pub const EPSILON2: Real = 1.4901161193847656e-8;

/// Graded numerical safeguard: `eps^(1/4)`.
pub const EPSILON3: Real = 1.2207031250000000e-4;

pub mod configurable;
pub mod errors;
pub mod factory;
pub mod parameter;
pub mod rng;
pub mod stream;

pub use configurable::Configurable;
pub use errors::{Error, Result};
pub use factory::Factory;
pub use parameter::{Bounds, ParamValue, Parameter};
pub use rng::{make_rng, Rng};
pub use stream::Version;
