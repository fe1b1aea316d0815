//! # nl-ml
//!
//! The machine-learning layer of nonlin-rs, built on the solver engine:
//! pointwise losses, in-memory datasets with feature scaling, k-fold and
//! random splitters, hyper-parameter tuners (local search and quadratic
//! surrogate), linear empirical risk minimization with L1/L2/elastic-net
//! regularization and a gradient-boosting core over weak learners.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dataset;
pub mod gboost;
pub mod linear;
pub mod loss;
pub mod scaling;
pub mod splitter;
pub mod tuner;

pub use dataset::Dataset;
pub use gboost::{FittedGBoost, GBoostModel};
pub use linear::{FittedLinear, LinearModel};
pub use loss::{losses, Loss};
pub use scaling::{FeatureScaler, Scaling};
pub use splitter::{splitters, Split, Splitter};
pub use tuner::{tuners, ParamSpace, Tuner, TunerStep};
