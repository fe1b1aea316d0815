//! # nl-tensor
//!
//! Dense linear algebra for nonlin-rs: `Vector` and `Matrix` newtypes over
//! `nalgebra`, rank-N row-major tensors with owning and borrowed variants,
//! packed bit masks for optional features, and the binary tensor codec.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod mask;
pub mod matrix;
pub mod stream;
pub mod tensor;
pub mod vector;

pub use mask::Mask;
pub use matrix::{hstack, vstack, Ldlt, Matrix};
pub use tensor::{Tensor, TensorLike, TensorView, TensorViewMut};
pub use vector::Vector;
