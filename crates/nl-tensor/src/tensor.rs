//! Rank-N dense tensors.
//!
//! Row-major contiguous storage over a common scalar, in an owning variant
//! ([`Tensor`]) and non-owning map variants ([`TensorView`],
//! [`TensorViewMut`]) that share one read interface. Algorithms take the
//! read interface; there is no hidden aliasing.

use crate::matrix::Matrix;
use crate::vector::Vector;
use nl_core::Real;
use std::ops::{Index, IndexMut};

/// Shared read interface of owning tensors and tensor maps.
pub trait TensorLike<const R: usize> {
    /// Dimensions per rank.
    fn dims(&self) -> &[usize; R];

    /// Contiguous row-major storage.
    fn as_slice(&self) -> &[Real];

    /// Total number of elements (`product(dims)`).
    fn size(&self) -> usize {
        self.dims().iter().product()
    }

    /// Flat row-major offset of a multi-index.
    fn offset(&self, index: [usize; R]) -> usize {
        let dims = self.dims();
        let mut offset = 0;
        for (i, &dim) in dims.iter().enumerate() {
            debug_assert!(index[i] < dim, "index {index:?} out of dims {dims:?}");
            offset = offset * dim + index[i];
        }
        offset
    }

    /// Element at the given multi-index.
    fn at(&self, index: [usize; R]) -> Real {
        self.as_slice()[self.offset(index)]
    }
}

/// An owning, contiguous, row-major tensor of rank `R`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<const R: usize> {
    dims: [usize; R],
    data: Vec<Real>,
}

impl<const R: usize> Tensor<R> {
    /// Create a zero-filled tensor with the given dimensions.
    pub fn zeros(dims: [usize; R]) -> Self {
        let size = dims.iter().product();
        Self { dims, data: vec![0.0; size] }
    }

    /// Create a tensor taking ownership of row-major `data`.
    pub fn from_vec(dims: [usize; R], data: Vec<Real>) -> Self {
        assert_eq!(
            dims.iter().product::<usize>(),
            data.len(),
            "dims {dims:?} do not match {} elements",
            data.len()
        );
        Self { dims, data }
    }

    /// Mutable access to the row-major storage.
    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        &mut self.data
    }

    /// Mutable element access at the given multi-index.
    pub fn at_mut(&mut self, index: [usize; R]) -> &mut Real {
        let offset = self.offset(index);
        &mut self.data[offset]
    }

    /// Fill every element with `value`.
    pub fn fill(&mut self, value: Real) {
        self.data.fill(value);
    }

    /// Non-owning view of the whole tensor.
    pub fn view(&self) -> TensorView<'_, R> {
        TensorView { dims: self.dims, data: &self.data }
    }

    /// Non-owning mutable view of the whole tensor.
    pub fn view_mut(&mut self) -> TensorViewMut<'_, R> {
        TensorViewMut { dims: self.dims, data: &mut self.data }
    }
}

impl<const R: usize> TensorLike<R> for Tensor<R> {
    fn dims(&self) -> &[usize; R] {
        &self.dims
    }

    fn as_slice(&self) -> &[Real] {
        &self.data
    }
}

impl<const R: usize> Index<[usize; R]> for Tensor<R> {
    type Output = Real;
    fn index(&self, index: [usize; R]) -> &Real {
        &self.data[self.offset(index)]
    }
}

impl<const R: usize> IndexMut<[usize; R]> for Tensor<R> {
    fn index_mut(&mut self, index: [usize; R]) -> &mut Real {
        let offset = self.offset(index);
        &mut self.data[offset]
    }
}

/// A non-owning constant map over contiguous row-major storage.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a, const R: usize> {
    dims: [usize; R],
    data: &'a [Real],
}

impl<'a, const R: usize> TensorView<'a, R> {
    /// Map existing storage as a tensor with the given dimensions.
    pub fn new(dims: [usize; R], data: &'a [Real]) -> Self {
        assert_eq!(dims.iter().product::<usize>(), data.len());
        Self { dims, data }
    }

    /// Copy into an owning tensor.
    pub fn to_owned(&self) -> Tensor<R> {
        Tensor { dims: self.dims, data: self.data.to_vec() }
    }
}

impl<const R: usize> TensorLike<R> for TensorView<'_, R> {
    fn dims(&self) -> &[usize; R] {
        &self.dims
    }

    fn as_slice(&self) -> &[Real] {
        self.data
    }
}

/// A non-owning mutable map over contiguous row-major storage.
#[derive(Debug)]
pub struct TensorViewMut<'a, const R: usize> {
    dims: [usize; R],
    data: &'a mut [Real],
}

impl<'a, const R: usize> TensorViewMut<'a, R> {
    /// Map existing storage as a mutable tensor with the given dimensions.
    pub fn new(dims: [usize; R], data: &'a mut [Real]) -> Self {
        assert_eq!(dims.iter().product::<usize>(), data.len());
        Self { dims, data }
    }

    /// Mutable access to the row-major storage.
    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        self.data
    }

    /// Mutable element access at the given multi-index.
    pub fn at_mut(&mut self, index: [usize; R]) -> &mut Real {
        let offset = self.offset(index);
        &mut self.data[offset]
    }
}

impl<const R: usize> TensorLike<R> for TensorViewMut<'_, R> {
    fn dims(&self) -> &[usize; R] {
        &self.dims
    }

    fn as_slice(&self) -> &[Real] {
        self.data
    }
}

impl Tensor<1> {
    /// Copy into a `Vector`.
    pub fn to_vector(&self) -> Vector {
        Vector::from_slice(&self.data)
    }
}

impl Tensor<2> {
    /// Copy into a `Matrix` (row-major).
    pub fn to_matrix(&self) -> Matrix {
        Matrix::from_row_slice(self.dims[0], self.dims[1], &self.data)
    }

    /// Copy of row `i` as a `Vector`.
    pub fn row(&self, i: usize) -> Vector {
        let cols = self.dims[1];
        Vector::from_slice(&self.data[i * cols..(i + 1) * cols])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_layout() {
        let mut tensor = Tensor::<3>::zeros([2, 3, 4]);
        assert_eq!(tensor.size(), 24);
        tensor[[1, 2, 3]] = 5.0;
        assert_eq!(tensor.as_slice()[23], 5.0);
        tensor[[0, 0, 1]] = 2.0;
        assert_eq!(tensor.as_slice()[1], 2.0);
    }

    #[test]
    fn views_share_storage() {
        let mut tensor = Tensor::<2>::zeros([2, 2]);
        {
            let mut view = tensor.view_mut();
            *view.at_mut([0, 1]) = 7.0;
        }
        let view = tensor.view();
        assert_eq!(view.at([0, 1]), 7.0);
        assert_eq!(view.to_owned(), tensor);
    }

    #[test]
    fn external_storage_map() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let view = TensorView::new([2, 3], &data);
        assert_eq!(view.at([1, 0]), 4.0);
    }

    #[test]
    fn rank2_interop() {
        let tensor = Tensor::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        let matrix = tensor.to_matrix();
        assert_eq!(matrix[(0, 1)], 2.0);
        assert_eq!(matrix[(1, 0)], 3.0);
        assert_eq!(tensor.row(1).as_slice(), &[3.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "dims")]
    fn mismatched_dims_panic() {
        let _ = Tensor::from_vec([2, 3], vec![0.0; 5]);
    }
}
