//! `Matrix` — a two-dimensional dense matrix of reals.
//!
//! A thin newtype around `nalgebra::DMatrix<f64>` exposing indexing,
//! arithmetic, block access and the factorizations the solvers rely on:
//! LDLᵀ (with positivity and conditioning reports) and row reduction of
//! linear systems to full row rank.

use crate::vector::Vector;
use nalgebra::DMatrix;
use nl_core::Real;
use std::ops::{Add, Index, IndexMut, Mul, Neg, Sub};

/// A dynamically-sized 2D matrix of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// Create a zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// Create an identity matrix of size `n × n`.
    pub fn identity(n: usize) -> Self {
        Self(DMatrix::identity(n, n))
    }

    /// Create a diagonal matrix from the given vector.
    pub fn from_diagonal(diagonal: &Vector) -> Self {
        Self(DMatrix::from_diagonal(diagonal.inner()))
    }

    /// Create from a row-major data slice.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Create a matrix by evaluating `f` at every `(row, col)`.
    pub fn from_fn<F: FnMut(usize, usize) -> Real>(rows: usize, cols: usize, f: F) -> Self {
        Self(DMatrix::from_fn(rows, cols, f))
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Return `true` if the matrix has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the inner `DMatrix`.
    pub fn inner(&self) -> &DMatrix<Real> {
        &self.0
    }

    /// Consume and return the inner `DMatrix`.
    pub fn into_inner(self) -> DMatrix<Real> {
        self.0
    }

    /// Transpose.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Frobenius norm.
    pub fn norm(&self) -> Real {
        self.0.norm()
    }

    /// Largest absolute element (0 for empty matrices).
    pub fn lp_norm_inf(&self) -> Real {
        self.0.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    /// Return `true` if every element is finite.
    pub fn all_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Return `true` if the matrix equals its transpose within `tol`.
    pub fn is_symmetric(&self, tol: Real) -> bool {
        if self.rows() != self.cols() {
            return false;
        }
        for i in 0..self.rows() {
            for j in (i + 1)..self.cols() {
                if (self.0[(i, j)] - self.0[(j, i)]).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// Diagonal elements as a `Vector`.
    pub fn diagonal(&self) -> Vector {
        Vector::from(self.0.diagonal())
    }

    /// Extract row `i` as a `Vector`.
    pub fn row(&self, i: usize) -> Vector {
        Vector::from(self.0.row(i).transpose())
    }

    /// Extract column `j` as a `Vector`.
    pub fn column(&self, j: usize) -> Vector {
        Vector::from(self.0.column(j).into_owned())
    }

    /// Overwrite row `i`.
    pub fn set_row(&mut self, i: usize, row: &Vector) {
        self.0.row_mut(i).copy_from(&row.inner().transpose());
    }

    /// Overwrite column `j`.
    pub fn set_column(&mut self, j: usize, column: &Vector) {
        self.0.column_mut(j).copy_from(column.inner());
    }

    /// Copy of the `rows × cols` block starting at `(row0, col0)`.
    pub fn block(&self, row0: usize, col0: usize, rows: usize, cols: usize) -> Self {
        Self(self.0.view((row0, col0), (rows, cols)).into_owned())
    }

    /// Overwrite the block starting at `(row0, col0)` with `other`.
    pub fn set_block(&mut self, row0: usize, col0: usize, other: &Matrix) {
        self.0
            .view_mut((row0, col0), (other.rows(), other.cols()))
            .copy_from(&other.0);
    }

    /// Matrix-vector product `M v`.
    pub fn mul_vec(&self, v: &Vector) -> Vector {
        Vector::from(&self.0 * v.inner())
    }

    /// Transposed matrix-vector product `Mᵀ v`.
    pub fn tr_mul_vec(&self, v: &Vector) -> Vector {
        Vector::from(self.0.tr_mul(v.inner()))
    }

    /// Quadratic form `vᵀ M v`.
    pub fn quadratic_form(&self, v: &Vector) -> Real {
        v.dot(&self.mul_vec(v))
    }

    /// Multiply every element by `scalar`.
    pub fn scale(&self, scalar: Real) -> Self {
        Self(&self.0 * scalar)
    }

    /// Rank-1 update `M ← M + alpha · u vᵀ`.
    pub fn rank1_update(&mut self, alpha: Real, u: &Vector, v: &Vector) {
        self.0.ger(alpha, u.inner(), v.inner(), 1.0);
    }

    /// Scale row `i` by `factor`.
    pub fn scale_row(&mut self, i: usize, factor: Real) {
        self.0.row_mut(i).scale_mut(factor);
    }

    /// Scale column `j` by `factor`.
    pub fn scale_column(&mut self, j: usize, factor: Real) {
        self.0.column_mut(j).scale_mut(factor);
    }

    /// LDLᵀ factorization of a symmetric matrix.
    ///
    /// Returns `None` when the factorization breaks down (zero pivot).
    pub fn ldlt(&self) -> Option<Ldlt> {
        debug_assert_eq!(self.rows(), self.cols());
        let udu = nalgebra::linalg::UDU::new(self.0.clone())?;
        Some(Ldlt { u: udu.u, d: Vector::from(udu.d) })
    }

    /// Return `true` if symmetric and positive semi-definite (via LDLᵀ).
    pub fn is_psd(&self, tol: Real) -> bool {
        if !self.is_symmetric(tol) {
            return false;
        }
        match self.ldlt() {
            Some(ldlt) => ldlt.is_positive(-tol),
            None => false,
        }
    }

    /// Solve `M x = b` by LU with partial pivoting.
    pub fn lu_solve(&self, b: &Vector) -> Option<Vector> {
        self.0.clone().lu().solve(b.inner()).map(Vector::from)
    }
}

/// LDLᵀ factorization `M = U D Uᵀ` with `U` unit upper triangular.
#[derive(Debug, Clone)]
pub struct Ldlt {
    u: DMatrix<Real>,
    d: Vector,
}

impl Ldlt {
    /// The diagonal factor.
    pub fn diagonal(&self) -> &Vector {
        &self.d
    }

    /// Return `true` if every pivot exceeds `tol`.
    pub fn is_positive(&self, tol: Real) -> bool {
        self.d.iter().all(|&v| v > tol)
    }

    /// Reciprocal condition number estimate from the pivot magnitudes.
    pub fn rcond(&self) -> Real {
        let dmin = self.d.iter().fold(Real::INFINITY, |acc, v| acc.min(v.abs()));
        let dmax = self.d.iter().fold(0.0, |acc: Real, v| acc.max(v.abs()));
        if dmax > 0.0 {
            dmin / dmax
        } else {
            0.0
        }
    }

    /// Solve `M x = b` through the factors.
    pub fn solve(&self, b: &Vector) -> Option<Vector> {
        let z = self.u.solve_upper_triangular(b.inner())?;
        let mut y = z;
        for (value, pivot) in y.iter_mut().zip(self.d.iter()) {
            if *pivot == 0.0 {
                return None;
            }
            *value /= *pivot;
        }
        let x = self.u.transpose().solve_lower_triangular(&y)?;
        Some(Vector::from(x))
    }
}

/// Reduce the system `A x = b` to full row rank in place.
///
/// Performs Gaussian elimination with partial pivoting on the augmented
/// matrix `[A | b]` and keeps an independent subset of rows spanning the same
/// row space. Returns the rank.
pub fn reduce_rows(a: &mut Matrix, b: &mut Vector, tol: Real) -> usize {
    let rows = a.rows();
    let cols = a.cols();
    debug_assert_eq!(rows, b.size());

    let mut work = DMatrix::<Real>::zeros(rows, cols + 1);
    work.view_mut((0, 0), (rows, cols)).copy_from(a.inner());
    work.column_mut(cols).copy_from(b.inner());

    let mut rank = 0;
    for col in 0..cols {
        if rank == rows {
            break;
        }
        let (pivot_row, pivot) = (rank..rows)
            .map(|r| (r, work[(r, col)].abs()))
            .fold((rank, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if pivot <= tol {
            continue;
        }
        work.swap_rows(rank, pivot_row);
        for r in (rank + 1)..rows {
            let factor = work[(r, col)] / work[(rank, col)];
            if factor != 0.0 {
                for c in col..=cols {
                    let delta = factor * work[(rank, c)];
                    work[(r, c)] -= delta;
                }
            }
        }
        rank += 1;
    }

    *a = Matrix(work.view((0, 0), (rank, cols)).into_owned());
    *b = Vector::from(work.view((0, cols), (rank, 1)).into_owned().column(0).into_owned());
    rank
}

/// Stack matrices horizontally; all must share the row count.
pub fn hstack(blocks: &[&Matrix]) -> Matrix {
    assert!(!blocks.is_empty());
    let rows = blocks[0].rows();
    let cols = blocks.iter().map(|m| m.cols()).sum();
    let mut result = Matrix::zeros(rows, cols);
    let mut offset = 0;
    for block in blocks {
        assert_eq!(block.rows(), rows);
        result.set_block(0, offset, block);
        offset += block.cols();
    }
    result
}

/// Stack matrices vertically; all must share the column count.
pub fn vstack(blocks: &[&Matrix]) -> Matrix {
    assert!(!blocks.is_empty());
    let cols = blocks[0].cols();
    let rows = blocks.iter().map(|m| m.rows()).sum();
    let mut result = Matrix::zeros(rows, cols);
    let mut offset = 0;
    for block in blocks {
        assert_eq!(block.cols(), cols);
        result.set_block(offset, 0, block);
        offset += block.rows();
    }
    result
}

// ── From / Into conversions ───────────────────────────────────────────────────

impl From<DMatrix<Real>> for Matrix {
    fn from(m: DMatrix<Real>) -> Self {
        Self(m)
    }
}

impl From<Matrix> for DMatrix<Real> {
    fn from(m: Matrix) -> Self {
        m.0
    }
}

// ── Index ─────────────────────────────────────────────────────────────────────

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, ij: (usize, usize)) -> &Real {
        &self.0[ij]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, ij: (usize, usize)) -> &mut Real {
        &mut self.0[ij]
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

impl Add for &Matrix {
    type Output = Matrix;
    fn add(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 + &rhs.0)
    }
}

impl Sub for &Matrix {
    type Output = Matrix;
    fn sub(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 - &rhs.0)
    }
}

impl Mul for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 * &rhs.0)
    }
}

impl Neg for &Matrix {
    type Output = Matrix;
    fn neg(self) -> Matrix {
        Matrix(-&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn construction_and_products() {
        let m = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m[(1, 2)], 6.0);

        let v = Vector::from_slice(&[1.0, 1.0, 1.0]);
        assert_eq!(m.mul_vec(&v).as_slice(), &[6.0, 15.0]);

        let w = Vector::from_slice(&[1.0, 1.0]);
        assert_eq!(m.tr_mul_vec(&w).as_slice(), &[5.0, 7.0, 9.0]);
    }

    #[test]
    fn ldlt_solves_spd_system() {
        let m = Matrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = Vector::from_slice(&[1.0, 2.0]);
        let ldlt = m.ldlt().unwrap();
        assert!(ldlt.is_positive(0.0));

        let x = ldlt.solve(&b).unwrap();
        let residual = &m.mul_vec(&x) - &b;
        assert!(residual.lp_norm_inf() < 1e-12);
    }

    #[test]
    fn ldlt_reports_indefiniteness() {
        let m = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -2.0]);
        let ldlt = m.ldlt().unwrap();
        assert!(!ldlt.is_positive(0.0));
    }

    #[test]
    fn is_psd() {
        assert!(Matrix::identity(3).is_psd(1e-12));
        let indefinite = Matrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        assert!(!indefinite.is_psd(1e-12));
        let asymmetric = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]);
        assert!(!asymmetric.is_psd(1e-12));
    }

    #[test]
    fn reduce_rows_drops_dependent_equations() {
        // third row = first + second
        let mut a = Matrix::from_row_slice(3, 3, &[1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0]);
        let mut b = Vector::from_slice(&[1.0, 2.0, 3.0]);
        let rank = reduce_rows(&mut a, &mut b, 1e-12);
        assert_eq!(rank, 2);
        assert_eq!(a.rows(), 2);
        assert_eq!(b.size(), 2);

        // the reduced system must keep the original solutions, e.g. x = (0, 1, 1)
        let x = Vector::from_slice(&[0.0, 1.0, 1.0]);
        let residual = &a.mul_vec(&x) - &b;
        assert!(residual.lp_norm_inf() < 1e-12);
    }

    #[test]
    fn stacking() {
        let a = Matrix::identity(2);
        let b = Matrix::zeros(2, 1);
        let h = hstack(&[&a, &b]);
        assert_eq!((h.rows(), h.cols()), (2, 3));

        let v = vstack(&[&a, &Matrix::identity(2)]);
        assert_eq!((v.rows(), v.cols()), (4, 2));
        assert_relative_eq!(v[(2, 0)], 1.0);
    }

    #[test]
    fn quadratic_form() {
        let m = Matrix::identity(3);
        let v = Vector::from_slice(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(m.quadratic_form(&v), 14.0);
    }
}
