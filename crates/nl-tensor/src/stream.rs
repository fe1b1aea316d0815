//! Binary codec for tensors, vectors and matrices.
//!
//! A tensor payload is `(rank: u32, dim_0..dim_{r-1}: u64, raw little-endian
//! f64 bytes in row-major order)`. Vectors and matrices reuse the same
//! framing with ranks 1 and 2.

use crate::matrix::Matrix;
use crate::tensor::{Tensor, TensorLike};
use crate::vector::Vector;
use nl_core::errors::{Error, Result};
use nl_core::stream::{read_f64, read_u32, read_u64, write_f64, write_u32, write_u64};
use std::io::{Read, Write};

fn write_payload(writer: &mut dyn Write, dims: &[usize], data: &[f64]) -> Result<()> {
    write_u32(writer, dims.len() as u32)?;
    for &dim in dims {
        write_u64(writer, dim as u64)?;
    }
    for &value in data {
        write_f64(writer, value)?;
    }
    Ok(())
}

fn read_payload(reader: &mut dyn Read, expected_rank: usize) -> Result<(Vec<usize>, Vec<f64>)> {
    let rank = read_u32(reader)? as usize;
    if rank != expected_rank {
        return Err(Error::Stream(format!(
            "tensor rank mismatch: read {rank}, expected {expected_rank}"
        )));
    }
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(read_u64(reader)? as usize);
    }
    let size: usize = dims.iter().product();
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        data.push(read_f64(reader)?);
    }
    Ok((dims, data))
}

/// Write a rank-`R` tensor.
pub fn write_tensor<const R: usize>(writer: &mut dyn Write, tensor: &Tensor<R>) -> Result<()> {
    write_payload(writer, tensor.dims(), tensor.as_slice())
}

/// Read a rank-`R` tensor.
pub fn read_tensor<const R: usize>(reader: &mut dyn Read) -> Result<Tensor<R>> {
    let (dims, data) = read_payload(reader, R)?;
    let mut fixed = [0usize; R];
    fixed.copy_from_slice(&dims);
    Ok(Tensor::from_vec(fixed, data))
}

/// Write a vector as a rank-1 tensor.
pub fn write_vector(writer: &mut dyn Write, vector: &Vector) -> Result<()> {
    write_payload(writer, &[vector.size()], vector.as_slice())
}

/// Read a vector from a rank-1 tensor payload.
pub fn read_vector(reader: &mut dyn Read) -> Result<Vector> {
    let (_, data) = read_payload(reader, 1)?;
    Ok(Vector::from_vec(data))
}

/// Write a matrix as a rank-2 tensor in row-major order.
pub fn write_matrix(writer: &mut dyn Write, matrix: &Matrix) -> Result<()> {
    let mut data = Vec::with_capacity(matrix.rows() * matrix.cols());
    for i in 0..matrix.rows() {
        for j in 0..matrix.cols() {
            data.push(matrix[(i, j)]);
        }
    }
    write_payload(writer, &[matrix.rows(), matrix.cols()], &data)
}

/// Read a matrix from a rank-2 tensor payload.
pub fn read_matrix(reader: &mut dyn Read) -> Result<Matrix> {
    let (dims, data) = read_payload(reader, 2)?;
    Ok(Matrix::from_row_slice(dims[0], dims[1], &data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_round_trip() {
        let vector = Vector::from_slice(&[1.5, -2.0, 1e-300]);
        let mut buffer = Vec::new();
        write_vector(&mut buffer, &vector).unwrap();
        assert_eq!(read_vector(&mut buffer.as_slice()).unwrap(), vector);
    }

    #[test]
    fn matrix_round_trip() {
        let matrix = Matrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut buffer = Vec::new();
        write_matrix(&mut buffer, &matrix).unwrap();
        assert_eq!(read_matrix(&mut buffer.as_slice()).unwrap(), matrix);
    }

    #[test]
    fn tensor_round_trip() {
        let mut tensor = Tensor::<4>::zeros([2, 3, 4, 5]);
        tensor[[1, 2, 3, 4]] = 42.0;
        let mut buffer = Vec::new();
        write_tensor(&mut buffer, &tensor).unwrap();
        assert_eq!(read_tensor::<4>(&mut buffer.as_slice()).unwrap(), tensor);
    }

    #[test]
    fn rank_mismatch_is_corrupt() {
        let mut buffer = Vec::new();
        write_vector(&mut buffer, &Vector::zeros(3)).unwrap();
        assert!(read_matrix(&mut buffer.as_slice()).is_err());
    }
}
