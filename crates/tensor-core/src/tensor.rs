// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned tensor type used for constant graph data.

use crate::{AlignedBytes, DataType, Shape, TensorError};

/// An owned tensor: shape, element type and contiguous row-major data.
///
/// Trainable weights live in the graph as `Tensor`s and are updated in place
/// by the optimizers through [`as_f32_mut`](Tensor::as_f32_mut).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    dtype: DataType,
    data: AlignedBytes,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DataType};
    /// let t = Tensor::zeros(Shape::matrix(2, 3), DataType::Float32).unwrap();
    /// assert_eq!(t.size_bytes(), 24);
    /// ```
    pub fn zeros(shape: Shape, dtype: DataType) -> Result<Self, TensorError> {
        let size = shape
            .checked_size_bytes(dtype)
            .ok_or_else(|| TensorError::SizeOverflow { shape: shape.clone() })?;
        Ok(Self {
            shape,
            dtype,
            data: AlignedBytes::zeroed(size),
        })
    }

    /// Creates a tensor from raw bytes.
    ///
    /// Returns an error if the buffer size does not match the shape.
    pub fn from_bytes(shape: Shape, dtype: DataType, bytes: &[u8]) -> Result<Self, TensorError> {
        let expected = shape
            .checked_size_bytes(dtype)
            .ok_or_else(|| TensorError::SizeOverflow { shape: shape.clone() })?;
        if bytes.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            shape,
            dtype,
            data: AlignedBytes::from_bytes(bytes),
        })
    }

    /// Creates a `Float32` tensor from values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.as_f32().unwrap(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if values.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected: expected.saturating_mul(4),
                actual: values.len() * 4,
            });
        }
        Ok(Self {
            shape,
            dtype: DataType::Float32,
            data: AlignedBytes::from_f32(values),
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_bytes_mut()
    }

    /// Interprets the data as `f32`. Fails for any other dtype.
    pub fn as_f32(&self) -> Result<&[f32], TensorError> {
        self.require_f32("as_f32")?;
        self.data.as_f32()
    }

    /// Mutable `f32` view. Fails for any other dtype.
    pub fn as_f32_mut(&mut self) -> Result<&mut [f32], TensorError> {
        self.require_f32("as_f32_mut")?;
        self.data.as_f32_mut()
    }

    fn require_f32(&self, op: &'static str) -> Result<(), TensorError> {
        if self.dtype != DataType::Float32 {
            return Err(TensorError::UnsupportedDType {
                op,
                dtype: self.dtype,
            });
        }
        Ok(())
    }
}
