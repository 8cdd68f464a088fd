// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime shape descriptors.

use crate::DataType;
use std::fmt;

/// Dimensionality of a tensor, outermost dimension first.
///
/// The leading dimension is the output-channel axis for trainable weights,
/// which is what depth-sliced updates partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![10, 4]);
    /// assert_eq!(s.rank(), 2);
    /// assert_eq!(s.num_elements(), 40);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    /// Creates a 2-D shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Returns the total number of elements (1 for a scalar).
    ///
    /// Saturates on overflow; use [`checked_num_elements`](Self::checked_num_elements)
    /// when the result feeds an allocation.
    pub fn num_elements(&self) -> usize {
        self.checked_num_elements().unwrap_or(usize::MAX)
    }

    /// Returns the total number of elements, or `None` on overflow.
    pub fn checked_num_elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Computes the byte footprint for `dtype`, or `None` on overflow.
    pub fn checked_size_bytes(&self, dtype: DataType) -> Option<usize> {
        self.checked_num_elements()?.checked_mul(dtype.size_bytes())
    }

    /// Number of elements in one slice along the leading dimension.
    ///
    /// Returns `0` when the leading dimension is zero.
    pub fn inner_size(&self) -> usize {
        match self.dims.first() {
            None => 1,
            Some(0) => 0,
            Some(&d0) => self.num_elements() / d0,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), 1);
        assert_eq!(s.inner_size(), 1);
    }

    #[test]
    fn test_matrix_shape() {
        let s = Shape::matrix(3, 4);
        assert_eq!(s.num_elements(), 12);
        assert_eq!(s.checked_size_bytes(DataType::Float32), Some(48));
        assert_eq!(s.inner_size(), 4);
    }

    #[test]
    fn test_checked_overflow() {
        let s = Shape::new(vec![usize::MAX, 2]);
        assert_eq!(s.checked_num_elements(), None);

        let s = Shape::vector(usize::MAX / 2);
        assert!(s.checked_num_elements().is_some());
        assert_eq!(s.checked_size_bytes(DataType::Float32), None);
    }

    #[test]
    fn test_zero_leading_dim() {
        let s = Shape::new(vec![0, 8]);
        assert_eq!(s.num_elements(), 0);
        assert_eq!(s.inner_size(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::new(vec![2, 3, 4])), "[2, 3, 4]");
    }

    #[test]
    fn test_from_conversions() {
        let s1: Shape = vec![2, 3].into();
        let s2: Shape = (&[2, 3][..]).into();
        assert_eq!(s1, s2);
    }
}
