// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor buffers and reductions.

use crate::Shape;

/// Errors that can occur when viewing buffers or running reductions.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The buffer size does not match the size implied by shape and dtype.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Two operands have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// The requested data type is not supported for this operation.
    #[error("unsupported dtype {dtype} for operation {op}")]
    UnsupportedDType {
        op: &'static str,
        dtype: crate::DataType,
    },

    /// Computing an element count or byte size overflowed `usize`.
    #[error("size overflow computing bytes for shape {shape}")]
    SizeOverflow { shape: Shape },

    /// A label index lies outside the class dimension.
    #[error("label {label} out of range for {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },
}
