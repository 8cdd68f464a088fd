// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction and validation.

/// Errors raised while building or validating a [`crate::ModelGraph`].
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A tensor declaration is inconsistent (missing or mismatched data).
    #[error("invalid tensor {index}: {detail}")]
    InvalidTensor { index: usize, detail: String },

    /// An operator references tensors it cannot use.
    #[error("invalid operator {index} ({opcode}): {detail}")]
    InvalidOperator {
        index: usize,
        opcode: crate::Opcode,
        detail: String,
    },

    /// The graph as a whole is malformed.
    #[error("invalid model graph: {0}")]
    InvalidGraph(String),

    /// Constant data could not be built.
    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),
}
