// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The read-mostly view of a parsed graph that the training core consumes.

use crate::{OperatorDef, TensorInfo};
use tensor_core::Tensor;

/// Stable identifier of one tensor slot, in `[0, tensor_count)`.
pub type TensorIndex = usize;

/// Access to a parsed model graph.
///
/// The graph owns constant (weight) data. The training core reads metadata,
/// and writes weight bytes only through [`const_data_mut`](Self::const_data_mut)
/// during optimizer updates and checkpoint restores; it never frees them.
pub trait GraphContext {
    fn tensor_count(&self) -> usize;

    fn tensor(&self, index: TensorIndex) -> Option<&TensorInfo>;

    /// Constant data of tensor `index`, `None` for non-constant tensors.
    fn const_data(&self, index: TensorIndex) -> Option<&Tensor>;

    fn const_data_mut(&mut self, index: TensorIndex) -> Option<&mut Tensor>;

    fn operator_count(&self) -> usize;

    /// Operator `index` in execution order.
    fn operator(&self, index: usize) -> Option<&OperatorDef>;

    fn input_indices(&self) -> &[TensorIndex];

    fn output_indices(&self) -> &[TensorIndex];
}
