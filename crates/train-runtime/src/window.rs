// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The trailing training window and the trainable tensors inside it.

use model_ir::{GraphContext, TensorIndex};

/// Operators eligible for weight updates, counted back from the last one.
///
/// A constant input is trainable when its operator lies in the window and
/// the operator kind carries trainable weights. Everything else is frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingWindow {
    first_operator: usize,
    operator_count: usize,
    trainable: Vec<TensorIndex>,
}

impl TrainingWindow {
    /// Builds the window of the last `num_of_train_layers` operators (0 = all).
    pub fn new(graph: &dyn GraphContext, num_of_train_layers: u32) -> Self {
        let operator_count = graph.operator_count();
        let span = match num_of_train_layers {
            0 => operator_count,
            n => (n as usize).min(operator_count),
        };
        let first_operator = operator_count - span;

        let mut trainable = Vec::new();
        for op_index in (first_operator..operator_count).rev() {
            let Some(op) = graph.operator(op_index) else {
                continue;
            };
            if !op.opcode.has_trainable_weights() {
                continue;
            }
            for &index in &op.inputs {
                let is_const = graph.tensor(index).is_some_and(|info| info.is_const);
                if is_const && graph.const_data(index).is_some() && !trainable.contains(&index) {
                    trainable.push(index);
                }
            }
        }

        tracing::debug!(
            "training window: operators {first_operator}..{operator_count}, {} trainable tensors",
            trainable.len()
        );
        Self {
            first_operator,
            operator_count,
            trainable,
        }
    }

    /// First operator index inside the window.
    pub fn first_operator(&self) -> usize {
        self.first_operator
    }

    /// Operator indices inside the window in backward (reverse) order.
    pub fn backward_order(&self) -> impl Iterator<Item = usize> {
        (self.first_operator..self.operator_count).rev()
    }

    pub fn contains_operator(&self, op_index: usize) -> bool {
        (self.first_operator..self.operator_count).contains(&op_index)
    }

    /// Trainable tensors in reverse operator order, each listed once.
    ///
    /// This order is also the order weights are stored in a checkpoint.
    pub fn trainable_tensors(&self) -> &[TensorIndex] {
        &self.trainable
    }

    pub fn is_trainable(&self, index: TensorIndex) -> bool {
        self.trainable.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.trainable.is_empty()
    }
}
