// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model graph: tensors, constant data and operators in execution order.
//!
//! # Type-State Pattern
//!
//! ```text
//! ModelGraph<Loaded>     built, indices not yet checked.
//!       │  .validate()
//!       ▼
//! ModelGraph<Validated>  indices and constant data verified; implements GraphContext.
//! ```
//!
//! Only a validated graph implements [`GraphContext`], so the planner and the
//! training core never see dangling tensor indices.

use crate::{GraphContext, ModelError, OperatorDef, TensorIndex, TensorInfo};
use std::fmt;
use tensor_core::Tensor;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been built but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── ModelGraph ─────────────────────────────────────────────────────

/// A model as a tensor table plus an ordered operator list.
#[derive(Debug, Clone)]
pub struct ModelGraph<S: GraphState = Loaded> {
    pub name: String,
    tensors: Vec<TensorInfo>,
    const_data: Vec<Option<Tensor>>,
    operators: Vec<OperatorDef>,
    inputs: Vec<TensorIndex>,
    outputs: Vec<TensorIndex>,
    _state: std::marker::PhantomData<S>,
}

impl<S: GraphState> ModelGraph<S> {
    fn transition<T: GraphState>(self) -> ModelGraph<T> {
        ModelGraph {
            name: self.name,
            tensors: self.tensors,
            const_data: self.const_data,
            operators: self.operators,
            inputs: self.inputs,
            outputs: self.outputs,
            _state: std::marker::PhantomData,
        }
    }

    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    pub fn num_operators(&self) -> usize {
        self.operators.len()
    }
}

// ── Loaded state ───────────────────────────────────────────────────

impl ModelGraph<Loaded> {
    pub(crate) fn from_parts(
        name: String,
        tensors: Vec<TensorInfo>,
        const_data: Vec<Option<Tensor>>,
        operators: Vec<OperatorDef>,
        inputs: Vec<TensorIndex>,
        outputs: Vec<TensorIndex>,
    ) -> Self {
        Self {
            name,
            tensors,
            const_data,
            operators,
            inputs,
            outputs,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - At least one operator.
    /// - Every operator, input and output index is in range.
    /// - Constant tensors carry data matching their declared shape and dtype;
    ///   non-constant tensors carry none.
    /// - Graph inputs and operator outputs are never constant.
    /// - No tensor is produced by more than one operator.
    pub fn validate(self) -> Result<ModelGraph<Validated>, ModelError> {
        if self.operators.is_empty() {
            return Err(ModelError::InvalidGraph(
                "model graph contains no operators".into(),
            ));
        }

        let count = self.tensors.len();
        for (index, (info, data)) in self.tensors.iter().zip(&self.const_data).enumerate() {
            match (info.is_const, data) {
                (true, None) => {
                    return Err(ModelError::InvalidTensor {
                        index,
                        detail: format!("constant '{}' has no data", info.name),
                    })
                }
                (false, Some(_)) => {
                    return Err(ModelError::InvalidTensor {
                        index,
                        detail: format!("non-constant '{}' carries data", info.name),
                    })
                }
                (true, Some(t)) if t.shape() != &info.shape || t.dtype() != info.dtype => {
                    return Err(ModelError::InvalidTensor {
                        index,
                        detail: format!(
                            "data is {} {}, declared {} {}",
                            t.dtype(),
                            t.shape(),
                            info.dtype,
                            info.shape
                        ),
                    })
                }
                _ => {}
            }
        }

        let mut producer: Vec<Option<usize>> = vec![None; count];
        for (index, op) in self.operators.iter().enumerate() {
            let bad = |detail: String| ModelError::InvalidOperator {
                index,
                opcode: op.opcode,
                detail,
            };
            if let Some(&t) = op.inputs.iter().chain(&op.outputs).find(|&&t| t >= count) {
                return Err(bad(format!("tensor index {t} out of range ({count} tensors)")));
            }
            for &out in &op.outputs {
                if self.tensors[out].is_const {
                    return Err(bad(format!("writes constant tensor {out}")));
                }
                if let Some(prev) = producer[out] {
                    return Err(bad(format!("tensor {out} already produced by operator {prev}")));
                }
                producer[out] = Some(index);
            }
        }

        for &t in self.inputs.iter().chain(&self.outputs) {
            if t >= count {
                return Err(ModelError::InvalidGraph(format!(
                    "graph boundary tensor {t} out of range ({count} tensors)"
                )));
            }
        }
        if let Some(&t) = self.inputs.iter().find(|&&t| self.tensors[t].is_const) {
            return Err(ModelError::InvalidGraph(format!(
                "graph input {t} is a constant tensor"
            )));
        }

        tracing::debug!(
            "validated graph '{}': {} tensors, {} operators",
            self.name,
            count,
            self.operators.len()
        );
        Ok(self.transition())
    }
}

// ── Validated state ────────────────────────────────────────────────

impl ModelGraph<Validated> {
    /// Returns an iterator over the operators in execution order.
    pub fn iter_operators(&self) -> impl Iterator<Item = &OperatorDef> {
        self.operators.iter()
    }

    /// Total bytes held by constant tensors.
    pub fn total_const_bytes(&self) -> usize {
        self.const_data
            .iter()
            .flatten()
            .map(Tensor::size_bytes)
            .sum()
    }

    /// Number of trainable weight elements (constant inputs of trainable operators).
    pub fn trainable_parameter_count(&self) -> usize {
        let mut seen = vec![false; self.tensors.len()];
        let mut total = 0;
        for op in self.operators.iter().filter(|op| op.opcode.has_trainable_weights()) {
            for &t in &op.inputs {
                if self.tensors[t].is_const && !seen[t] {
                    seen[t] = true;
                    total += self.tensors[t].shape.num_elements();
                }
            }
        }
        total
    }

    pub fn summary(&self) -> String {
        format!(
            "Model '{}': {} tensors, {} operators, {:.1} KB constants, {} trainable parameters",
            self.name,
            self.tensors.len(),
            self.operators.len(),
            self.total_const_bytes() as f64 / 1024.0,
            self.trainable_parameter_count(),
        )
    }
}

impl GraphContext for ModelGraph<Validated> {
    fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    fn tensor(&self, index: TensorIndex) -> Option<&TensorInfo> {
        self.tensors.get(index)
    }

    fn const_data(&self, index: TensorIndex) -> Option<&Tensor> {
        self.const_data.get(index).and_then(Option::as_ref)
    }

    fn const_data_mut(&mut self, index: TensorIndex) -> Option<&mut Tensor> {
        self.const_data.get_mut(index).and_then(Option::as_mut)
    }

    fn operator_count(&self) -> usize {
        self.operators.len()
    }

    fn operator(&self, index: usize) -> Option<&OperatorDef> {
        self.operators.get(index)
    }

    fn input_indices(&self) -> &[TensorIndex] {
        &self.inputs
    }

    fn output_indices(&self) -> &[TensorIndex] {
        &self.outputs
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for ModelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ModelGraph '{}' ({} operators):",
            self.name,
            self.operators.len()
        )?;
        for (i, op) in self.operators.iter().enumerate() {
            writeln!(f, "  [{i}] {} {:?} -> {:?}", op.opcode, op.inputs, op.outputs)?;
        }
        Ok(())
    }
}
