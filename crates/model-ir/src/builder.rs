// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Incremental construction of a [`ModelGraph`].

use crate::graph::Loaded;
use crate::{ModelError, ModelGraph, Opcode, OperatorDef, TensorIndex, TensorInfo};
use tensor_core::{DataType, Shape, Tensor};

/// Builds a graph tensor by tensor and operator by operator.
///
/// Indices are handed out in insertion order. Nothing is checked until
/// [`ModelGraph::validate`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    name: String,
    tensors: Vec<TensorInfo>,
    const_data: Vec<Option<Tensor>>,
    operators: Vec<OperatorDef>,
    inputs: Vec<TensorIndex>,
    outputs: Vec<TensorIndex>,
}

impl GraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declares a non-constant tensor (activation, input or output).
    pub fn add_tensor(&mut self, name: impl Into<String>, shape: Shape, dtype: DataType) -> TensorIndex {
        self.tensors.push(TensorInfo {
            name: name.into(),
            shape,
            dtype,
            is_const: false,
        });
        self.const_data.push(None);
        self.tensors.len() - 1
    }

    /// Declares a constant tensor owning `data`.
    pub fn add_const(&mut self, name: impl Into<String>, data: Tensor) -> TensorIndex {
        self.tensors.push(TensorInfo {
            name: name.into(),
            shape: data.shape().clone(),
            dtype: data.dtype(),
            is_const: true,
        });
        self.const_data.push(Some(data));
        self.tensors.len() - 1
    }

    /// Convenience for a Float32 constant.
    pub fn add_const_f32(
        &mut self,
        name: impl Into<String>,
        shape: Shape,
        values: &[f32],
    ) -> Result<TensorIndex, ModelError> {
        let data = Tensor::from_f32(shape, values)?;
        Ok(self.add_const(name, data))
    }

    /// Appends an operator; operators execute in insertion order.
    pub fn add_operator(
        &mut self,
        opcode: Opcode,
        inputs: Vec<TensorIndex>,
        outputs: Vec<TensorIndex>,
    ) -> usize {
        self.operators.push(OperatorDef {
            opcode,
            inputs,
            outputs,
        });
        self.operators.len() - 1
    }

    pub fn set_inputs(&mut self, inputs: Vec<TensorIndex>) {
        self.inputs = inputs;
    }

    pub fn set_outputs(&mut self, outputs: Vec<TensorIndex>) {
        self.outputs = outputs;
    }

    pub fn build(self) -> ModelGraph<Loaded> {
        ModelGraph::from_parts(
            self.name,
            self.tensors,
            self.const_data,
            self.operators,
            self.inputs,
            self.outputs,
        )
    }
}
