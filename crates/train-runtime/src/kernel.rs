// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The seam between the engine and external forward/backward math kernels.
//!
//! Kernels see tensors through a [`KernelContext`]: forward values live in
//! forward storage (or the graph's constant data), gradients live in backward
//! storage under the index of the tensor they differentiate. A kernel writes
//! one buffer at a time through [`KernelContext::with_output`] or
//! [`KernelContext::with_gradient`] while reading everything else.

use crate::storage::{Slot, TensorStorage};
use crate::TrainError;
use memory_manager::{MemoryManager, TensorBuffer};
use model_ir::{GraphContext, OperatorDef, TensorIndex};
use tensor_core::{DataType, Shape};

/// Forward and backward math for every operator of a graph.
///
/// `op_index` is the operator's position in execution order. Implementations
/// must only touch tensors the operator names.
pub trait Kernels {
    /// Computes the operator's outputs from its inputs.
    fn forward(
        &mut self,
        op_index: usize,
        op: &OperatorDef,
        ctx: &mut KernelContext<'_>,
    ) -> Result<(), TrainError>;

    /// Adds the operator's contribution to the gradients of its inputs,
    /// given the gradients of its outputs.
    fn backward(
        &mut self,
        op_index: usize,
        op: &OperatorDef,
        ctx: &mut KernelContext<'_>,
    ) -> Result<(), TrainError>;
}

/// Read-only view over graph constants and both storages.
#[derive(Clone, Copy)]
pub struct TensorReads<'a> {
    graph: &'a dyn GraphContext,
    forward: &'a TensorStorage,
    backward: &'a TensorStorage,
}

impl<'a> TensorReads<'a> {
    /// Live shape of `index`.
    pub fn shape(&self, index: TensorIndex) -> Result<Shape, TrainError> {
        self.forward.resolve_shape(index, self.graph)
    }

    /// Forward value of `index`: its live buffer, else its constant data.
    pub fn value(&self, index: TensorIndex) -> Result<&'a [f32], TrainError> {
        if let Some(buffer) = self.forward.get(index) {
            return Ok(buffer.as_f32()?);
        }
        match self.graph.const_data(index) {
            Some(tensor) => Ok(tensor.as_f32()?),
            None => Err(TrainError::Unknown(format!("tensor {index} has no value"))),
        }
    }

    /// Gradient of `index`; an error if nothing has written one yet.
    pub fn gradient(&self, index: TensorIndex) -> Result<&'a [f32], TrainError> {
        self.backward.values(index)
    }
}

/// Mutable access to the tensors of one kernel invocation.
pub struct KernelContext<'a> {
    graph: &'a dyn GraphContext,
    forward: &'a mut TensorStorage,
    backward: &'a mut TensorStorage,
    memory: &'a MemoryManager,
}

impl<'a> KernelContext<'a> {
    pub(crate) fn new(
        graph: &'a dyn GraphContext,
        forward: &'a mut TensorStorage,
        backward: &'a mut TensorStorage,
        memory: &'a MemoryManager,
    ) -> Self {
        Self {
            graph,
            forward,
            backward,
            memory,
        }
    }

    pub fn graph(&self) -> &dyn GraphContext {
        self.graph
    }

    pub fn reads(&self) -> TensorReads<'_> {
        TensorReads {
            graph: self.graph,
            forward: &*self.forward,
            backward: &*self.backward,
        }
    }

    pub fn shape(&self, index: TensorIndex) -> Result<Shape, TrainError> {
        self.reads().shape(index)
    }

    pub fn value(&self, index: TensorIndex) -> Result<&[f32], TrainError> {
        self.reads().value(index)
    }

    pub fn gradient(&self, index: TensorIndex) -> Result<&[f32], TrainError> {
        self.reads().gradient(index)
    }

    /// Runs `f` with the forward buffer of `index` writable.
    ///
    /// The buffer must already be allocated by the plan. While `f` runs it is
    /// not visible through the reads view.
    pub fn with_output<R>(
        &mut self,
        index: TensorIndex,
        f: impl FnOnce(TensorReads<'_>, &mut [f32]) -> Result<R, TrainError>,
    ) -> Result<R, TrainError> {
        let mut buffer = self.forward.take(index).ok_or_else(|| {
            TrainError::Unknown(format!("output tensor {index} is not allocated"))
        })?;
        let result = match buffer.as_f32_mut() {
            Ok(out) => f(
                TensorReads {
                    graph: self.graph,
                    forward: &*self.forward,
                    backward: &*self.backward,
                },
                out,
            ),
            Err(e) => Err(e.into()),
        };
        rebind(self.forward, index, buffer)?;
        result
    }

    /// Runs `f` with the gradient buffer of `index` writable, allocating a
    /// zeroed one first if needed. Kernels add into it.
    pub fn with_gradient<R>(
        &mut self,
        index: TensorIndex,
        f: impl FnOnce(TensorReads<'_>, &mut [f32]) -> Result<R, TrainError>,
    ) -> Result<R, TrainError> {
        self.ensure_gradient(index)?;
        let mut buffer = self.backward.take(index).ok_or_else(|| {
            TrainError::Unknown(format!("gradient of tensor {index} vanished"))
        })?;
        let result = match buffer.as_f32_mut() {
            Ok(grad) => f(
                TensorReads {
                    graph: self.graph,
                    forward: &*self.forward,
                    backward: &*self.backward,
                },
                grad,
            ),
            Err(e) => Err(e.into()),
        };
        rebind(self.backward, index, buffer)?;
        result
    }

    /// The gradient buffer of `index`, allocated zeroed on first use.
    ///
    /// Several consumers of one tensor therefore sum into a single buffer.
    pub fn gradient_buffer(&mut self, index: TensorIndex) -> Result<&mut [f32], TrainError> {
        self.ensure_gradient(index)?;
        match self.backward.get_mut(index) {
            Some(buffer) => Ok(buffer.as_f32_mut()?),
            None => Err(TrainError::Unknown(format!(
                "gradient of tensor {index} vanished"
            ))),
        }
    }

    fn ensure_gradient(&mut self, index: TensorIndex) -> Result<(), TrainError> {
        let dtype = self.graph.tensor(index).map(|info| info.dtype);
        if dtype != Some(DataType::Float32) {
            return Err(TrainError::UnsupportedType(format!(
                "gradient of tensor {index} requires FLOAT32"
            )));
        }
        let size = self.forward.byte_size(index, self.graph)?;
        match self.backward.slot(index)? {
            Slot::Occupied(slot) if slot.get().size_bytes() != size => {
                Err(TrainError::Unknown(format!(
                    "gradient of tensor {index} is {} bytes, expected {size}",
                    slot.get().size_bytes()
                )))
            }
            Slot::Occupied(_) => Ok(()),
            Slot::Vacant(slot) => {
                slot.insert(self.memory.allocate(size)?);
                Ok(())
            }
        }
    }
}

fn rebind(storage: &mut TensorStorage, index: TensorIndex, buffer: TensorBuffer) -> Result<(), TrainError> {
    match storage.slot(index)? {
        Slot::Vacant(slot) => {
            slot.insert(buffer);
            Ok(())
        }
        Slot::Occupied(_) => Err(TrainError::DoubleAllocation { index }),
    }
}
