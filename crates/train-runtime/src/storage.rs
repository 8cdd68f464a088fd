// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Live tensor buffers keyed by tensor index.
//!
//! [`TensorStorage`] owns at most one buffer per tensor index. Binding goes
//! through [`TensorStorage::slot`], whose `Vacant`/`Occupied` split makes the
//! caller decide explicitly what happens to an index that is already bound.
//! The storage also keeps the dynamic-shape overrides that replace a
//! tensor's static shape when sizing buffers.

use crate::TrainError;
use memory_manager::TensorBuffer;
use model_ir::{GraphContext, TensorIndex};
use std::collections::btree_map::{self, BTreeMap};
use tensor_core::Shape;

/// Binding state of one tensor index.
pub type Slot<'a> = btree_map::Entry<'a, TensorIndex, TensorBuffer>;

/// Owning map from tensor index to live buffer.
#[derive(Debug, Default)]
pub struct TensorStorage {
    tensor_count: usize,
    buffers: BTreeMap<TensorIndex, TensorBuffer>,
    dynamic_shapes: BTreeMap<TensorIndex, Shape>,
}

impl TensorStorage {
    /// Creates an empty storage for a graph with `tensor_count` tensors.
    pub fn new(tensor_count: usize) -> Self {
        Self {
            tensor_count,
            ..Self::default()
        }
    }

    pub fn tensor_count(&self) -> usize {
        self.tensor_count
    }

    fn check_index(&self, index: TensorIndex) -> Result<(), TrainError> {
        if index >= self.tensor_count {
            return Err(TrainError::FailedPrecondition(format!(
                "tensor index {index} out of range ({} tensors)",
                self.tensor_count
            )));
        }
        Ok(())
    }

    /// Returns the slot for `index`, vacant or occupied.
    pub fn slot(&mut self, index: TensorIndex) -> Result<Slot<'_>, TrainError> {
        self.check_index(index)?;
        Ok(self.buffers.entry(index))
    }

    pub fn get(&self, index: TensorIndex) -> Option<&TensorBuffer> {
        self.buffers.get(&index)
    }

    pub fn get_mut(&mut self, index: TensorIndex) -> Option<&mut TensorBuffer> {
        self.buffers.get_mut(&index)
    }

    pub fn is_bound(&self, index: TensorIndex) -> bool {
        self.buffers.contains_key(&index)
    }

    /// Unbinds and returns the buffer for `index`, if any.
    pub fn take(&mut self, index: TensorIndex) -> Option<TensorBuffer> {
        self.buffers.remove(&index)
    }

    /// Float view of a bound tensor; an unbound index is an error.
    pub fn values(&self, index: TensorIndex) -> Result<&[f32], TrainError> {
        let buffer = self.buffers.get(&index).ok_or_else(|| {
            TrainError::Unknown(format!("tensor {index} has no live buffer"))
        })?;
        Ok(buffer.as_f32()?)
    }

    pub fn bound_count(&self) -> usize {
        self.buffers.len()
    }

    /// Unbinds every buffer and hands them to the caller.
    pub fn drain_all(&mut self) -> Vec<(TensorIndex, TensorBuffer)> {
        std::mem::take(&mut self.buffers).into_iter().collect()
    }

    // ── Dynamic shapes ─────────────────────────────────────────────

    /// Overrides the static shape of `index` for subsequent allocations.
    pub fn set_dynamic_shape(&mut self, index: TensorIndex, shape: Shape) -> Result<(), TrainError> {
        self.check_index(index)?;
        tracing::debug!("tensor {index}: dynamic shape {shape}");
        self.dynamic_shapes.insert(index, shape);
        Ok(())
    }

    pub fn dynamic_shape(&self, index: TensorIndex) -> Option<&Shape> {
        self.dynamic_shapes.get(&index)
    }

    pub fn clear_dynamic_shape(&mut self, index: TensorIndex) -> Option<Shape> {
        self.dynamic_shapes.remove(&index)
    }

    pub fn clear_dynamic_shapes(&mut self) {
        self.dynamic_shapes.clear();
    }

    /// The live shape of `index`: its dynamic override, else its static shape.
    pub fn resolve_shape(&self, index: TensorIndex, graph: &dyn GraphContext) -> Result<Shape, TrainError> {
        if let Some(shape) = self.dynamic_shapes.get(&index) {
            return Ok(shape.clone());
        }
        graph
            .tensor(index)
            .map(|info| info.shape.clone())
            .ok_or_else(|| TrainError::FailedPrecondition(format!("unknown tensor {index}")))
    }

    /// Byte size of `index` at its live shape.
    pub fn byte_size(&self, index: TensorIndex, graph: &dyn GraphContext) -> Result<usize, TrainError> {
        let info = graph
            .tensor(index)
            .ok_or_else(|| TrainError::FailedPrecondition(format!("unknown tensor {index}")))?;
        let shape = self.dynamic_shapes.get(&index).unwrap_or(&info.shape);
        shape
            .checked_size_bytes(info.dtype)
            .ok_or(TrainError::Overflow { index })
    }
}
