// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Executes an [`AllocationPlan`] against a [`TensorStorage`].
//!
//! Step ordering is the caller's contract: `allocate_for_step(i)` completes
//! before the kernel of step `i` runs, and `deallocate_for_step(i)` runs only
//! after it.

use crate::storage::{Slot, TensorStorage};
use crate::TrainError;
use alloc_planner::AllocationPlan;
use memory_manager::MemoryManager;
use model_ir::{GraphContext, TensorIndex};

/// Drives the memory manager and tensor storage from a fixed plan.
#[derive(Debug, Clone)]
pub struct RuntimeAllocator {
    plan: AllocationPlan,
    memory: MemoryManager,
}

impl RuntimeAllocator {
    pub fn new(plan: AllocationPlan, memory: MemoryManager) -> Self {
        Self { plan, memory }
    }

    pub fn plan(&self) -> &AllocationPlan {
        &self.plan
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// Allocates and binds every tensor in `step`'s allocate list.
    ///
    /// Sizes use dynamic shapes when set. Either every tensor of the step is
    /// bound or none is: an occupied slot or an overflowing size is rejected
    /// before anything is allocated, and buffers bound earlier in the same
    /// call are released if the memory manager fails part-way.
    pub fn allocate_for_step(
        &self,
        step: usize,
        graph: &dyn GraphContext,
        storage: &mut TensorStorage,
    ) -> Result<(), TrainError> {
        let indices = self.plan.allocations_for(step);
        let mut sizes = Vec::with_capacity(indices.len());
        for &index in indices {
            if storage.is_bound(index) {
                return Err(TrainError::DoubleAllocation { index });
            }
            sizes.push((index, storage.byte_size(index, graph)?));
        }

        for (n, &(index, size)) in sizes.iter().enumerate() {
            if let Err(e) = self.bind(index, size, storage) {
                for &(bound, _) in &sizes[..n] {
                    self.memory.deallocate(storage.take(bound));
                }
                return Err(e);
            }
        }
        tracing::debug!("step {step}: allocated {} tensors", sizes.len());
        Ok(())
    }

    fn bind(&self, index: TensorIndex, size: usize, storage: &mut TensorStorage) -> Result<(), TrainError> {
        match storage.slot(index)? {
            Slot::Occupied(_) => Err(TrainError::DoubleAllocation { index }),
            Slot::Vacant(slot) => {
                slot.insert(self.memory.allocate(size)?);
                Ok(())
            }
        }
    }

    /// Frees every bound tensor in `step`'s free list.
    ///
    /// An index without a live buffer is skipped; it belongs to an optional
    /// tensor that was never produced.
    pub fn deallocate_for_step(&self, step: usize, storage: &mut TensorStorage) {
        for &index in self.plan.deallocations_for(step) {
            match storage.take(index) {
                Some(buffer) => self.memory.deallocate(Some(buffer)),
                None => tracing::debug!("step {step}: tensor {index} not bound, skipping free"),
            }
        }
    }

    /// Allocates the graph inputs, freeing any buffer already bound to them.
    pub fn allocate_graph_inputs(
        &self,
        graph: &dyn GraphContext,
        storage: &mut TensorStorage,
    ) -> Result<(), TrainError> {
        for &index in graph.input_indices() {
            self.memory.deallocate(storage.take(index));
            let size = storage.byte_size(index, graph)?;
            self.bind(index, size, storage)?;
        }
        Ok(())
    }

    /// Frees every bound buffer and clears all bindings.
    pub fn reset_all(&self, storage: &mut TensorStorage) {
        for (_, buffer) in storage.drain_all() {
            self.memory.deallocate(Some(buffer));
        }
    }
}
