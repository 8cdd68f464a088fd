// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Running per-tensor gradient sums across the samples of a batch.

use crate::TrainError;
use memory_manager::TensorBuffer;
use model_ir::TensorIndex;
use std::collections::btree_map::{BTreeMap, Entry};

/// Gradient buffers keyed by the weight tensor they belong to.
pub type GradientMap = BTreeMap<TensorIndex, TensorBuffer>;

/// Sum of every gradient seen since the last reset.
#[derive(Debug, Default)]
pub struct GradientAccumulator {
    sums: GradientMap,
}

impl GradientAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `incoming` into the running sums.
    ///
    /// A tensor seen for the first time since the last reset has its buffer
    /// moved in without copying. Later gradients are added element-wise.
    /// Either every tensor is accumulated or, on error, none is.
    pub fn accumulate(&mut self, incoming: GradientMap) -> Result<(), TrainError> {
        if incoming.is_empty() {
            return Err(TrainError::Unknown("empty gradient map".into()));
        }
        for (index, grad) in &incoming {
            let len = grad.as_f32()?.len();
            if let Some(sum) = self.sums.get(index) {
                if sum.size_bytes() != grad.size_bytes() {
                    return Err(TrainError::Unknown(format!(
                        "gradient for tensor {index} has {len} elements, accumulator has {}",
                        sum.size_bytes() / 4
                    )));
                }
            }
        }

        for (index, grad) in incoming {
            match self.sums.entry(index) {
                Entry::Vacant(slot) => {
                    slot.insert(grad);
                }
                Entry::Occupied(mut slot) => {
                    let sum = slot.get_mut().as_f32_mut()?;
                    for (s, g) in sum.iter_mut().zip(grad.as_f32()?) {
                        *s += g;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, index: TensorIndex) -> Option<&TensorBuffer> {
        self.sums.get(&index)
    }

    /// Accumulated tensors in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (TensorIndex, &TensorBuffer)> {
        self.sums.iter().map(|(&i, b)| (i, b))
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Frees every accumulated buffer.
    pub fn clear(&mut self) {
        self.sums.clear();
    }
}
