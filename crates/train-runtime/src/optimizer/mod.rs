// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Gradient accumulation and weight updates.
//!
//! [`Optimizer`] is a closed set of update rules sharing one contract:
//! `accumulate` sums per-sample gradients, `update_weights` applies the sums
//! to the graph's constant weight buffers, and `reset` drops the sums.
//!
//! Updates validate every accumulated tensor before writing any weight, so a
//! failed update leaves the graph unchanged.

mod accumulator;
mod adam;
mod rank;
mod sgd;

pub use accumulator::{GradientAccumulator, GradientMap};
pub use adam::Adam;
pub use rank::{UpdateRank, UpdateRankTable};
pub use sgd::Sgd;

use crate::{OptimizerKind, TrainError, TrainingContext};
use memory_manager::MemoryManager;
use model_ir::{GraphContext, TensorIndex};
use std::ops::Range;
use tensor_core::DataType;

/// The optimizer driving weight updates.
#[derive(Debug)]
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer {
    /// Creates an optimizer of `kind`; Adam draws its moments from `memory`.
    pub fn new(kind: OptimizerKind, memory: MemoryManager) -> Self {
        match kind {
            OptimizerKind::Sgd => Self::Sgd(Sgd::new()),
            OptimizerKind::Adam => Self::Adam(Adam::new(memory)),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        match self {
            Self::Sgd(_) => OptimizerKind::Sgd,
            Self::Adam(_) => OptimizerKind::Adam,
        }
    }

    pub fn accumulator(&self) -> &GradientAccumulator {
        match self {
            Self::Sgd(sgd) => &sgd.accumulator,
            Self::Adam(adam) => &adam.accumulator,
        }
    }

    fn accumulator_mut(&mut self) -> &mut GradientAccumulator {
        match self {
            Self::Sgd(sgd) => &mut sgd.accumulator,
            Self::Adam(adam) => &mut adam.accumulator,
        }
    }

    /// See [`GradientAccumulator::accumulate`].
    pub fn accumulate(&mut self, gradients: GradientMap) -> Result<(), TrainError> {
        self.accumulator_mut().accumulate(gradients)
    }

    /// Applies the accumulated gradients to the graph's weights.
    ///
    /// Each tensor is restricted to the depth slice `ranks` assigns it.
    pub fn update_weights(
        &mut self,
        ctx: &TrainingContext,
        graph: &mut dyn GraphContext,
        ranks: &UpdateRankTable,
    ) -> Result<(), TrainError> {
        if ctx.optimizer != self.kind() {
            return Err(TrainError::FailedPrecondition(format!(
                "context selects {} but the optimizer is {}",
                ctx.optimizer,
                self.kind()
            )));
        }
        match self {
            Self::Sgd(sgd) => sgd.update_weights(ctx, graph, ranks),
            Self::Adam(adam) => adam.update_weights(ctx, graph, ranks),
        }?;
        tracing::debug!(
            "{} updated {} tensors at step {}",
            self.kind(),
            self.accumulator().len(),
            ctx.num_step
        );
        Ok(())
    }

    /// Drops the gradient sums; Adam moments persist.
    pub fn reset(&mut self) {
        self.accumulator_mut().clear();
    }

    /// Drops the gradient sums and, for Adam, the moments.
    pub fn full_reset(&mut self) {
        match self {
            Self::Sgd(sgd) => sgd.accumulator.clear(),
            Self::Adam(adam) => adam.full_reset(),
        }
    }

    pub fn as_adam(&self) -> Option<&Adam> {
        match self {
            Self::Adam(adam) => Some(adam),
            Self::Sgd(_) => None,
        }
    }

    pub fn as_adam_mut(&mut self) -> Option<&mut Adam> {
        match self {
            Self::Adam(adam) => Some(adam),
            Self::Sgd(_) => None,
        }
    }
}

/// Checks every accumulated tensor against its weight and returns the
/// element range to update for each, in accumulator order.
fn plan_updates(
    accumulator: &GradientAccumulator,
    graph: &dyn GraphContext,
    ranks: &UpdateRankTable,
) -> Result<Vec<Range<usize>>, TrainError> {
    if accumulator.is_empty() {
        return Err(TrainError::Unknown("no accumulated gradients to apply".into()));
    }
    accumulator
        .iter()
        .map(|(index, grad)| {
            let weight = graph.const_data(index).ok_or_else(|| {
                TrainError::Unknown(format!("tensor {index} has a gradient but no weight data"))
            })?;
            if weight.dtype() != DataType::Float32 {
                return Err(TrainError::UnsupportedType(format!(
                    "tensor {index} is {}, only FLOAT32 weights are trainable",
                    weight.dtype()
                )));
            }
            let elements = weight.shape().num_elements();
            let grad_len = grad.as_f32()?.len();
            if grad_len != elements {
                return Err(TrainError::Unknown(format!(
                    "gradient for tensor {index} has {grad_len} elements, weight has {elements}"
                )));
            }
            Ok(ranks.get(index).element_range(weight.shape()))
        })
        .collect()
}

fn weights_mut(graph: &mut dyn GraphContext, index: TensorIndex) -> Result<&mut [f32], TrainError> {
    let weight = graph
        .const_data_mut(index)
        .ok_or_else(|| TrainError::Unknown(format!("weight data for tensor {index} vanished")))?;
    Ok(weight.as_f32_mut()?)
}
