// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stochastic gradient descent.

use super::{plan_updates, GradientAccumulator, UpdateRankTable};
use crate::{TrainError, TrainingContext};
use model_ir::GraphContext;

/// Plain SGD: `w -= lr * g / batch_size`.
#[derive(Debug, Default)]
pub struct Sgd {
    pub(crate) accumulator: GradientAccumulator,
}

impl Sgd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_weights(
        &mut self,
        ctx: &TrainingContext,
        graph: &mut dyn GraphContext,
        ranks: &UpdateRankTable,
    ) -> Result<(), TrainError> {
        let targets = plan_updates(&self.accumulator, graph, ranks)?;
        let batch = ctx.batch_divisor();

        for ((index, grad), range) in self.accumulator.iter().zip(targets) {
            let weights = super::weights_mut(graph, index)?;
            apply(&mut weights[range.clone()], &grad.as_f32()?[range], ctx.learning_rate, batch);
        }
        Ok(())
    }
}

pub(crate) fn apply(weights: &mut [f32], grads: &[f32], learning_rate: f32, batch: f32) {
    for (w, g) in weights.iter_mut().zip(grads) {
        *w -= (learning_rate * g) / batch;
    }
}
