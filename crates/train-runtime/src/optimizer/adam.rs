// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Adam with bias-corrected first and second moments.
//!
//! Moment buffers are created zeroed the first time a tensor is updated after
//! a full reset, and survive [`Optimizer::reset`](super::Optimizer::reset)
//! between batches.

use super::{plan_updates, GradientAccumulator, UpdateRankTable};
use crate::{TrainError, TrainingContext};
use memory_manager::{MemoryManager, TensorBuffer};
use model_ir::{GraphContext, TensorIndex};
use std::collections::BTreeMap;

/// Hyper-parameters of one update, with bias corrections for step `t`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AdamStep {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    pub batch: f32,
    pub correction1: f32,
    pub correction2: f32,
}

impl AdamStep {
    pub fn new(ctx: &TrainingContext) -> Result<Self, TrainError> {
        if ctx.num_step == 0 {
            return Err(TrainError::FailedPrecondition(
                "Adam update requires num_step >= 1".into(),
            ));
        }
        let t = i32::try_from(ctx.num_step).unwrap_or(i32::MAX);
        Ok(Self {
            learning_rate: ctx.learning_rate,
            beta1: ctx.beta,
            beta2: ctx.beta_squares,
            epsilon: ctx.epsilon,
            batch: ctx.batch_divisor(),
            correction1: 1.0 - ctx.beta.powi(t),
            correction2: 1.0 - ctx.beta_squares.powi(t),
        })
    }
}

pub(crate) fn apply(weights: &mut [f32], grads: &[f32], m: &mut [f32], v: &mut [f32], step: &AdamStep) {
    for (((w, &g), m), v) in weights.iter_mut().zip(grads).zip(m.iter_mut()).zip(v.iter_mut()) {
        let g = g / step.batch;
        *m = step.beta1 * *m + (1.0 - step.beta1) * g;
        *v = step.beta2 * *v + (1.0 - step.beta2) * g * g;
        let m_hat = *m / step.correction1;
        let v_hat = *v / step.correction2;
        *w -= step.learning_rate * m_hat / (v_hat.sqrt() + step.epsilon);
    }
}

/// Adam optimizer state: gradient sums plus `m`/`v` per trainable tensor.
#[derive(Debug)]
pub struct Adam {
    pub(crate) accumulator: GradientAccumulator,
    m: BTreeMap<TensorIndex, TensorBuffer>,
    v: BTreeMap<TensorIndex, TensorBuffer>,
    memory: MemoryManager,
}

impl Adam {
    pub fn new(memory: MemoryManager) -> Self {
        Self {
            accumulator: GradientAccumulator::new(),
            m: BTreeMap::new(),
            v: BTreeMap::new(),
            memory,
        }
    }

    pub fn first_moment(&self, index: TensorIndex) -> Option<&TensorBuffer> {
        self.m.get(&index)
    }

    pub fn second_moment(&self, index: TensorIndex) -> Option<&TensorBuffer> {
        self.v.get(&index)
    }

    pub fn has_moments(&self) -> bool {
        !self.m.is_empty() || !self.v.is_empty()
    }

    /// Frees gradient sums and moments.
    pub fn full_reset(&mut self) {
        self.accumulator.clear();
        self.m.clear();
        self.v.clear();
    }

    /// Replaces all state with the given `(index, m bytes, v bytes)` moments.
    ///
    /// Every buffer is allocated and filled before the old state is dropped,
    /// so a failure leaves the optimizer untouched.
    pub fn restore_moments(&mut self, entries: &[(TensorIndex, &[u8], &[u8])]) -> Result<(), TrainError> {
        let mut m = BTreeMap::new();
        let mut v = BTreeMap::new();
        for &(index, m_bytes, v_bytes) in entries {
            m.insert(index, self.filled_buffer(m_bytes)?);
            v.insert(index, self.filled_buffer(v_bytes)?);
        }
        self.full_reset();
        self.m = m;
        self.v = v;
        tracing::debug!("restored Adam moments for {} tensors", entries.len());
        Ok(())
    }

    fn filled_buffer(&self, bytes: &[u8]) -> Result<TensorBuffer, TrainError> {
        let mut buffer = self.memory.allocate(bytes.len())?;
        buffer.copy_from_bytes(bytes)?;
        Ok(buffer)
    }

    pub fn update_weights(
        &mut self,
        ctx: &TrainingContext,
        graph: &mut dyn GraphContext,
        ranks: &UpdateRankTable,
    ) -> Result<(), TrainError> {
        let step = AdamStep::new(ctx)?;
        let targets = plan_updates(&self.accumulator, graph, ranks)?;

        let mut fresh = Vec::new();
        for (index, grad) in self.accumulator.iter() {
            let size = grad.size_bytes();
            match (self.m.get(&index), self.v.get(&index)) {
                (Some(m), Some(v)) if m.size_bytes() == size && v.size_bytes() == size => {}
                (None, None) => {
                    fresh.push((index, self.memory.allocate(size)?, self.memory.allocate(size)?));
                }
                _ => {
                    return Err(TrainError::Unknown(format!(
                        "Adam moments for tensor {index} are missing or mis-sized"
                    )))
                }
            }
        }
        for (index, m, v) in fresh {
            self.m.insert(index, m);
            self.v.insert(index, v);
        }

        for ((index, grad), range) in self.accumulator.iter().zip(targets) {
            let (Some(m), Some(v)) = (self.m.get_mut(&index), self.v.get_mut(&index)) else {
                return Err(TrainError::Unknown(format!("Adam moments for tensor {index} vanished")));
            };
            let weights = super::weights_mut(graph, index)?;
            apply(
                &mut weights[range.clone()],
                &grad.as_f32()?[range.clone()],
                &mut m.as_f32_mut()?[range.clone()],
                &mut v.as_f32_mut()?[range],
                &step,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(num_step: u32) -> TrainingContext {
        TrainingContext {
            learning_rate: 0.1,
            num_step,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_step_scenario() {
        let step = AdamStep::new(&ctx(1)).unwrap();
        let (mut w, mut m, mut v) = ([1.0f32; 6], [0.0f32; 6], [0.0f32; 6]);
        apply(&mut w, &[1.0; 6], &mut m, &mut v, &step);
        for i in 0..6 {
            assert!((m[i] - 0.1).abs() < 1e-6);
            assert!((v[i] - 0.001).abs() < 1e-6);
            assert!((w[i] - 0.9).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bias_correction_over_steps() {
        let g = 0.5f32;
        let (mut w, mut m, mut v) = ([0.0f32], [0.0f32], [0.0f32]);
        for t in 1..=3u32 {
            let before = w[0];
            let step = AdamStep::new(&ctx(t)).unwrap();
            apply(&mut w, &[g], &mut m, &mut v, &step);

            let m_hat = m[0] / (1.0 - 0.9f32.powi(t as i32));
            let v_hat = v[0] / (1.0 - 0.999f32.powi(t as i32));
            let expected = before - 0.1 * m_hat / (v_hat.sqrt() + 1e-7);
            assert!((w[0] - expected).abs() < 1e-6);
            // With a constant gradient the corrected moments equal g and g².
            assert!((m_hat - g).abs() < 1e-5);
            assert!((v_hat - g * g).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(matches!(
            AdamStep::new(&ctx(0)),
            Err(TrainError::FailedPrecondition(_))
        ));
    }

    #[test]
    fn test_restore_moments_replaces_state() {
        let memory = MemoryManager::with_accounting();
        let mut adam = Adam::new(memory.clone());
        let m = 0.25f32.to_le_bytes().repeat(2);
        let v = 0.5f32.to_le_bytes().repeat(2);
        adam.restore_moments(&[(3, m.as_slice(), v.as_slice())]).unwrap();
        assert!(adam.has_moments());
        assert_eq!(adam.first_moment(3).unwrap().as_f32().unwrap(), &[0.25, 0.25]);
        assert_eq!(adam.second_moment(3).unwrap().as_f32().unwrap(), &[0.5, 0.5]);
        assert_eq!(memory.current_allocated(), 16);

        adam.full_reset();
        assert!(!adam.has_moments());
        assert_eq!(memory.current_allocated(), 0);
    }
}
