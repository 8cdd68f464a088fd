// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-sample glue between forward outputs, the loss, and the optimizer.
//!
//! Targets are passed as one `f32` slice per graph output covering the whole
//! batch. Dense losses and metrics read `flat_size` values per sample at
//! `batch_index * flat_size`; sparse ones read a single label at
//! `batch_index`.

use crate::optimizer::{GradientMap, Optimizer, UpdateRankTable};
use crate::storage::{Slot, TensorStorage};
use crate::window::TrainingWindow;
use crate::{LossKind, MetricKind, TrainError, TrainingContext};
use memory_manager::MemoryManager;
use model_ir::{GraphContext, TensorIndex};
use tensor_core::ops::{loss, metric};
use tensor_core::DataType;

/// Computes output gradients and drives the optimizer's accumulate/update cycle.
#[derive(Debug, Clone)]
pub struct TrainingHandler {
    memory: MemoryManager,
}

impl TrainingHandler {
    /// Output-gradient buffers are drawn from `memory`.
    pub fn new(memory: MemoryManager) -> Self {
        Self { memory }
    }

    /// Writes `dL/dŷ` for every graph output into `backward` under the
    /// output's own tensor index.
    pub fn handle_error(
        &self,
        ctx: &TrainingContext,
        graph: &dyn GraphContext,
        forward: &TensorStorage,
        backward: &mut TensorStorage,
        targets: &[&[f32]],
        batch_index: usize,
    ) -> Result<(), TrainError> {
        check_target_count(graph, targets)?;
        for (&output, &target) in graph.output_indices().iter().zip(targets) {
            let predicted = output_values(graph, forward, output)?;
            let size_bytes = std::mem::size_of_val(predicted);

            let grad = match backward.slot(output)? {
                Slot::Occupied(slot) => slot.into_mut(),
                Slot::Vacant(slot) => slot.insert(self.memory.allocate(size_bytes)?),
            };
            if grad.size_bytes() != size_bytes {
                return Err(TrainError::Unknown(format!(
                    "gradient buffer for output {output} is {} bytes, expected {size_bytes}",
                    grad.size_bytes()
                )));
            }
            let grad = grad.as_f32_mut()?;

            match ctx.loss {
                LossKind::Mse => {
                    let t = dense_target(target, predicted.len(), batch_index, output)?;
                    loss::mse_gradient(predicted, t, grad)?;
                }
                LossKind::CrossEntropy => {
                    let t = dense_target(target, predicted.len(), batch_index, output)?;
                    loss::cross_entropy_gradient(predicted, t, grad)?;
                }
                LossKind::SparseCrossEntropy => {
                    let label = sparse_label(target, batch_index, output)?;
                    loss::sparse_cross_entropy_gradient(predicted, label, grad)?;
                }
            }
        }
        Ok(())
    }

    /// Moves the gradient of every trainable tensor out of `backward`.
    ///
    /// Fails without taking anything if one of them is missing.
    pub fn collect_gradients(
        &self,
        window: &TrainingWindow,
        backward: &mut TensorStorage,
    ) -> Result<GradientMap, TrainError> {
        if let Some(&missing) = window
            .trainable_tensors()
            .iter()
            .find(|&&index| !backward.is_bound(index))
        {
            return Err(TrainError::Unknown(format!(
                "backward pass produced no gradient for trainable tensor {missing}"
            )));
        }
        Ok(window
            .trainable_tensors()
            .iter()
            .filter_map(|&index| backward.take(index).map(|buffer| (index, buffer)))
            .collect())
    }

    pub fn accumulate(&self, optimizer: &mut Optimizer, gradients: GradientMap) -> Result<(), TrainError> {
        optimizer.accumulate(gradients)
    }

    /// Applies the accumulated gradients, then drops them. Adam moments persist.
    pub fn update_weights(
        &self,
        ctx: &TrainingContext,
        optimizer: &mut Optimizer,
        graph: &mut dyn GraphContext,
        ranks: &UpdateRankTable,
    ) -> Result<(), TrainError> {
        optimizer.update_weights(ctx, graph, ranks)?;
        optimizer.reset();
        Ok(())
    }

    /// Adds the metric of sample `batch_index` to `accumulated`.
    ///
    /// The caller initialises and owns `accumulated`; it is never reset here.
    /// With several outputs the per-output values are summed.
    pub fn evaluate_metric(
        &self,
        kind: MetricKind,
        graph: &dyn GraphContext,
        forward: &TensorStorage,
        targets: &[&[f32]],
        batch_index: usize,
        accumulated: &mut f32,
    ) -> Result<(), TrainError> {
        check_target_count(graph, targets)?;
        let mut sum = 0.0;
        for (&output, &target) in graph.output_indices().iter().zip(targets) {
            let predicted = output_values(graph, forward, output)?;
            let n = predicted.len();
            sum += match kind {
                MetricKind::Mse => metric::mse(predicted, dense_target(target, n, batch_index, output)?)?,
                MetricKind::Mae => metric::mae(predicted, dense_target(target, n, batch_index, output)?)?,
                MetricKind::CrossEntropy => {
                    metric::cross_entropy(predicted, dense_target(target, n, batch_index, output)?)?
                }
                MetricKind::Accuracy => {
                    metric::accuracy(predicted, dense_target(target, n, batch_index, output)?)?
                }
                MetricKind::SparseAccuracy => {
                    metric::sparse_accuracy(predicted, sparse_label(target, batch_index, output)?)?
                }
            };
        }
        *accumulated += sum;
        Ok(())
    }
}

fn check_target_count(graph: &dyn GraphContext, targets: &[&[f32]]) -> Result<(), TrainError> {
    let outputs = graph.output_indices().len();
    if targets.len() != outputs {
        return Err(TrainError::FailedPrecondition(format!(
            "{} target arrays for {outputs} graph outputs",
            targets.len()
        )));
    }
    Ok(())
}

fn output_values<'a>(
    graph: &dyn GraphContext,
    forward: &'a TensorStorage,
    output: TensorIndex,
) -> Result<&'a [f32], TrainError> {
    let dtype = graph.tensor(output).map(|info| info.dtype);
    if dtype != Some(DataType::Float32) {
        return Err(TrainError::UnsupportedType(format!(
            "graph output {output} must be FLOAT32"
        )));
    }
    let values = forward.values(output)?;
    let flat = forward.resolve_shape(output, graph)?.num_elements();
    if values.len() != flat {
        return Err(TrainError::Unknown(format!(
            "output {output} buffer holds {} values, live shape has {flat}",
            values.len()
        )));
    }
    Ok(values)
}

fn dense_target(
    target: &[f32],
    flat_size: usize,
    batch_index: usize,
    output: TensorIndex,
) -> Result<&[f32], TrainError> {
    let start = batch_index.checked_mul(flat_size);
    start
        .and_then(|s| target.get(s..s.checked_add(flat_size)?))
        .ok_or_else(|| {
            TrainError::FailedPrecondition(format!(
                "target for output {output} has no sample {batch_index} of {flat_size} values"
            ))
        })
}

fn sparse_label(target: &[f32], batch_index: usize, output: TensorIndex) -> Result<usize, TrainError> {
    let value = *target.get(batch_index).ok_or_else(|| {
        TrainError::FailedPrecondition(format!(
            "target for output {output} has no label for sample {batch_index}"
        ))
    })?;
    if !(value.is_finite() && value >= 0.0 && value.fract() == 0.0) {
        return Err(TrainError::FailedPrecondition(format!(
            "label {value} for output {output} is not a class index"
        )));
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptimizerKind;
    use model_ir::{graph::Validated, GraphBuilder, ModelGraph, Opcode};
    use tensor_core::Shape;

    /// x[1,3] -> Softmax -> y[1,3]
    fn graph() -> ModelGraph<Validated> {
        let mut b = GraphBuilder::new("head");
        let x = b.add_tensor("x", Shape::matrix(1, 3), DataType::Float32);
        let y = b.add_tensor("y", Shape::matrix(1, 3), DataType::Float32);
        b.add_operator(Opcode::Softmax, vec![x], vec![y]);
        b.set_inputs(vec![x]);
        b.set_outputs(vec![y]);
        b.build().validate().unwrap()
    }

    fn forward_with(memory: &MemoryManager, values: &[f32]) -> TensorStorage {
        let mut storage = TensorStorage::new(2);
        let mut buf = memory.allocate(values.len() * 4).unwrap();
        buf.as_f32_mut().unwrap().copy_from_slice(values);
        if let Slot::Vacant(slot) = storage.slot(1).unwrap() {
            slot.insert(buf);
        }
        storage
    }

    #[test]
    fn test_mse_gradient_uses_batch_offset() {
        let g = graph();
        let memory = MemoryManager::new();
        let forward = forward_with(&memory, &[1.0, 2.0, 3.0]);
        let mut backward = TensorStorage::new(2);
        let handler = TrainingHandler::new(memory);
        let targets = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0];

        let ctx = TrainingContext::default();
        handler
            .handle_error(&ctx, &g, &forward, &mut backward, &[&targets], 1)
            .unwrap();
        assert_eq!(backward.values(1).unwrap(), &[0.0, 0.0, 0.0]);

        handler
            .handle_error(&ctx, &g, &forward, &mut backward, &[&targets], 0)
            .unwrap();
        let grad = backward.values(1).unwrap();
        assert!((grad[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_sparse_cross_entropy_uses_label_offset() {
        let g = graph();
        let memory = MemoryManager::new();
        let forward = forward_with(&memory, &[0.2, 0.5, 0.3]);
        let mut backward = TensorStorage::new(2);
        let handler = TrainingHandler::new(memory);
        let ctx = TrainingContext {
            loss: LossKind::SparseCrossEntropy,
            ..Default::default()
        };
        let labels = [0.0, 1.0];
        handler
            .handle_error(&ctx, &g, &forward, &mut backward, &[&labels], 1)
            .unwrap();
        let grad = backward.values(1).unwrap();
        assert_eq!(grad[0], 0.0);
        assert!((grad[1] + 2.0).abs() < 1e-4);
        assert_eq!(grad[2], 0.0);
    }

    #[test]
    fn test_target_out_of_range() {
        let g = graph();
        let memory = MemoryManager::new();
        let forward = forward_with(&memory, &[1.0, 2.0, 3.0]);
        let mut backward = TensorStorage::new(2);
        let handler = TrainingHandler::new(memory);
        let err = handler
            .handle_error(&TrainingContext::default(), &g, &forward, &mut backward, &[&[1.0, 2.0, 3.0]], 1)
            .unwrap_err();
        assert!(matches!(err, TrainError::FailedPrecondition(_)));
        assert!(handler
            .handle_error(&TrainingContext::default(), &g, &forward, &mut backward, &[], 0)
            .is_err());
    }

    #[test]
    fn test_bad_sparse_label() {
        assert!(sparse_label(&[1.5], 0, 0).is_err());
        assert!(sparse_label(&[-1.0], 0, 0).is_err());
        assert_eq!(sparse_label(&[4.0], 0, 0).unwrap(), 4);
    }

    #[test]
    fn test_evaluate_metric_is_additive() {
        let g = graph();
        let memory = MemoryManager::new();
        let forward = forward_with(&memory, &[0.1, 0.7, 0.2]);
        let handler = TrainingHandler::new(memory);

        let mut acc = 1.0;
        handler
            .evaluate_metric(MetricKind::SparseAccuracy, &g, &forward, &[&[1.0]], 0, &mut acc)
            .unwrap();
        assert_eq!(acc, 2.0);
        handler
            .evaluate_metric(MetricKind::Accuracy, &g, &forward, &[&[0.0, 0.0, 1.0]], 0, &mut acc)
            .unwrap();
        assert_eq!(acc, 2.0);
        handler
            .evaluate_metric(MetricKind::Mae, &g, &forward, &[&[0.1, 0.7, 0.2]], 0, &mut acc)
            .unwrap();
        assert_eq!(acc, 2.0);
    }

    #[test]
    fn test_collect_and_update_cycle() {
        let mut b = GraphBuilder::new("fc");
        let x = b.add_tensor("x", Shape::matrix(1, 3), DataType::Float32);
        let w = b.add_const_f32("w", Shape::matrix(2, 3), &[1.0; 6]).unwrap();
        let y = b.add_tensor("y", Shape::matrix(1, 2), DataType::Float32);
        b.add_operator(Opcode::FullyConnected, vec![x, w], vec![y]);
        b.set_inputs(vec![x]);
        b.set_outputs(vec![y]);
        let mut graph = b.build().validate().unwrap();

        let memory = MemoryManager::with_accounting();
        let handler = TrainingHandler::new(memory.clone());
        let window = TrainingWindow::new(&graph, 0);
        let mut backward = TensorStorage::new(3);

        assert!(handler.collect_gradients(&window, &mut backward).is_err());

        let mut grad = memory.allocate(24).unwrap();
        grad.as_f32_mut().unwrap().fill(1.0);
        if let Slot::Vacant(slot) = backward.slot(w).unwrap() {
            slot.insert(grad);
        }
        let grads = handler.collect_gradients(&window, &mut backward).unwrap();
        assert!(!backward.is_bound(w));

        let ctx = TrainingContext {
            learning_rate: 0.1,
            ..Default::default()
        };
        let mut optimizer = Optimizer::new(OptimizerKind::Sgd, memory.clone());
        handler.accumulate(&mut optimizer, grads).unwrap();
        handler
            .update_weights(&ctx, &mut optimizer, &mut graph, &UpdateRankTable::new())
            .unwrap();
        assert!(optimizer.accumulator().is_empty());
        assert_eq!(memory.current_allocated(), 0);
        let weights = graph.const_data(w).unwrap().as_f32().unwrap();
        assert!(weights.iter().all(|&v| (v - 0.9).abs() < 1e-6));
    }
}
