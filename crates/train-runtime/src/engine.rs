// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The training engine: one graph, one optimizer, one memory manager.
//!
//! ```text
//! for each sample in the batch:
//!     forward  (allocate_for_step → kernel → deallocate_for_step)
//!     handle_error            output gradients from the loss
//!     backward (trailing window, reverse order)
//!     accumulate              trainable gradients into the optimizer
//! num_step += 1
//! update_weights → reset
//! ```
//!
//! A failed step drops the partial gradient sums and every live buffer, and
//! leaves `num_step` and the weights where they were.

use crate::checkpoint::{read_checkpoint, write_checkpoint};
use crate::kernel::{KernelContext, Kernels};
use crate::optimizer::{Optimizer, UpdateRank, UpdateRankTable};
use crate::{
    RuntimeAllocator, RuntimeConfig, TensorStorage, TrainError, TrainingContext, TrainingHandler,
    TrainingMetrics, TrainingWindow,
};
use alloc_planner::{Liveness, PlanningStrategy};
use memory_manager::{MemoryManager, MemoryStats};
use model_ir::{GraphContext, TensorIndex};
use std::path::Path;
use std::time::Instant;
use tensor_core::{DataType, Shape};

// ── Workspace ──────────────────────────────────────────────────

/// Forward and backward storage plus the manager that feeds them.
#[derive(Debug)]
struct Workspace {
    forward: TensorStorage,
    backward: TensorStorage,
    memory: MemoryManager,
}

impl Workspace {
    fn kernel_context<'a>(&'a mut self, graph: &'a dyn GraphContext) -> KernelContext<'a> {
        KernelContext::new(graph, &mut self.forward, &mut self.backward, &self.memory)
    }

    /// Binds the graph inputs and copies sample `sample` into them.
    fn load_inputs(
        &mut self,
        graph: &dyn GraphContext,
        allocator: &RuntimeAllocator,
        inputs: &[&[f32]],
        sample: usize,
    ) -> Result<(), TrainError> {
        let indices = graph.input_indices();
        if inputs.len() != indices.len() {
            return Err(TrainError::FailedPrecondition(format!(
                "{} input arrays for {} graph inputs",
                inputs.len(),
                indices.len()
            )));
        }
        allocator.allocate_graph_inputs(graph, &mut self.forward)?;
        for (&index, &data) in indices.iter().zip(inputs) {
            if graph.tensor(index).map(|info| info.dtype) != Some(DataType::Float32) {
                return Err(TrainError::UnsupportedType(format!(
                    "graph input {index} must be FLOAT32"
                )));
            }
            let flat = self.forward.resolve_shape(index, graph)?.num_elements();
            let values = sample
                .checked_mul(flat)
                .and_then(|start| data.get(start..start.checked_add(flat)?))
                .ok_or_else(|| {
                    TrainError::FailedPrecondition(format!(
                        "input {index} has no sample {sample} of {flat} values"
                    ))
                })?;
            let buffer = self
                .forward
                .get_mut(index)
                .ok_or_else(|| TrainError::Unknown(format!("graph input {index} not bound")))?;
            buffer.as_f32_mut()?.copy_from_slice(values);
        }
        Ok(())
    }

    fn forward_pass<K: Kernels + ?Sized>(
        &mut self,
        graph: &dyn GraphContext,
        allocator: &RuntimeAllocator,
        kernels: &mut K,
        inputs: &[&[f32]],
        sample: usize,
    ) -> Result<(), TrainError> {
        self.load_inputs(graph, allocator, inputs, sample)?;
        for step in 0..graph.operator_count() {
            let op = operator(graph, step)?;
            allocator.allocate_for_step(step, graph, &mut self.forward)?;
            kernels.forward(step, op, &mut self.kernel_context(graph))?;
            allocator.deallocate_for_step(step, &mut self.forward);
        }
        Ok(())
    }

    fn backward_pass<K: Kernels + ?Sized>(
        &mut self,
        graph: &dyn GraphContext,
        window: &TrainingWindow,
        kernels: &mut K,
    ) -> Result<(), TrainError> {
        for step in window.backward_order() {
            let op = operator(graph, step)?;
            kernels.backward(step, op, &mut self.kernel_context(graph))?;
        }
        Ok(())
    }

    fn clear(&mut self, allocator: &RuntimeAllocator) {
        allocator.reset_all(&mut self.forward);
        allocator.reset_all(&mut self.backward);
    }
}

fn operator(graph: &dyn GraphContext, step: usize) -> Result<&model_ir::OperatorDef, TrainError> {
    graph
        .operator(step)
        .ok_or_else(|| TrainError::FailedPrecondition(format!("no operator at step {step}")))
}

// ── Engine ─────────────────────────────────────────────────────

/// Drives training and evaluation of a graph through external kernels.
///
/// # Example
/// ```no_run
/// use train_runtime::{Kernels, RuntimeConfig, TrainingEngine};
/// # fn example<G: model_ir::GraphContext, K: Kernels>(graph: G, kernels: &mut K)
/// #     -> Result<(), train_runtime::TrainError> {
/// let config = RuntimeConfig::from_file("train.toml".as_ref())?;
/// let mut engine = TrainingEngine::new(graph, &config)?;
/// engine.train_single_step(kernels, &[&[0.5, 1.0]], &[&[1.0]])?;
/// let checkpoint = engine.save_checkpoint()?;
/// # Ok(())
/// # }
/// ```
pub struct TrainingEngine<G: GraphContext> {
    graph: G,
    context: TrainingContext,
    workspace: Workspace,
    train_allocator: RuntimeAllocator,
    eval_allocator: RuntimeAllocator,
    optimizer: Optimizer,
    handler: TrainingHandler,
    window: TrainingWindow,
    ranks: UpdateRankTable,
    metrics: TrainingMetrics,
}

impl<G: GraphContext> TrainingEngine<G> {
    /// Plans both passes and builds the optimizer `config` asks for.
    ///
    /// Training passes use the configured strategy (`Retained` on `"auto"`);
    /// evaluation passes always use `Liveness`.
    pub fn new(graph: G, config: &RuntimeConfig) -> Result<Self, TrainError> {
        let context = config.training.clone();
        context.validate()?;
        let memory = config.memory_manager()?;
        let budget = config.parse_budget()?;

        let train_plan = match config.create_strategy()? {
            Some(strategy) => strategy.plan(&graph, budget)?,
            None => alloc_planner::auto_plan(&graph, budget, true)?,
        };
        let eval_plan = Liveness::new().plan(&graph, budget)?;
        let window = TrainingWindow::new(&graph, context.num_of_train_layers);

        tracing::info!(
            "training engine: {} optimizer, {} loss, train plan '{}' (peak {} bytes), \
             {} trainable tensors",
            context.optimizer,
            context.loss,
            train_plan.strategy_name,
            train_plan.peak_bytes,
            window.trainable_tensors().len()
        );

        let tensor_count = graph.tensor_count();
        Ok(Self {
            graph,
            optimizer: Optimizer::new(context.optimizer, memory.clone()),
            handler: TrainingHandler::new(memory.clone()),
            train_allocator: RuntimeAllocator::new(train_plan, memory.clone()),
            eval_allocator: RuntimeAllocator::new(eval_plan, memory.clone()),
            workspace: Workspace {
                forward: TensorStorage::new(tensor_count),
                backward: TensorStorage::new(tensor_count),
                memory,
            },
            context,
            window,
            ranks: UpdateRankTable::new(),
            metrics: TrainingMetrics::new(),
        })
    }

    // ── Training ───────────────────────────────────────────────

    /// Runs one optimizer step over `batch_size` samples.
    ///
    /// `inputs` holds one array per graph input and `targets` one per graph
    /// output, each covering the whole batch.
    pub fn train_single_step<K: Kernels + ?Sized>(
        &mut self,
        kernels: &mut K,
        inputs: &[&[f32]],
        targets: &[&[f32]],
    ) -> Result<(), TrainError> {
        if self.window.is_empty() {
            return Err(TrainError::FailedPrecondition(
                "training window holds no trainable tensors".into(),
            ));
        }
        let start = Instant::now();
        match self.run_step(kernels, inputs, targets) {
            Ok(()) => {
                self.metrics.record_step(
                    self.context.num_step,
                    self.context.batch_size as usize,
                    start.elapsed(),
                    self.workspace.memory.peak_allocated(),
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("training step {} failed, rolled back: {e}", self.context.num_step.saturating_add(1));
                self.optimizer.reset();
                self.workspace.clear(&self.train_allocator);
                self.metrics.record_failure();
                Err(e)
            }
        }
    }

    fn run_step<K: Kernels + ?Sized>(
        &mut self,
        kernels: &mut K,
        inputs: &[&[f32]],
        targets: &[&[f32]],
    ) -> Result<(), TrainError> {
        for sample in 0..self.context.batch_size as usize {
            self.workspace
                .forward_pass(&self.graph, &self.train_allocator, kernels, inputs, sample)?;
            self.handler.handle_error(
                &self.context,
                &self.graph,
                &self.workspace.forward,
                &mut self.workspace.backward,
                targets,
                sample,
            )?;
            self.workspace.backward_pass(&self.graph, &self.window, kernels)?;
            let gradients = self
                .handler
                .collect_gradients(&self.window, &mut self.workspace.backward)?;
            self.handler.accumulate(&mut self.optimizer, gradients)?;
            self.workspace.clear(&self.train_allocator);
        }

        let previous = self.context.num_step;
        self.context.num_step = previous
            .checked_add(1)
            .ok_or_else(|| TrainError::FailedPrecondition("num_step overflow".into()))?;
        let updated = self.handler.update_weights(
            &self.context,
            &mut self.optimizer,
            &mut self.graph,
            &self.ranks,
        );
        if updated.is_err() {
            self.context.num_step = previous;
        }
        updated
    }

    /// Mean metric over the first `samples` samples of `inputs`/`targets`.
    pub fn evaluate<K: Kernels + ?Sized>(
        &mut self,
        kernels: &mut K,
        inputs: &[&[f32]],
        targets: &[&[f32]],
        samples: usize,
    ) -> Result<f32, TrainError> {
        if samples == 0 {
            return Err(TrainError::FailedPrecondition("evaluate needs at least one sample".into()));
        }
        let mut accumulated = 0.0f32;
        for sample in 0..samples {
            let result = self
                .workspace
                .forward_pass(&self.graph, &self.eval_allocator, kernels, inputs, sample)
                .and_then(|()| {
                    self.handler.evaluate_metric(
                        self.context.metric,
                        &self.graph,
                        &self.workspace.forward,
                        targets,
                        sample,
                        &mut accumulated,
                    )
                });
            self.workspace.clear(&self.eval_allocator);
            result?;
        }
        let mean = accumulated / samples as f32;
        tracing::debug!("{} over {samples} samples: {mean}", self.context.metric);
        Ok(mean)
    }

    /// Advances the epoch counter, logs and clears the epoch's metrics, and
    /// returns the new epoch.
    pub fn finish_epoch(&mut self) -> Result<u32, TrainError> {
        self.context.num_epoch = self
            .context
            .num_epoch
            .checked_add(1)
            .ok_or_else(|| TrainError::FailedPrecondition("num_epoch overflow".into()))?;
        tracing::info!("epoch {} finished: {}", self.context.num_epoch, self.metrics.summary());
        self.metrics.reset();
        Ok(self.context.num_epoch)
    }

    /// Restricts updates of trainable tensor `index` to a depth slice.
    pub fn set_update_rank(&mut self, index: TensorIndex, rank: UpdateRank) -> Result<(), TrainError> {
        if !self.window.is_trainable(index) {
            return Err(TrainError::FailedPrecondition(format!(
                "tensor {index} is not trainable"
            )));
        }
        self.ranks.set(index, rank);
        Ok(())
    }

    /// Overrides the shape of `index` for later passes.
    pub fn set_dynamic_shape(&mut self, index: TensorIndex, shape: Shape) -> Result<(), TrainError> {
        self.workspace.forward.set_dynamic_shape(index, shape)
    }

    /// Drops every shape override; later passes use the static shapes.
    pub fn clear_dynamic_shapes(&mut self) {
        self.workspace.forward.clear_dynamic_shapes();
    }

    // ── Checkpoints ────────────────────────────────────────────

    pub fn save_checkpoint(&self) -> Result<Vec<u8>, TrainError> {
        write_checkpoint(&self.context, &self.graph, &self.window, &self.optimizer)
    }

    /// Restores weights, optimizer state and counters; on error nothing changes.
    pub fn load_checkpoint(&mut self, bytes: &[u8]) -> Result<(), TrainError> {
        read_checkpoint(
            bytes,
            &mut self.context,
            &mut self.graph,
            &self.window,
            &mut self.optimizer,
        )
    }

    pub fn save_checkpoint_to_file(&self, path: &Path) -> Result<(), TrainError> {
        let bytes = self.save_checkpoint()?;
        std::fs::write(path, &bytes)?;
        tracing::info!("checkpoint saved to '{}' ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Memory-maps `path` and restores from it.
    pub fn load_checkpoint_from_file(&mut self, path: &Path) -> Result<(), TrainError> {
        let file = std::fs::File::open(path).map_err(|e| {
            TrainError::FailReadCheckpointFile(format!("cannot open '{}': {e}", path.display()))
        })?;
        // SAFETY: the map is read-only and dropped before returning; the file
        // must not be truncated by another process while it is mapped.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| {
            TrainError::FailReadCheckpointFile(format!("mmap of '{}' failed: {e}", path.display()))
        })?;
        self.load_checkpoint(&mmap)?;
        tracing::info!("checkpoint loaded from '{}'", path.display());
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn context(&self) -> &TrainingContext {
        &self.context
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable graph access, e.g. to initialise weights before training.
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    pub fn into_graph(self) -> G {
        self.graph
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub fn window(&self) -> &TrainingWindow {
        &self.window
    }

    pub fn train_allocator(&self) -> &RuntimeAllocator {
        &self.train_allocator
    }

    pub fn eval_allocator(&self) -> &RuntimeAllocator {
        &self.eval_allocator
    }

    /// Accounting snapshot; `None` when accounting is off.
    pub fn memory_stats(&self) -> Option<MemoryStats> {
        self.workspace.memory.stats()
    }

    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }
}

impl<G: GraphContext> std::fmt::Debug for TrainingEngine<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingEngine")
            .field("optimizer", &self.context.optimizer)
            .field("num_step", &self.context.num_step)
            .field("num_epoch", &self.context.num_epoch)
            .field("train_plan", &self.train_allocator.plan().strategy_name)
            .field("trainable", &self.window.trainable_tensors())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{graph::Validated, GraphBuilder, ModelGraph, Opcode, OperatorDef};

    /// y = w ⊙ x, elementwise over three values.
    struct Scale;

    impl Kernels for Scale {
        fn forward(&mut self, _: usize, op: &OperatorDef, ctx: &mut KernelContext<'_>) -> Result<(), TrainError> {
            let (x, w) = (op.inputs[0], op.inputs[1]);
            ctx.with_output(op.outputs[0], |reads, out| {
                let (x, w) = (reads.value(x)?, reads.value(w)?);
                for ((o, a), b) in out.iter_mut().zip(x).zip(w) {
                    *o = a * b;
                }
                Ok(())
            })
        }

        fn backward(&mut self, _: usize, op: &OperatorDef, ctx: &mut KernelContext<'_>) -> Result<(), TrainError> {
            let (x, w, y) = (op.inputs[0], op.inputs[1], op.outputs[0]);
            ctx.with_gradient(w, |reads, dw| {
                let (x, dy) = (reads.value(x)?, reads.gradient(y)?);
                for ((g, a), d) in dw.iter_mut().zip(x).zip(dy) {
                    *g += a * d;
                }
                Ok(())
            })
        }
    }

    /// Fails every forward call.
    struct Broken;

    impl Kernels for Broken {
        fn forward(&mut self, _: usize, _: &OperatorDef, _: &mut KernelContext<'_>) -> Result<(), TrainError> {
            Err(TrainError::Unknown("kernel failed".into()))
        }

        fn backward(&mut self, _: usize, _: &OperatorDef, _: &mut KernelContext<'_>) -> Result<(), TrainError> {
            Ok(())
        }
    }

    fn scale_graph() -> ModelGraph<Validated> {
        let mut b = GraphBuilder::new("scale");
        let x = b.add_tensor("x", Shape::vector(3), DataType::Float32);
        let w = b.add_const_f32("w", Shape::vector(3), &[1.0, 1.0, 1.0]).unwrap();
        let y = b.add_tensor("y", Shape::vector(3), DataType::Float32);
        b.add_operator(Opcode::Mul, vec![x, w], vec![y]);
        b.set_inputs(vec![x]);
        b.set_outputs(vec![y]);
        b.build().validate().unwrap()
    }

    fn fc_graph() -> ModelGraph<Validated> {
        let mut b = GraphBuilder::new("fc");
        let x = b.add_tensor("x", Shape::vector(3), DataType::Float32);
        let w = b.add_const_f32("w", Shape::vector(3), &[1.0, 1.0, 1.0]).unwrap();
        let y = b.add_tensor("y", Shape::vector(3), DataType::Float32);
        b.add_operator(Opcode::FullyConnected, vec![x, w], vec![y]);
        b.set_inputs(vec![x]);
        b.set_outputs(vec![y]);
        b.build().validate().unwrap()
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            training: TrainingContext {
                learning_rate: 0.1,
                ..Default::default()
            },
            track_memory: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_plans_both_passes() {
        let engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        assert_eq!(engine.train_allocator().plan().strategy_name, "retained");
        assert_eq!(engine.eval_allocator().plan().strategy_name, "liveness");
        assert_eq!(engine.window().trainable_tensors(), &[1]);
        assert!(format!("{engine:?}").contains("TrainingEngine"));
    }

    #[test]
    fn test_empty_window_rejected() {
        // Mul carries no trainable weights.
        let mut engine = TrainingEngine::new(scale_graph(), &config()).unwrap();
        let err = engine
            .train_single_step(&mut Scale, &[&[1.0, 2.0, 3.0]], &[&[0.0; 3]])
            .unwrap_err();
        assert!(matches!(err, TrainError::FailedPrecondition(_)));
    }

    #[test]
    fn test_single_step_updates_weights_and_counter() {
        let mut engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        engine
            .train_single_step(&mut Scale, &[&[1.0, 2.0, 3.0]], &[&[0.0; 3]])
            .unwrap();
        assert_eq!(engine.context().num_step, 1);
        // dL/dy = 2(y - t)/3 = 2x/3, dL/dw = 2x²/3, w -= 0.1 · dL/dw
        let w = engine.graph().const_data(1).unwrap().as_f32().unwrap();
        let expected = [1.0 - 0.2 / 3.0, 1.0 - 0.8 / 3.0, 1.0 - 1.8 / 3.0];
        for (a, b) in w.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
        let stats = engine.memory_stats().unwrap();
        assert_eq!(stats.current_allocated_bytes, 0);
        assert_eq!(engine.metrics().num_steps(), 1);
    }

    #[test]
    fn test_failed_step_rolls_back() {
        let mut engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        let err = engine
            .train_single_step(&mut Broken, &[&[1.0, 2.0, 3.0]], &[&[0.0; 3]])
            .unwrap_err();
        assert!(matches!(err, TrainError::Unknown(_)));
        assert_eq!(engine.context().num_step, 0);
        assert!(engine.optimizer().accumulator().is_empty());
        assert_eq!(engine.memory_stats().unwrap().current_allocated_bytes, 0);
        assert_eq!(engine.metrics().failed_steps, 1);
        assert_eq!(
            engine.graph().const_data(1).unwrap().as_f32().unwrap(),
            &[1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_evaluate_mean_and_zero_samples() {
        let mut engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        let inputs = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0];
        let targets = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        // MSE per sample: 0 and 4.
        let mse = engine.evaluate(&mut Scale, &[&inputs], &[&targets], 2).unwrap();
        assert!((mse - 2.0).abs() < 1e-6);
        assert!(engine.evaluate(&mut Scale, &[&inputs], &[&targets], 0).is_err());
        assert!(engine.evaluate(&mut Scale, &[&inputs], &[&targets], 3).is_err());
        assert_eq!(engine.memory_stats().unwrap().current_allocated_bytes, 0);
    }

    #[test]
    fn test_set_update_rank_requires_trainable() {
        let mut engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        assert!(engine.set_update_rank(1, UpdateRank::UpperHalf).is_ok());
        assert!(engine.set_update_rank(0, UpdateRank::UpperHalf).is_err());
    }

    #[test]
    fn test_dynamic_shape_override_and_clear() {
        let mut engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        engine
            .set_dynamic_shape(2, Shape::new(vec![usize::MAX, 2]))
            .unwrap();
        let err = engine
            .train_single_step(&mut Scale, &[&[1.0, 2.0, 3.0]], &[&[0.0; 3]])
            .unwrap_err();
        assert!(matches!(err, TrainError::Overflow { index: 2 }));
        assert!(engine.set_dynamic_shape(9, Shape::vector(1)).is_err());

        engine.clear_dynamic_shapes();
        engine
            .train_single_step(&mut Scale, &[&[1.0, 2.0, 3.0]], &[&[0.0; 3]])
            .unwrap();
        assert_eq!(engine.context().num_step, 1);
    }

    #[test]
    fn test_finish_epoch_resets_metrics() {
        let mut engine = TrainingEngine::new(fc_graph(), &config()).unwrap();
        engine
            .train_single_step(&mut Scale, &[&[1.0, 2.0, 3.0]], &[&[0.0; 3]])
            .unwrap();
        assert_eq!(engine.metrics().num_steps(), 1);

        assert_eq!(engine.finish_epoch().unwrap(), 1);
        assert_eq!(engine.context().num_epoch, 1);
        assert_eq!(engine.context().num_step, 1);
        assert_eq!(engine.metrics().num_steps(), 0);
        assert!(engine.metrics().last_step.is_none());
    }
}
