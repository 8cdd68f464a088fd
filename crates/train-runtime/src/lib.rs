// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # train-runtime
//!
//! On-device training over a pre-parsed graph under a fixed memory plan.
//!
//! The runtime takes:
//! - A graph implementing `GraphContext` from `model-ir`.
//! - An `AllocationPlan` from `alloc-planner`.
//! - A `MemoryManager` from `memory-manager`.
//! - Forward/backward math supplied by the caller through [`Kernels`].
//!
//! And runs batches through them: the [`RuntimeAllocator`] materialises
//! tensors into [`TensorStorage`] step by step, the [`TrainingHandler`]
//! turns outputs into loss gradients and feeds the [`Optimizer`], and the
//! [`checkpoint`] module persists and restores the whole training state.
//!
//! # Execution model
//! Everything is synchronous and single-threaded. Every operation runs to
//! completion before returning; there are no suspension points.

pub mod checkpoint;
mod allocator;
mod config;
mod context;
mod engine;
mod error;
mod handler;
mod kernel;
mod metrics;
pub mod optimizer;
mod storage;
mod window;

pub use allocator::RuntimeAllocator;
pub use checkpoint::{read_checkpoint, write_checkpoint, CheckpointSummary};
pub use config::RuntimeConfig;
pub use context::{LossKind, MetricKind, OptimizerKind, TrainingContext};
pub use engine::TrainingEngine;
pub use error::TrainError;
pub use handler::TrainingHandler;
pub use kernel::{KernelContext, Kernels, TensorReads};
pub use metrics::{StepMetrics, TrainingMetrics};
pub use optimizer::{Optimizer, UpdateRank, UpdateRankTable};
pub use storage::{Slot, TensorStorage};
pub use window::TrainingWindow;
