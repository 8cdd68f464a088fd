// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the training runtime.

use model_ir::TensorIndex;

/// Errors that can occur while planning, training or checkpointing.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    /// Generic failure; also signals internal state corruption such as a
    /// missing gradient for a tensor that must have one.
    #[error("training failed: {0}")]
    Unknown(String),

    /// A tensor has a data type or rank the operation cannot handle.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The call is not valid in the current state or with these arguments.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// A checkpoint does not match the format or the live graph.
    #[error("cannot read checkpoint: {0}")]
    FailReadCheckpointFile(String),

    /// A tensor slot was allocated while it still held a live buffer.
    #[error("tensor {index} is already allocated")]
    DoubleAllocation { index: TensorIndex },

    /// The byte size of a tensor does not fit in `usize`.
    #[error("byte size of tensor {index} overflows")]
    Overflow { index: TensorIndex },

    /// Invalid runtime or training configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("memory error: {0}")]
    Memory(#[from] memory_manager::MemoryError),

    #[error("tensor error: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    #[error("planner error: {0}")]
    Planner(#[from] alloc_planner::PlannerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
