// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the allocation planner.

use model_ir::TensorIndex;

/// Errors that can occur while building or checking an allocation plan.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// The graph has no operators to plan for.
    #[error("cannot plan an empty model graph")]
    EmptyGraph,

    /// The estimated peak exceeds the memory budget.
    #[error("budget too small: plan peaks at {required_bytes} bytes, budget is {budget_bytes}")]
    BudgetTooSmall {
        required_bytes: usize,
        budget_bytes: usize,
    },

    /// A plan breaks one of the allocate/free invariants.
    #[error("plan '{strategy}' is invalid: {detail}")]
    InvalidPlan { strategy: String, detail: String },

    /// A tensor's byte size does not fit in `usize`.
    #[error("byte size of tensor {index} overflows")]
    SizeOverflow { index: TensorIndex },
}
