// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # alloc-planner
//!
//! Builds per-step allocate/free lists for a graph using pluggable strategies,
//! and checks their estimated peak against a memory budget.
//!
//! # Strategies
//!
//! | Strategy | Frees within a pass | Peak | Use |
//! |---|---|---|---|
//! | [`Liveness`] | after last consumer | Lowest | Inference, evaluation |
//! | [`Retained`] | never | Highest | Training (backward reads activations) |
//!
//! Plans never contain constant tensors or graph inputs, and graph outputs
//! are never freed by a plan.
//!
//! # Example
//! ```
//! use alloc_planner::{Liveness, PlanningStrategy};
//! use model_ir::{GraphBuilder, Opcode};
//! use tensor_core::{DataType, Shape};
//!
//! let mut b = GraphBuilder::new("tiny");
//! let x = b.add_tensor("x", Shape::vector(4), DataType::Float32);
//! let y = b.add_tensor("y", Shape::vector(4), DataType::Float32);
//! b.add_operator(Opcode::Relu, vec![x], vec![y]);
//! b.set_inputs(vec![x]);
//! b.set_outputs(vec![y]);
//! let graph = b.build().validate().unwrap();
//!
//! let plan = Liveness::new().plan(&graph, None).unwrap();
//! println!("{}", plan.summary());
//! ```

mod error;
pub(crate) mod plan;
pub mod strategy;

pub use error::PlannerError;
pub use plan::AllocationPlan;
pub use strategy::liveness::Liveness;
pub use strategy::retained::Retained;
pub use strategy::PlanningStrategy;

use memory_manager::MemoryBudget;
use model_ir::GraphContext;

/// Picks a strategy for the kind of pass and plans with it.
///
/// Training keeps activations alive for the backward pass ([`Retained`]);
/// forward-only passes free them eagerly ([`Liveness`]).
pub fn auto_plan(
    graph: &dyn GraphContext,
    budget: Option<MemoryBudget>,
    training: bool,
) -> Result<AllocationPlan, PlannerError> {
    let plan = if training {
        Retained::new().plan(graph, budget)?
    } else {
        Liveness::new().plan(graph, budget)?
    };
    tracing::info!("{}", plan.summary());
    Ok(plan)
}
