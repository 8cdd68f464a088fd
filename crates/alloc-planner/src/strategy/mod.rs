// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`PlanningStrategy`] trait and strategy implementations.

pub mod liveness;
pub mod retained;

use crate::{AllocationPlan, PlannerError};
use memory_manager::MemoryBudget;
use model_ir::{GraphContext, TensorIndex};

/// Trait for allocation planning strategies.
///
/// Each strategy takes a graph and an optional memory budget and produces an
/// [`AllocationPlan`] whose estimated peak respects the budget.
///
/// Strategies are purely algorithmic, with no I/O, so they are unit-testable
/// against small hand-built graphs.
pub trait PlanningStrategy: Send + Sync {
    /// Human-readable name of this strategy.
    fn name(&self) -> &str;

    fn plan(
        &self,
        graph: &dyn GraphContext,
        budget: Option<MemoryBudget>,
    ) -> Result<AllocationPlan, PlannerError>;
}

/// First and last step touching each non-constant, non-input tensor.
pub(crate) struct Lifetimes {
    pub first: Vec<Option<usize>>,
    pub last: Vec<Option<usize>>,
}

impl Lifetimes {
    pub fn compute(graph: &dyn GraphContext) -> Result<Self, PlannerError> {
        if graph.operator_count() == 0 {
            return Err(PlannerError::EmptyGraph);
        }
        let count = graph.tensor_count();
        let mut first = vec![None; count];
        let mut last = vec![None; count];

        for step in 0..graph.operator_count() {
            let Some(op) = graph.operator(step) else {
                continue;
            };
            for &index in op.inputs.iter().chain(&op.outputs) {
                if !is_planned(graph, index) {
                    continue;
                }
                first[index].get_or_insert(step);
                last[index] = Some(step);
            }
        }
        Ok(Self { first, last })
    }

    /// Planned tensors in index order with their first and last step.
    pub fn iter(&self) -> impl Iterator<Item = (TensorIndex, usize, usize)> + '_ {
        self.first
            .iter()
            .zip(&self.last)
            .enumerate()
            .filter_map(|(index, (f, l))| Some((index, (*f)?, (*l)?)))
    }
}

/// Constants live in the graph and inputs are allocated separately.
fn is_planned(graph: &dyn GraphContext, index: TensorIndex) -> bool {
    matches!(graph.tensor(index), Some(info) if !info.is_const)
        && !graph.input_indices().contains(&index)
}
