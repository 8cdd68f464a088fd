// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Liveness planning strategy.
//!
//! Allocates each intermediate tensor before the first step that touches it
//! and frees it after the last step that reads it. Graph outputs are never
//! freed. This gives the lowest peak for a forward-only pass.
//!
//! # When to use
//! - Inference and metric evaluation, where activations are not needed
//!   after their consumers have run.

use crate::plan::PlanBuilder;
use crate::strategy::{Lifetimes, PlanningStrategy};
use crate::{AllocationPlan, PlannerError};
use memory_manager::MemoryBudget;
use model_ir::GraphContext;

/// Free every intermediate after its last consumer.
#[derive(Debug, Clone, Default)]
pub struct Liveness;

impl Liveness {
    pub fn new() -> Self {
        Self
    }
}

impl PlanningStrategy for Liveness {
    fn name(&self) -> &str {
        "liveness"
    }

    fn plan(
        &self,
        graph: &dyn GraphContext,
        budget: Option<MemoryBudget>,
    ) -> Result<AllocationPlan, PlannerError> {
        let lifetimes = Lifetimes::compute(graph)?;
        let mut builder = PlanBuilder::new(self.name(), graph.operator_count());

        for (index, first, last) in lifetimes.iter() {
            builder.allocate(first, index);
            if !graph.output_indices().contains(&index) {
                builder.free(last, index);
            }
        }

        builder.build(graph, budget.map(|b| b.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{graph::Validated, GraphBuilder, ModelGraph, Opcode};
    use tensor_core::{DataType, Shape};

    /// x[8] -> Relu -> a -> Tanh -> b -> Logistic -> y, all 32 bytes.
    fn chain() -> ModelGraph<Validated> {
        let mut g = GraphBuilder::new("chain");
        let x = g.add_tensor("x", Shape::vector(8), DataType::Float32);
        let a = g.add_tensor("a", Shape::vector(8), DataType::Float32);
        let b = g.add_tensor("b", Shape::vector(8), DataType::Float32);
        let y = g.add_tensor("y", Shape::vector(8), DataType::Float32);
        g.add_operator(Opcode::Relu, vec![x], vec![a]);
        g.add_operator(Opcode::Tanh, vec![a], vec![b]);
        g.add_operator(Opcode::Logistic, vec![b], vec![y]);
        g.set_inputs(vec![x]);
        g.set_outputs(vec![y]);
        g.build().validate().unwrap()
    }

    #[test]
    fn test_liveness_frees_after_last_use() {
        let graph = chain();
        let plan = Liveness::new().plan(&graph, None).unwrap();
        assert_eq!(plan.strategy_name, "liveness");
        assert_eq!(plan.allocations_for(0), &[1]);
        assert_eq!(plan.allocations_for(1), &[2]);
        assert_eq!(plan.allocations_for(2), &[3]);
        assert!(plan.deallocations_for(0).is_empty());
        assert_eq!(plan.deallocations_for(1), &[1]);
        assert_eq!(plan.deallocations_for(2), &[2]);
        // x + two live intermediates + y at most.
        assert_eq!(plan.peak_bytes, 3 * 32);
    }

    #[test]
    fn test_liveness_skips_constants_and_inputs() {
        let mut g = GraphBuilder::new("fc");
        let x = g.add_tensor("x", Shape::matrix(1, 2), DataType::Float32);
        let w = g.add_const_f32("w", Shape::matrix(1, 2), &[1.0, 1.0]).unwrap();
        let y = g.add_tensor("y", Shape::matrix(1, 1), DataType::Float32);
        g.add_operator(Opcode::FullyConnected, vec![x, w], vec![y]);
        g.set_inputs(vec![x]);
        g.set_outputs(vec![y]);
        let graph = g.build().validate().unwrap();

        let plan = Liveness::new().plan(&graph, None).unwrap();
        assert_eq!(plan.allocations_for(0), &[y]);
        assert!(plan.deallocations_for(0).is_empty());
    }

    #[test]
    fn test_liveness_budget_too_small() {
        let graph = chain();
        let err = Liveness::new()
            .plan(&graph, Some(MemoryBudget::from_bytes(64)))
            .unwrap_err();
        assert!(matches!(err, PlannerError::BudgetTooSmall { .. }));
    }

    #[test]
    fn test_liveness_budget_fits() {
        let graph = chain();
        let plan = Liveness::new()
            .plan(&graph, Some(MemoryBudget::from_bytes(96)))
            .unwrap();
        assert_eq!(plan.budget_bytes, Some(96));
    }
}
