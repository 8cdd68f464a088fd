// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Retained planning strategy.
//!
//! Allocates each tensor before the first step that touches it and never
//! frees anything within the forward pass, so every activation is still
//! bound when the backward pass reads it. The runtime releases them with
//! `reset_all` once the sample's backward pass is done.

use crate::plan::PlanBuilder;
use crate::strategy::{Lifetimes, PlanningStrategy};
use crate::{AllocationPlan, PlannerError};
use memory_manager::MemoryBudget;
use model_ir::GraphContext;

/// Keep every activation alive for the backward pass.
#[derive(Debug, Clone, Default)]
pub struct Retained;

impl Retained {
    pub fn new() -> Self {
        Self
    }
}

impl PlanningStrategy for Retained {
    fn name(&self) -> &str {
        "retained"
    }

    fn plan(
        &self,
        graph: &dyn GraphContext,
        budget: Option<MemoryBudget>,
    ) -> Result<AllocationPlan, PlannerError> {
        let lifetimes = Lifetimes::compute(graph)?;
        let mut builder = PlanBuilder::new(self.name(), graph.operator_count());
        for (index, first, _) in lifetimes.iter() {
            builder.allocate(first, index);
        }
        builder.build(graph, budget.map(|b| b.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::liveness::Liveness;
    use model_ir::{GraphBuilder, Opcode};
    use tensor_core::{DataType, Shape};

    #[test]
    fn test_retained_never_frees() {
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
        let graph = g.build().validate().unwrap();

        let plan = Retained::new().plan(&graph, None).unwrap();
        assert_eq!(plan.total_allocations(), 3);
        for step in 0..plan.num_steps() {
            assert!(plan.deallocations_for(step).is_empty());
        }
        assert_eq!(plan.peak_bytes, 4 * 32);

        let lean = Liveness::new().plan(&graph, None).unwrap();
        assert!(lean.peak_bytes < plan.peak_bytes);
    }

    #[test]
    fn test_retained_budget() {
        let mut g = GraphBuilder::new("pair");
        let x = g.add_tensor("x", Shape::vector(4), DataType::Float32);
        let a = g.add_tensor("a", Shape::vector(4), DataType::Float32);
        let y = g.add_tensor("y", Shape::vector(4), DataType::Float32);
        g.add_operator(Opcode::Relu, vec![x], vec![a]);
        g.add_operator(Opcode::Tanh, vec![a], vec![y]);
        g.set_inputs(vec![x]);
        g.set_outputs(vec![y]);
        let graph = g.build().validate().unwrap();

        assert!(Retained::new()
            .plan(&graph, Some(MemoryBudget::from_bytes(47)))
            .is_err());
        let plan = Retained::new()
            .plan(&graph, Some(MemoryBudget::from_bytes(48)))
            .unwrap();
        assert_eq!(plan.peak_bytes, 48);
    }
}
