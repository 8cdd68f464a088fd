// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation plan: the output of a planning strategy.
//!
//! A plan holds, for every execution step (one per operator), the tensors to
//! allocate before the step runs and the tensors to free after it. It is the
//! contract between the planner and the runtime allocator and is read-only
//! once built.

use crate::PlannerError;
use model_ir::{GraphContext, TensorIndex};

/// Per-step allocate and free lists.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AllocationPlan {
    /// Strategy name that produced this plan.
    pub strategy_name: String,
    alloc: Vec<Vec<TensorIndex>>,
    dealloc: Vec<Vec<TensorIndex>>,
    /// Estimated peak bytes of planned tensors plus graph inputs.
    pub peak_bytes: usize,
    /// Budget the plan was checked against, if any.
    pub budget_bytes: Option<usize>,
}

impl AllocationPlan {
    /// Wraps externally computed lists. Call [`validate`](Self::validate)
    /// before handing the plan to a runtime.
    pub fn new(
        strategy_name: impl Into<String>,
        alloc: Vec<Vec<TensorIndex>>,
        dealloc: Vec<Vec<TensorIndex>>,
    ) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            alloc,
            dealloc,
            peak_bytes: 0,
            budget_bytes: None,
        }
    }

    pub fn num_steps(&self) -> usize {
        self.alloc.len()
    }

    /// Tensors to allocate before `step`; empty for unknown steps.
    pub fn allocations_for(&self, step: usize) -> &[TensorIndex] {
        self.alloc.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tensors to free after `step`; empty for unknown steps.
    pub fn deallocations_for(&self, step: usize) -> &[TensorIndex] {
        self.dealloc.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct tensors the plan ever allocates.
    pub fn total_allocations(&self) -> usize {
        self.alloc.iter().map(Vec::len).sum()
    }

    /// Simulates the plan and returns its peak live bytes.
    ///
    /// Graph inputs count as live from the start. Uses static shapes; dynamic
    /// overrides applied at runtime are not known here.
    pub fn estimate_peak(&self, graph: &dyn GraphContext) -> Result<usize, PlannerError> {
        let size_of = |index: TensorIndex| {
            graph
                .tensor(index)
                .and_then(|info| info.size_bytes())
                .ok_or(PlannerError::SizeOverflow { index })
        };
        let overflow = |index| PlannerError::SizeOverflow { index };

        let mut live = 0usize;
        for &index in graph.input_indices() {
            live = live.checked_add(size_of(index)?).ok_or_else(|| overflow(index))?;
        }
        let mut peak = live;
        for step in 0..self.num_steps() {
            for &index in self.allocations_for(step) {
                live = live.checked_add(size_of(index)?).ok_or_else(|| overflow(index))?;
            }
            peak = peak.max(live);
            for &index in self.deallocations_for(step) {
                live = live.saturating_sub(size_of(index)?);
            }
        }
        Ok(peak)
    }

    /// Checks the plan against `graph`.
    ///
    /// # Checks
    /// - One step per operator; allocate and free lists have equal length.
    /// - Every index is in range and refers to a non-constant tensor.
    /// - Graph inputs are never planned for allocation.
    /// - No tensor is allocated while live, nor freed while not live.
    pub fn validate(&self, graph: &dyn GraphContext) -> Result<(), PlannerError> {
        let invalid = |detail: String| PlannerError::InvalidPlan {
            strategy: self.strategy_name.clone(),
            detail,
        };

        if self.alloc.len() != self.dealloc.len() {
            return Err(invalid(format!(
                "{} allocate lists but {} free lists",
                self.alloc.len(),
                self.dealloc.len()
            )));
        }
        if self.alloc.len() != graph.operator_count() {
            return Err(invalid(format!(
                "{} steps for {} operators",
                self.alloc.len(),
                graph.operator_count()
            )));
        }

        let count = graph.tensor_count();
        let mut live = vec![false; count];
        for &index in graph.input_indices() {
            if let Some(slot) = live.get_mut(index) {
                *slot = true;
            }
        }

        for step in 0..self.num_steps() {
            for &index in self.allocations_for(step).iter().chain(self.deallocations_for(step)) {
                match graph.tensor(index) {
                    None => {
                        return Err(invalid(format!(
                            "step {step}: tensor {index} out of range ({count} tensors)"
                        )))
                    }
                    Some(info) if info.is_const => {
                        return Err(invalid(format!("step {step}: tensor {index} is constant")))
                    }
                    Some(_) => {}
                }
            }
            for &index in self.allocations_for(step) {
                if graph.input_indices().contains(&index) {
                    return Err(invalid(format!("step {step}: tensor {index} is a graph input")));
                }
                if live[index] {
                    return Err(invalid(format!(
                        "step {step}: tensor {index} allocated while live"
                    )));
                }
                live[index] = true;
            }
            for &index in self.deallocations_for(step) {
                if !live[index] {
                    return Err(invalid(format!(
                        "step {step}: tensor {index} freed while not live"
                    )));
                }
                live[index] = false;
            }
        }

        if let Some(budget) = self.budget_bytes {
            if self.peak_bytes > budget {
                return Err(PlannerError::BudgetTooSmall {
                    required_bytes: self.peak_bytes,
                    budget_bytes: budget,
                });
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> String {
        let budget = match self.budget_bytes {
            Some(b) => format!("{:.1} KB", b as f64 / 1024.0),
            None => "unbounded".to_string(),
        };
        format!(
            "Plan '{}': {} steps, {} allocations, peak {:.1} KB, budget {}",
            self.strategy_name,
            self.num_steps(),
            self.total_allocations(),
            self.peak_bytes as f64 / 1024.0,
            budget,
        )
    }
}

/// Builder helper for constructing an `AllocationPlan` step by step.
///
/// Used internally by strategy implementations.
pub(crate) struct PlanBuilder {
    strategy_name: String,
    alloc: Vec<Vec<TensorIndex>>,
    dealloc: Vec<Vec<TensorIndex>>,
}

impl PlanBuilder {
    pub fn new(strategy_name: &str, num_steps: usize) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            alloc: vec![Vec::new(); num_steps],
            dealloc: vec![Vec::new(); num_steps],
        }
    }

    pub fn allocate(&mut self, step: usize, index: TensorIndex) {
        self.alloc[step].push(index);
    }

    pub fn free(&mut self, step: usize, index: TensorIndex) {
        self.dealloc[step].push(index);
    }

    /// Finishes the plan: estimates its peak, checks it against `budget_bytes`
    /// and validates it against `graph`.
    pub fn build(
        self,
        graph: &dyn GraphContext,
        budget_bytes: Option<usize>,
    ) -> Result<AllocationPlan, PlannerError> {
        let mut plan = AllocationPlan::new(self.strategy_name, self.alloc, self.dealloc);
        plan.peak_bytes = plan.estimate_peak(graph)?;
        plan.budget_bytes = budget_bytes;
        plan.validate(graph)?;
        Ok(plan)
    }
}
