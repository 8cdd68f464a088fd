// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Heap allocator for tensor buffers with optional byte accounting.
//!
//! [`MemoryManager`] hands out zero-filled [`TensorBuffer`]s. Without
//! accounting it is a thin wrapper over the global allocator. With
//! accounting, every allocation and release is recorded in a shared
//! [`MemoryStats`], and an optional [`MemoryBudget`] turns the running total
//! into a hard ceiling.
//!
//! The manager is a cheap handle: clones share the same ledger, so the
//! optimizer and the allocation executor can both draw from one budget.

use crate::{MemoryBudget, MemoryError, MemoryStats, TensorBuffer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Accounting state shared between the manager and its live buffers.
pub(crate) struct Ledger {
    budget: Option<MemoryBudget>,
    stats: Mutex<MemoryStats>,
}

impl Ledger {
    /// Locks the counters, recovering them from a poisoned lock.
    fn lock_stats(&self) -> MutexGuard<'_, MemoryStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by `TensorBuffer::drop`.
    pub(crate) fn release(&self, size_bytes: usize) {
        self.lock_stats().record_deallocation(size_bytes);
    }
}

/// The allocator every tensor, gradient and moment buffer comes from.
///
/// # Example
/// ```
/// use memory_manager::MemoryManager;
///
/// let memory = MemoryManager::with_accounting();
/// let a = memory.allocate(1024).unwrap();
/// let b = memory.allocate(512).unwrap();
/// memory.deallocate(Some(a));
/// drop(b);
///
/// let stats = memory.stats().unwrap();
/// assert_eq!(stats.current_allocated_bytes, 0);
/// assert_eq!(stats.peak_allocated_bytes, 1536);
/// ```
#[derive(Clone, Default)]
pub struct MemoryManager {
    ledger: Option<Arc<Ledger>>,
}

impl MemoryManager {
    /// Creates a manager without byte accounting.
    pub fn new() -> Self {
        Self { ledger: None }
    }

    /// Creates a manager that tracks current and peak bytes.
    pub fn with_accounting() -> Self {
        Self::with_ledger(None)
    }

    /// Creates an accounting manager that rejects allocations beyond `budget`.
    pub fn with_budget(budget: MemoryBudget) -> Self {
        Self::with_ledger(Some(budget))
    }

    fn with_ledger(budget: Option<MemoryBudget>) -> Self {
        Self {
            ledger: Some(Arc::new(Ledger {
                budget,
                stats: Mutex::new(MemoryStats::default()),
            })),
        }
    }

    /// Allocates a zero-filled buffer of `size_bytes`.
    pub fn allocate(&self, size_bytes: usize) -> Result<TensorBuffer, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }

        if let Some(ledger) = &self.ledger {
            let mut stats = ledger.lock_stats();
            if let Some(budget) = ledger.budget {
                let limit = budget.as_bytes();
                let current = stats.current_allocated_bytes;
                if current.saturating_add(size_bytes) > limit {
                    stats.record_oom();
                    return Err(MemoryError::OutOfMemory {
                        requested_bytes: size_bytes,
                        available_bytes: limit.saturating_sub(current),
                        budget_bytes: limit,
                    });
                }
            }
            stats.record_allocation(size_bytes);
        }

        Ok(TensorBuffer::new(size_bytes, self.ledger.clone()))
    }

    /// Returns a buffer to the manager. `None` is a no-op.
    ///
    /// Dropping a buffer has the same effect; this form exists so call sites
    /// that release an optional tensor read as an explicit free.
    pub fn deallocate(&self, buffer: Option<TensorBuffer>) {
        if let Some(buffer) = buffer {
            tracing::trace!("releasing {} byte buffer", buffer.size_bytes());
            drop(buffer);
        }
    }

    /// Returns `true` if byte accounting is enabled.
    pub fn is_accounting(&self) -> bool {
        self.ledger.is_some()
    }

    /// Returns the budget ceiling, if any.
    pub fn budget(&self) -> Option<MemoryBudget> {
        self.ledger.as_ref().and_then(|l| l.budget)
    }

    /// Snapshot of the accounting counters, or `None` without accounting.
    pub fn stats(&self) -> Option<MemoryStats> {
        let ledger = self.ledger.as_ref()?;
        Some(ledger.lock_stats().clone())
    }

    /// Bytes currently held by live buffers (0 without accounting).
    pub fn current_allocated(&self) -> usize {
        self.stats().map_or(0, |s| s.current_allocated_bytes)
    }

    /// Peak live bytes so far (0 without accounting).
    pub fn peak_allocated(&self) -> usize {
        self.stats().map_or(0, |s| s.peak_allocated_bytes)
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("accounting", &self.is_accounting())
            .field("budget", &self.budget())
            .field("current_allocated", &self.current_allocated())
            .finish()
    }
}
