// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Byte accounting for tensor buffers.
//!
//! [`MemoryStats`] only exists when accounting was requested on the
//! [`MemoryManager`](crate::MemoryManager); there is no global counter.

/// Current and peak live bytes, plus event counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MemoryStats {
    /// Bytes held by live buffers right now.
    pub current_allocated_bytes: usize,
    /// Highest value `current_allocated_bytes` ever reached.
    pub peak_allocated_bytes: usize,
    /// Successful allocations.
    pub total_allocations: u64,
    /// Buffers returned (explicitly or by drop).
    pub total_deallocations: u64,
    /// Allocation requests rejected by the budget.
    pub oom_count: u64,
    /// Sum of all bytes ever handed out.
    pub cumulative_allocated_bytes: u64,
}

impl MemoryStats {
    pub(crate) fn record_allocation(&mut self, size: usize) {
        self.total_allocations += 1;
        self.cumulative_allocated_bytes += size as u64;
        self.current_allocated_bytes += size;
        self.update_peak();
    }

    /// Peak is refreshed before the subtraction so a transient maximum is
    /// never masked.
    pub(crate) fn record_deallocation(&mut self, size: usize) {
        self.total_deallocations += 1;
        self.update_peak();
        self.current_allocated_bytes = self.current_allocated_bytes.saturating_sub(size);
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    fn update_peak(&mut self) {
        if self.current_allocated_bytes > self.peak_allocated_bytes {
            self.peak_allocated_bytes = self.current_allocated_bytes;
        }
    }

    /// Number of buffers currently live.
    pub fn live_buffers(&self) -> u64 {
        self.total_allocations.saturating_sub(self.total_deallocations)
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Memory: {} B live in {} buffers, peak {} B, {} allocations, {} deallocations, {} OOMs",
            self.current_allocated_bytes,
            self.live_buffers(),
            self.peak_allocated_bytes,
            self.total_allocations,
            self.total_deallocations,
            self.oom_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let s = MemoryStats::default();
        assert_eq!(s.current_allocated_bytes, 0);
        assert_eq!(s.live_buffers(), 0);
    }

    #[test]
    fn test_peak_tracks_maximum() {
        let mut s = MemoryStats::default();
        s.record_allocation(100);
        s.record_allocation(50);
        s.record_deallocation(100);
        s.record_allocation(20);
        assert_eq!(s.current_allocated_bytes, 70);
        assert_eq!(s.peak_allocated_bytes, 150);
    }

    #[test]
    fn test_counters() {
        let mut s = MemoryStats::default();
        s.record_allocation(10);
        s.record_allocation(30);
        s.record_deallocation(10);
        s.record_oom();
        assert_eq!(s.total_allocations, 2);
        assert_eq!(s.total_deallocations, 1);
        assert_eq!(s.cumulative_allocated_bytes, 40);
        assert_eq!(s.oom_count, 1);
        assert_eq!(s.live_buffers(), 1);
    }

    #[test]
    fn test_summary() {
        let mut s = MemoryStats::default();
        s.record_allocation(64);
        let text = s.summary();
        assert!(text.contains("64 B live in 1 buffers"));
        assert!(text.contains("1 allocations"));
    }
}
