// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Training profiling metrics.
//!
//! [`TrainingMetrics`] keeps running aggregates of step timing and memory so
//! memory budgets and planning strategies can be compared on-device. Its
//! size is fixed no matter how many steps run; only the latest step is kept
//! whole.

use std::time::Duration;

/// Metrics for a single optimizer step.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StepMetrics {
    /// `num_step` after the update.
    pub step: u32,
    /// Samples accumulated into this step.
    pub samples: usize,
    /// Wall-clock time of forward, backward and update.
    pub duration: Duration,
    /// Peak live bytes reported by the memory manager after the step.
    pub peak_memory_bytes: usize,
}

/// Aggregate metrics since creation or the last [`reset`](Self::reset).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TrainingMetrics {
    pub steps: usize,
    pub total_duration: Duration,
    pub min_step_duration: Option<Duration>,
    pub max_step_duration: Option<Duration>,
    pub total_samples: usize,
    pub peak_memory_bytes: usize,
    /// Steps that failed and were rolled back.
    pub failed_steps: usize,
    pub last_step: Option<StepMetrics>,
}

impl TrainingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed step.
    pub fn record_step(&mut self, step: u32, samples: usize, duration: Duration, peak_memory_bytes: usize) {
        self.steps = self.steps.saturating_add(1);
        self.total_duration = self.total_duration.saturating_add(duration);
        self.min_step_duration = Some(self.min_step_duration.map_or(duration, |d| d.min(duration)));
        self.max_step_duration = Some(self.max_step_duration.map_or(duration, |d| d.max(duration)));
        self.total_samples = self.total_samples.saturating_add(samples);
        self.peak_memory_bytes = self.peak_memory_bytes.max(peak_memory_bytes);
        self.last_step = Some(StepMetrics {
            step,
            samples,
            duration,
            peak_memory_bytes,
        });
    }

    pub fn record_failure(&mut self) {
        self.failed_steps = self.failed_steps.saturating_add(1);
    }

    /// Clears every aggregate, e.g. at an epoch boundary.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn num_steps(&self) -> usize {
        self.steps
    }

    /// Mean wall-clock time per recorded step.
    pub fn mean_step_duration(&self) -> Duration {
        match u32::try_from(self.steps) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.total_duration / n,
        }
    }

    /// Returns samples per second throughput.
    pub fn samples_per_second(&self) -> f64 {
        let secs = self.total_duration.as_secs_f64();
        if secs <= 0.0 || self.total_samples == 0 {
            return 0.0;
        }
        self.total_samples as f64 / secs
    }

    /// Returns a human-readable summary suitable for logging.
    pub fn summary(&self) -> String {
        let peak_kb = self.peak_memory_bytes as f64 / 1024.0;
        let ms = |d: Option<Duration>| d.unwrap_or_default().as_secs_f64() * 1000.0;
        format!(
            "Training: {} steps ({} failed), {} samples, {:.2}ms total, \
             {:.2}ms/step (min {:.2}, max {:.2}), peak {:.1} KB, {:.1} samples/s",
            self.steps,
            self.failed_steps,
            self.total_samples,
            self.total_duration.as_secs_f64() * 1000.0,
            self.mean_step_duration().as_secs_f64() * 1000.0,
            ms(self.min_step_duration),
            ms(self.max_step_duration),
            peak_kb,
            self.samples_per_second(),
        )
    }
}
