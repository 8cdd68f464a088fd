// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! optimizer = "ADAM"
//! loss = "CROSS_ENTROPY"
//! metric = "ACCURACY"
//! learning_rate = 0.01
//! batch_size = 8
//! num_of_train_layers = 2
//! memory_budget = "256K"
//! track_memory = true
//! strategy = "auto"
//! ```

use crate::{TrainError, TrainingContext};
use alloc_planner::{Liveness, PlanningStrategy, Retained};
use memory_manager::{MemoryBudget, MemoryManager};
use std::path::Path;

/// Configuration for a training session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Hyper-parameters and initial counters.
    #[serde(flatten)]
    pub training: TrainingContext,
    /// Hard ceiling on live tensor bytes (human-readable, e.g. `"256K"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_budget: Option<String>,
    /// Enables byte accounting even without a budget.
    pub track_memory: bool,
    /// Planning strategy for training passes: `"auto"`, `"liveness"` or `"retained"`.
    pub strategy: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            training: TrainingContext::default(),
            memory_budget: None,
            track_memory: false,
            strategy: "auto".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, TrainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, TrainError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| TrainError::Config(format!("TOML parse error: {e}")))?;
        config.training.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, TrainError> {
        toml::to_string_pretty(self)
            .map_err(|e| TrainError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the memory budget string, if one is set.
    pub fn parse_budget(&self) -> Result<Option<MemoryBudget>, TrainError> {
        self.memory_budget
            .as_deref()
            .map(MemoryBudget::parse)
            .transpose()
            .map_err(|e| TrainError::Config(format!("invalid budget: {e}")))
    }

    /// Builds the memory manager this configuration asks for.
    pub fn memory_manager(&self) -> Result<MemoryManager, TrainError> {
        Ok(match self.parse_budget()? {
            Some(budget) => MemoryManager::with_budget(budget),
            None if self.track_memory => MemoryManager::with_accounting(),
            None => MemoryManager::new(),
        })
    }

    /// Creates the training-pass strategy; `None` means choose automatically.
    pub fn create_strategy(&self) -> Result<Option<Box<dyn PlanningStrategy>>, TrainError> {
        match self.strategy.to_lowercase().as_str() {
            "auto" => Ok(None),
            "liveness" => Ok(Some(Box::new(Liveness::new()))),
            "retained" => Ok(Some(Box::new(Retained::new()))),
            other => Err(TrainError::Config(format!(
                "unknown strategy '{other}'; expected 'auto', 'liveness', or 'retained'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LossKind, MetricKind, OptimizerKind};

    #[test]
    fn test_default() {
        let c = RuntimeConfig::default();
        assert_eq!(c.strategy, "auto");
        assert!(c.memory_budget.is_none());
        assert!(!c.track_memory);
        assert_eq!(c.training, TrainingContext::default());
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
optimizer = "adam"
loss = "SPARSE_CROSS_ENTROPY"
metric = "SPARSE_ACCURACY"
learning_rate = 0.01
batch_size = 4
num_of_train_layers = 2
memory_budget = "64K"
strategy = "retained"
"#;
        let c = RuntimeConfig::from_toml(toml).unwrap();
        assert_eq!(c.training.optimizer, OptimizerKind::Adam);
        assert_eq!(c.training.loss, LossKind::SparseCrossEntropy);
        assert_eq!(c.training.metric, MetricKind::SparseAccuracy);
        assert_eq!(c.training.batch_size, 4);
        assert_eq!(c.training.num_of_train_layers, 2);
        assert!((c.training.learning_rate - 0.01).abs() < 1e-9);
        // Unset fields keep their defaults.
        assert!((c.training.beta - 0.9).abs() < 1e-9);
        assert_eq!(c.parse_budget().unwrap().unwrap().as_bytes(), 64 * 1024);
        assert_eq!(c.create_strategy().unwrap().unwrap().name(), "retained");
    }

    #[test]
    fn test_from_toml_rejects_bad_values() {
        assert!(RuntimeConfig::from_toml("optimizer = \"rmsprop\"").is_err());
        assert!(RuntimeConfig::from_toml("batch_size = 0").is_err());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = RuntimeConfig {
            memory_budget: Some("1M".into()),
            track_memory: true,
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        assert!(toml.contains("SGD"));
        let back = RuntimeConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_memory_manager_modes() {
        let plain = RuntimeConfig::default().memory_manager().unwrap();
        assert!(!plain.is_accounting());

        let tracked = RuntimeConfig {
            track_memory: true,
            ..Default::default()
        };
        assert!(tracked.memory_manager().unwrap().is_accounting());

        let budgeted = RuntimeConfig {
            memory_budget: Some("2K".into()),
            ..Default::default()
        };
        let m = budgeted.memory_manager().unwrap();
        assert_eq!(m.budget().unwrap().as_bytes(), 2048);
    }

    #[test]
    fn test_invalid_budget() {
        let c = RuntimeConfig {
            memory_budget: Some("lots".into()),
            ..Default::default()
        };
        assert!(matches!(c.parse_budget(), Err(TrainError::Config(_))));
    }

    #[test]
    fn test_create_strategy() {
        assert!(RuntimeConfig::default().create_strategy().unwrap().is_none());
        let c = RuntimeConfig {
            strategy: "Liveness".into(),
            ..Default::default()
        };
        assert_eq!(c.create_strategy().unwrap().unwrap().name(), "liveness");
        let bad = RuntimeConfig {
            strategy: "bogus".into(),
            ..Default::default()
        };
        assert!(bad.create_strategy().is_err());
    }
}
