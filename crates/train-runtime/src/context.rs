// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Training configuration and progress counters.
//!
//! [`TrainingContext`] is the one mutable record the optimizer, the handler
//! and the checkpoint code share: hyper-parameters plus the `num_step` and
//! `num_epoch` counters that checkpoints persist.

use crate::TrainError;
use std::fmt;
use std::str::FromStr;

/// Declares a configuration enum that parses case-insensitively from its
/// upper-case name and serialises back to it.
macro_rules! config_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = TrainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(TrainError::Config(format!(
                        "unknown {} '{other}'; expected one of: {}",
                        stringify!($name),
                        [$($text),+].join(", "),
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = TrainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

config_enum! {
    /// Weight update rule.
    OptimizerKind {
        Sgd => "SGD",
        Adam => "ADAM",
    }
}

config_enum! {
    /// Loss whose gradient seeds the backward pass.
    LossKind {
        Mse => "MSE",
        CrossEntropy => "CROSS_ENTROPY",
        SparseCrossEntropy => "SPARSE_CROSS_ENTROPY",
    }
}

config_enum! {
    /// Scalar metric reported by evaluation.
    MetricKind {
        Mse => "MSE",
        Mae => "MAE",
        CrossEntropy => "CROSS_ENTROPY",
        Accuracy => "ACCURACY",
        SparseAccuracy => "SPARSE_ACCURACY",
    }
}

/// Hyper-parameters and progress of one training session.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainingContext {
    pub optimizer: OptimizerKind,
    pub loss: LossKind,
    pub metric: MetricKind,
    pub learning_rate: f32,
    /// Adam β₁.
    pub beta: f32,
    /// Adam β₂.
    pub beta_squares: f32,
    pub epsilon: f32,
    pub batch_size: u32,
    /// Trailing operators eligible for weight updates; 0 trains all of them.
    pub num_of_train_layers: u32,
    pub num_step: u32,
    pub num_epoch: u32,
}

impl Default for TrainingContext {
    fn default() -> Self {
        Self {
            optimizer: OptimizerKind::Sgd,
            loss: LossKind::Mse,
            metric: MetricKind::Mse,
            learning_rate: 0.001,
            beta: 0.9,
            beta_squares: 0.999,
            epsilon: 1.0e-7,
            batch_size: 1,
            num_of_train_layers: 0,
            num_step: 0,
            num_epoch: 0,
        }
    }
}

impl TrainingContext {
    /// Rejects hyper-parameters no optimizer can work with.
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.batch_size == 0 {
            return Err(TrainError::Config("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        for (name, value) in [("beta", self.beta), ("beta_squares", self.beta_squares)] {
            if !(0.0..1.0).contains(&value) {
                return Err(TrainError::Config(format!(
                    "{name} must be in [0, 1), got {value}"
                )));
            }
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(TrainError::Config(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Batch size as an f32 divisor.
    pub fn batch_divisor(&self) -> f32 {
        self.batch_size.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = TrainingContext::default();
        assert_eq!(ctx.optimizer, OptimizerKind::Sgd);
        assert_eq!(ctx.loss, LossKind::Mse);
        assert_eq!(ctx.metric, MetricKind::Mse);
        assert_eq!(ctx.batch_size, 1);
        assert_eq!(ctx.num_step, 0);
        ctx.validate().unwrap();
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!(
            "Sparse_Cross_Entropy".parse::<LossKind>().unwrap(),
            LossKind::SparseCrossEntropy
        );
        assert_eq!("MAE".parse::<MetricKind>().unwrap(), MetricKind::Mae);
        assert!(matches!(
            "rmsprop".parse::<OptimizerKind>(),
            Err(TrainError::Config(_))
        ));
    }

    #[test]
    fn test_display_upper_case() {
        assert_eq!(LossKind::CrossEntropy.to_string(), "CROSS_ENTROPY");
        assert_eq!(MetricKind::SparseAccuracy.to_string(), "SPARSE_ACCURACY");
    }

    #[test]
    fn test_serde_roundtrip() {
        let ctx = TrainingContext {
            optimizer: OptimizerKind::Adam,
            metric: MetricKind::Accuracy,
            num_step: 12,
            ..Default::default()
        };
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"ADAM\""));
        let back: TrainingContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_serde_lowercase_input() {
        let ctx: TrainingContext = serde_json::from_str(r#"{"optimizer":"adam"}"#).unwrap();
        assert_eq!(ctx.optimizer, OptimizerKind::Adam);
        assert_eq!(ctx.batch_size, 1);
    }

    #[test]
    fn test_validate_rejects() {
        let bad = [
            TrainingContext { batch_size: 0, ..Default::default() },
            TrainingContext { learning_rate: 0.0, ..Default::default() },
            TrainingContext { learning_rate: f32::NAN, ..Default::default() },
            TrainingContext { beta: 1.0, ..Default::default() },
            TrainingContext { beta_squares: -0.1, ..Default::default() },
            TrainingContext { epsilon: 0.0, ..Default::default() },
        ];
        for ctx in bad {
            assert!(matches!(ctx.validate(), Err(TrainError::Config(_))), "{ctx:?}");
        }
    }
}
