// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor and operator metadata exposed by a graph context.

use crate::TensorIndex;
use tensor_core::{DataType, Shape};

/// The kind of computation an operator performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    FullyConnected,
    Conv2D,
    /// Gated recurrent unit.
    Gru,
    MaxPool2D,
    AveragePool2D,
    Relu,
    Relu6,
    Tanh,
    Logistic,
    Softmax,
    Reshape,
    Add,
    Mul,
}

impl Opcode {
    /// Returns `true` for kinds whose constant inputs are trainable weights.
    pub fn has_trainable_weights(self) -> bool {
        matches!(self, Opcode::FullyConnected | Opcode::Conv2D | Opcode::Gru)
    }

    /// Parses an opcode from a loose name (`"fc"`, `"conv2d"`, `"gru"`, ...).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fully_connected" | "fullyconnected" | "fc" | "dense" => Some(Self::FullyConnected),
            "conv2d" | "conv_2d" | "conv" => Some(Self::Conv2D),
            "gru" => Some(Self::Gru),
            "max_pool2d" | "maxpool2d" | "max_pool_2d" => Some(Self::MaxPool2D),
            "average_pool2d" | "avgpool2d" | "average_pool_2d" => Some(Self::AveragePool2D),
            "relu" => Some(Self::Relu),
            "relu6" => Some(Self::Relu6),
            "tanh" => Some(Self::Tanh),
            "logistic" | "sigmoid" => Some(Self::Logistic),
            "softmax" => Some(Self::Softmax),
            "reshape" => Some(Self::Reshape),
            "add" => Some(Self::Add),
            "mul" => Some(Self::Mul),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullyConnected => "fully_connected",
            Self::Conv2D => "conv2d",
            Self::Gru => "gru",
            Self::MaxPool2D => "max_pool2d",
            Self::AveragePool2D => "average_pool2d",
            Self::Relu => "relu",
            Self::Relu6 => "relu6",
            Self::Tanh => "tanh",
            Self::Logistic => "logistic",
            Self::Softmax => "softmax",
            Self::Reshape => "reshape",
            Self::Add => "add",
            Self::Mul => "mul",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata of one tensor slot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorInfo {
    pub name: String,
    pub shape: Shape,
    pub dtype: DataType,
    /// Constant tensors carry their data in the graph and are never planned.
    pub is_const: bool,
}

impl TensorInfo {
    /// Static byte size, or `None` on overflow.
    pub fn size_bytes(&self) -> Option<usize> {
        self.shape.checked_size_bytes(self.dtype)
    }
}

/// One operator: its kind and the tensors it reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OperatorDef {
    pub opcode: Opcode,
    pub inputs: Vec<TensorIndex>,
    pub outputs: Vec<TensorIndex>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainable_kinds() {
        assert!(Opcode::FullyConnected.has_trainable_weights());
        assert!(Opcode::Conv2D.has_trainable_weights());
        assert!(Opcode::Gru.has_trainable_weights());
        assert!(!Opcode::Softmax.has_trainable_weights());
        assert!(!Opcode::Add.has_trainable_weights());
    }

    #[test]
    fn test_from_str_loose() {
        assert_eq!(Opcode::from_str_loose("FC"), Some(Opcode::FullyConnected));
        assert_eq!(Opcode::from_str_loose("conv"), Some(Opcode::Conv2D));
        assert_eq!(Opcode::from_str_loose("sigmoid"), Some(Opcode::Logistic));
        assert_eq!(Opcode::from_str_loose("unknown"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Opcode::Gru.to_string(), "gru");
        assert_eq!(Opcode::MaxPool2D.to_string(), "max_pool2d");
    }

    #[test]
    fn test_tensor_info_size() {
        let info = TensorInfo {
            name: "w".into(),
            shape: Shape::matrix(2, 3),
            dtype: DataType::Float32,
            is_const: true,
        };
        assert_eq!(info.size_bytes(), Some(24));
    }

    #[test]
    fn test_serde_roundtrip() {
        let op = OperatorDef {
            opcode: Opcode::FullyConnected,
            inputs: vec![0, 1, 2],
            outputs: vec![3],
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("fully_connected"));
        let back: OperatorDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }
}
