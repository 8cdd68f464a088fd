// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The graph view consumed by the on-device training core.
//!
//! - [`TensorInfo`] and [`OperatorDef`]: tensor slots and operators in execution order.
//! - [`GraphContext`]: read access to metadata, mutable access to constant weights.
//! - [`ModelGraph`]: an in-memory graph with a **type-state pattern**
//!   (`Loaded` → `Validated`); only validated graphs implement [`GraphContext`].
//! - [`GraphBuilder`]: incremental construction.
//!
//! # Example
//! ```
//! use model_ir::{GraphBuilder, GraphContext, Opcode};
//! use tensor_core::{DataType, Shape};
//!
//! let mut b = GraphBuilder::new("tiny");
//! let x = b.add_tensor("x", Shape::matrix(1, 2), DataType::Float32);
//! let w = b.add_const_f32("w", Shape::matrix(1, 2), &[0.1, 0.2]).unwrap();
//! let y = b.add_tensor("y", Shape::matrix(1, 1), DataType::Float32);
//! b.add_operator(Opcode::FullyConnected, vec![x, w], vec![y]);
//! b.set_inputs(vec![x]);
//! b.set_outputs(vec![y]);
//! let graph = b.build().validate().unwrap();
//! assert_eq!(graph.operator_count(), 1);
//! ```

mod builder;
mod context;
mod error;
pub mod graph;
mod operator;

pub use builder::GraphBuilder;
pub use context::{GraphContext, TensorIndex};
pub use error::ModelError;
pub use graph::ModelGraph;
pub use operator::{Opcode, OperatorDef, TensorInfo};
