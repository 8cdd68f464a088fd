// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Element types, shapes and buffers shared by every crate of the training
//! runtime.
//!
//! This crate provides:
//! - [`DataType`]: the scalar element tags a graph tensor may carry, with
//!   byte widths.
//! - [`Shape`]: runtime dimensionality with overflow-checked size math.
//! - [`AlignedBytes`]: word-aligned byte storage with safe `f32` views.
//! - [`Tensor`]: an owned tensor, used for constant (weight) data.
//! - [`ops`]: loss gradients and metrics over flat `f32` samples.
//!
//! # Design Goals
//! - No `unsafe`: typed views go through `bytemuck` casts over aligned words.
//! - Size computations that feed allocations are checked, never wrapping.

mod buffer;
mod dtype;
mod error;
pub mod ops;
mod shape;
mod tensor;

pub use buffer::AlignedBytes;
pub use dtype::DataType;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::Tensor;
