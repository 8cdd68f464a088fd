// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pure reductions consumed by the training handler.
//!
//! - [`loss`] computes output gradients from predictions and targets.
//! - [`metric`] reduces a prediction/target pair to a scalar score.
//!
//! All functions operate on flat `f32` slices of one sample.

pub mod loss;
pub mod metric;

use crate::{Shape, TensorError};

/// Epsilon guarding divisions and logarithms against zero predictions.
pub const PROBABILITY_EPSILON: f32 = 1.0e-7;

pub(crate) fn check_same_len(op: &'static str, lhs: usize, rhs: usize) -> Result<(), TensorError> {
    if lhs != rhs {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: Shape::vector(lhs),
            rhs: Shape::vector(rhs),
        });
    }
    Ok(())
}

pub(crate) fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
