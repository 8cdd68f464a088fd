// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Output-gradient functions (`dL/dŷ`) for the supported losses.

use super::{check_same_len, PROBABILITY_EPSILON};
use crate::TensorError;

/// Mean squared error gradient: `2 (ŷ - y) / N`.
pub fn mse_gradient(predicted: &[f32], target: &[f32], grad: &mut [f32]) -> Result<(), TensorError> {
    check_same_len("mse_gradient", predicted.len(), target.len())?;
    check_same_len("mse_gradient", predicted.len(), grad.len())?;
    let n = predicted.len() as f32;
    for ((g, &p), &t) in grad.iter_mut().zip(predicted).zip(target) {
        *g = 2.0 * (p - t) / n;
    }
    Ok(())
}

/// Cross-entropy gradient against a probability target: `-y / (ŷ + ε)`.
pub fn cross_entropy_gradient(
    predicted: &[f32],
    target: &[f32],
    grad: &mut [f32],
) -> Result<(), TensorError> {
    check_same_len("cross_entropy_gradient", predicted.len(), target.len())?;
    check_same_len("cross_entropy_gradient", predicted.len(), grad.len())?;
    for ((g, &p), &t) in grad.iter_mut().zip(predicted).zip(target) {
        *g = -t / (p + PROBABILITY_EPSILON);
    }
    Ok(())
}

/// Cross-entropy gradient against a single class label.
///
/// Equivalent to [`cross_entropy_gradient`] with a one-hot target, so every
/// element except `label` receives a zero gradient.
pub fn sparse_cross_entropy_gradient(
    predicted: &[f32],
    label: usize,
    grad: &mut [f32],
) -> Result<(), TensorError> {
    check_same_len("sparse_cross_entropy_gradient", predicted.len(), grad.len())?;
    if label >= predicted.len() {
        return Err(TensorError::LabelOutOfRange {
            label,
            classes: predicted.len(),
        });
    }
    grad.fill(0.0);
    grad[label] = -1.0 / (predicted[label] + PROBABILITY_EPSILON);
    Ok(())
}
