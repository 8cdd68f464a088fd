// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scalar metrics over one sample.

use super::{argmax, check_same_len, PROBABILITY_EPSILON};
use crate::TensorError;

/// Mean squared error.
pub fn mse(predicted: &[f32], target: &[f32]) -> Result<f32, TensorError> {
    check_same_len("mse", predicted.len(), target.len())?;
    if predicted.is_empty() {
        return Ok(0.0);
    }
    let sum: f32 = predicted
        .iter()
        .zip(target)
        .map(|(&p, &t)| (p - t) * (p - t))
        .sum();
    Ok(sum / predicted.len() as f32)
}

/// Mean absolute error.
pub fn mae(predicted: &[f32], target: &[f32]) -> Result<f32, TensorError> {
    check_same_len("mae", predicted.len(), target.len())?;
    if predicted.is_empty() {
        return Ok(0.0);
    }
    let sum: f32 = predicted.iter().zip(target).map(|(&p, &t)| (p - t).abs()).sum();
    Ok(sum / predicted.len() as f32)
}

/// Categorical cross-entropy `-Σ y·ln(ŷ + ε)`.
pub fn cross_entropy(predicted: &[f32], target: &[f32]) -> Result<f32, TensorError> {
    check_same_len("cross_entropy", predicted.len(), target.len())?;
    Ok(-predicted
        .iter()
        .zip(target)
        .map(|(&p, &t)| t * (p + PROBABILITY_EPSILON).ln())
        .sum::<f32>())
}

/// `1.0` when the arg-max of prediction and target agree, else `0.0`.
pub fn accuracy(predicted: &[f32], target: &[f32]) -> Result<f32, TensorError> {
    check_same_len("accuracy", predicted.len(), target.len())?;
    Ok(match (argmax(predicted), argmax(target)) {
        (Some(p), Some(t)) if p == t => 1.0,
        _ => 0.0,
    })
}

/// `1.0` when the arg-max of the prediction equals `label`, else `0.0`.
pub fn sparse_accuracy(predicted: &[f32], label: usize) -> Result<f32, TensorError> {
    if label >= predicted.len() {
        return Err(TensorError::LabelOutOfRange {
            label,
            classes: predicted.len(),
        });
    }
    Ok(if argmax(predicted) == Some(label) { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_and_mae() {
        let p = [1.0f32, 2.0, 4.0];
        let t = [1.0f32, 0.0, 1.0];
        assert!((mse(&p, &t).unwrap() - 13.0 / 3.0).abs() < 1e-6);
        assert!((mae(&p, &t).unwrap() - 5.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_cross_entropy() {
        let v = cross_entropy(&[0.5, 0.5], &[1.0, 0.0]).unwrap();
        assert!((v - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0.1, 0.9], &[0.0, 1.0]).unwrap(), 1.0);
        assert_eq!(accuracy(&[0.9, 0.1], &[0.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_sparse_accuracy() {
        assert_eq!(sparse_accuracy(&[0.1, 0.2, 0.7], 2).unwrap(), 1.0);
        assert_eq!(sparse_accuracy(&[0.1, 0.2, 0.7], 0).unwrap(), 0.0);
        assert!(sparse_accuracy(&[0.1], 3).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(mse(&[1.0], &[1.0, 2.0]).is_err());
    }
}
