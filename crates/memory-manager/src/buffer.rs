// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII tensor buffer that reports its release to the ledger.
//!
//! A [`TensorBuffer`] exclusively owns its bytes. Moving it (into tensor
//! storage, into an optimizer accumulator) transfers ownership without a
//! copy; dropping it is the only way to free it, so a buffer cannot be
//! freed twice or leaked from the accounting.

use crate::manager::Ledger;
use std::sync::Arc;
use tensor_core::{AlignedBytes, TensorError};

/// An owned, zero-initialised tensor buffer from a [`MemoryManager`](crate::MemoryManager).
pub struct TensorBuffer {
    data: AlignedBytes,
    ledger: Option<Arc<Ledger>>,
}

impl TensorBuffer {
    pub(crate) fn new(size_bytes: usize, ledger: Option<Arc<Ledger>>) -> Self {
        Self {
            data: AlignedBytes::zeroed(size_bytes),
            ledger,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_bytes()
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_bytes_mut()
    }

    /// Interprets the buffer as `f32` elements.
    pub fn as_f32(&self) -> Result<&[f32], TensorError> {
        self.data.as_f32()
    }

    pub fn as_f32_mut(&mut self) -> Result<&mut [f32], TensorError> {
        self.data.as_f32_mut()
    }

    /// Copies `bytes` into the buffer; lengths must match.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) -> Result<(), TensorError> {
        if bytes.len() != self.size_bytes() {
            return Err(TensorError::BufferSizeMismatch {
                expected: self.size_bytes(),
                actual: bytes.len(),
            });
        }
        self.data.as_bytes_mut().copy_from_slice(bytes);
        Ok(())
    }

    pub fn fill_zero(&mut self) {
        self.data.fill_zero();
    }
}

impl Drop for TensorBuffer {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.take() {
            ledger.release(self.data.len());
        }
    }
}

impl std::fmt::Debug for TensorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorBuffer")
            .field("size_bytes", &self.size_bytes())
            .field("accounted", &self.ledger.is_some())
            .finish()
    }
}
