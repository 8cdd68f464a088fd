// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Word-aligned byte storage with typed views.
//!
//! Tensor data is handed around as bytes (checkpoints copy it verbatim) but
//! the optimizers and reductions read it as `f32`. A plain `Vec<u8>` gives no
//! alignment guarantee, so [`AlignedBytes`] keeps its storage in `u64` words
//! and exposes both views through `bytemuck` casts, without `unsafe`.

use crate::TensorError;

/// A zero-initialised, 8-byte-aligned byte buffer of fixed length.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AlignedBytes {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBytes {
    /// Creates a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(8)],
            len,
        }
    }

    /// Creates a buffer holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed(bytes.len());
        buf.as_bytes_mut().copy_from_slice(bytes);
        buf
    }

    /// Creates a buffer holding the native-endian bytes of `values`.
    pub fn from_f32(values: &[f32]) -> Self {
        Self::from_bytes(bytemuck::cast_slice(values))
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..len]
    }

    /// Views the buffer as `f32` elements.
    ///
    /// Fails if the byte length is not a multiple of 4.
    pub fn as_f32(&self) -> Result<&[f32], TensorError> {
        let n = self.f32_len()?;
        Ok(&bytemuck::cast_slice::<u64, f32>(&self.words)[..n])
    }

    /// Mutable `f32` view; see [`as_f32`](Self::as_f32).
    pub fn as_f32_mut(&mut self) -> Result<&mut [f32], TensorError> {
        let n = self.f32_len()?;
        Ok(&mut bytemuck::cast_slice_mut::<u64, f32>(&mut self.words)[..n])
    }

    /// Sets every byte to zero.
    pub fn fill_zero(&mut self) {
        self.words.fill(0);
    }

    fn f32_len(&self) -> Result<usize, TensorError> {
        if self.len % 4 != 0 {
            return Err(TensorError::BufferSizeMismatch {
                expected: self.len.next_multiple_of(4),
                actual: self.len,
            });
        }
        Ok(self.len / 4)
    }
}

impl std::fmt::Debug for AlignedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBytes").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let b = AlignedBytes::zeroed(13);
        assert_eq!(b.len(), 13);
        assert!(b.as_bytes().iter().all(|&x| x == 0));
    }

    #[test]
    fn test_f32_view_roundtrip() {
        let mut b = AlignedBytes::from_f32(&[1.0, 2.0, 3.0]);
        assert_eq!(b.len(), 12);
        assert_eq!(b.as_f32().unwrap(), &[1.0, 2.0, 3.0]);

        b.as_f32_mut().unwrap()[1] = 5.0;
        assert_eq!(b.as_f32().unwrap(), &[1.0, 5.0, 3.0]);
        assert_eq!(&b.as_bytes()[4..8], &5.0f32.to_ne_bytes());
    }

    #[test]
    fn test_f32_view_rejects_odd_length() {
        let b = AlignedBytes::zeroed(6);
        assert!(matches!(
            b.as_f32(),
            Err(TensorError::BufferSizeMismatch { expected: 8, actual: 6 })
        ));
    }

    #[test]
    fn test_from_bytes_and_fill_zero() {
        let mut b = AlignedBytes::from_bytes(&[1, 2, 3]);
        assert_eq!(b.as_bytes(), &[1, 2, 3]);
        b.fill_zero();
        assert_eq!(b.as_bytes(), &[0, 0, 0]);
    }

    #[test]
    fn test_empty() {
        let b = AlignedBytes::zeroed(0);
        assert!(b.is_empty());
        assert!(b.as_f32().unwrap().is_empty());
    }
}
