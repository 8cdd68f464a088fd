// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Field layout of the checkpoint format and little-endian field codecs.
//!
//! ```text
//! offset  size  field
//! 0       2     magic number (429)
//! 2       1     schema version (1)
//! 3       1     reserved
//! 4       4     offset of the m offset table, 0 if absent
//! 8       4     offset of the v offset table, 0 if absent
//! 12      4     offset of the trailer
//! 16      4     tensor count N
//! 20      4·N   weight buffer offset per tensor, 0 if not stored
//! ...     4·N   m offsets, then 4·N v offsets (Adam state only)
//! ...           weight buffers, then m buffers, then v buffers
//! trailer 4+4   num_step, num_epoch
//! ```

use crate::TrainError;

pub const MAGIC: u16 = 429;
pub const SCHEMA_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 20;
pub const TRAILER_LEN: usize = 8;
/// Width of one offset-table entry.
pub const OFFSET_LEN: usize = 4;

/// The fixed 20-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u16,
    pub schema_version: u8,
    pub reserved: u8,
    pub m_table_offset: u32,
    pub v_table_offset: u32,
    pub trailer_offset: u32,
    pub tensor_count: u32,
}

impl Header {
    pub fn write(&self, w: &mut ByteWriter) -> Result<(), TrainError> {
        w.put_u16(self.magic)?;
        w.put_u8(self.schema_version)?;
        w.put_u8(self.reserved)?;
        w.put_u32(self.m_table_offset)?;
        w.put_u32(self.v_table_offset)?;
        w.put_u32(self.trailer_offset)?;
        w.put_u32(self.tensor_count)
    }

    /// Decodes the header and checks magic number and schema version.
    pub fn read(r: &ByteReader<'_>) -> Result<Self, TrainError> {
        let header = Self {
            magic: r.u16_at(0)?,
            schema_version: r.u8_at(2)?,
            reserved: r.u8_at(3)?,
            m_table_offset: r.u32_at(4)?,
            v_table_offset: r.u32_at(8)?,
            trailer_offset: r.u32_at(12)?,
            tensor_count: r.u32_at(16)?,
        };
        if header.magic != MAGIC {
            return Err(TrainError::FailReadCheckpointFile(format!(
                "bad magic number {} (expected {MAGIC})",
                header.magic
            )));
        }
        if header.schema_version != SCHEMA_VERSION {
            return Err(TrainError::FailReadCheckpointFile(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                header.schema_version
            )));
        }
        Ok(header)
    }
}

/// Sequential writer over a buffer allocated once at its final size.
pub struct ByteWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteWriter {
    pub fn with_len(len: usize) -> Self {
        Self {
            buf: vec![0; len],
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), TrainError> {
        let end = self
            .pos
            .checked_add(bytes.len())
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                TrainError::Unknown(format!(
                    "checkpoint write of {} bytes at {} overruns {} byte buffer",
                    bytes.len(),
                    self.pos,
                    self.buf.len()
                ))
            })?;
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<(), TrainError> {
        self.put_bytes(&[v])
    }

    pub fn put_u16(&mut self, v: u16) -> Result<(), TrainError> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<(), TrainError> {
        self.put_bytes(&v.to_le_bytes())
    }

    /// Returns the buffer, which must have been filled exactly.
    pub fn finish(self) -> Result<Vec<u8>, TrainError> {
        if self.pos != self.buf.len() {
            return Err(TrainError::Unknown(format!(
                "checkpoint size mismatch: wrote {} of {} bytes",
                self.pos,
                self.buf.len()
            )));
        }
        Ok(self.buf)
    }
}

/// Bounds-checked random access into checkpoint bytes.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `len` bytes at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], TrainError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| {
                TrainError::FailReadCheckpointFile(format!(
                    "{len} bytes at offset {offset} exceed the {} byte checkpoint",
                    self.bytes.len()
                ))
            })
    }

    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], TrainError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8, TrainError> {
        Ok(self.array_at::<1>(offset)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16, TrainError> {
        Ok(u16::from_le_bytes(self.array_at(offset)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, TrainError> {
        Ok(u32::from_le_bytes(self.array_at(offset)?))
    }

    /// Reads `count` little-endian offsets starting at `offset`.
    pub fn offset_table(&self, offset: usize, count: usize) -> Result<Vec<usize>, TrainError> {
        let table_len = count.checked_mul(OFFSET_LEN).ok_or_else(|| {
            TrainError::FailReadCheckpointFile(format!("offset table of {count} entries overflows"))
        })?;
        Ok(self
            .slice(offset, table_len)?
            .chunks_exact(OFFSET_LEN)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .collect())
    }
}
