// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binary training checkpoints.
//!
//! A checkpoint stores the trainable weights of the current window, the Adam
//! moments when the optimizer holds them, and the step/epoch counters. All
//! integers are little-endian; see [`format`] for the byte layout.
//!
//! Writing is all-or-nothing: the buffer is sized up front and returned only
//! once complete. Reading validates the whole buffer before touching any
//! state.

pub mod format;
mod reader;
mod writer;

pub use reader::read_checkpoint;
pub use writer::write_checkpoint;

use crate::TrainError;
use reader::ParsedCheckpoint;

/// What a checkpoint buffer contains, without applying it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CheckpointSummary {
    pub size_bytes: usize,
    pub magic: u16,
    pub schema_version: u8,
    pub tensor_count: u32,
    /// Tensors with stored weights.
    pub stored_tensors: usize,
    pub has_adam_state: bool,
    pub num_step: u32,
    pub num_epoch: u32,
}

/// Parses and bounds-checks a checkpoint's header, tables and trailer.
pub fn inspect(bytes: &[u8]) -> Result<CheckpointSummary, TrainError> {
    let parsed = ParsedCheckpoint::parse(bytes)?;
    Ok(CheckpointSummary {
        size_bytes: bytes.len(),
        magic: parsed.header.magic,
        schema_version: parsed.header.schema_version,
        tensor_count: parsed.header.tensor_count,
        stored_tensors: parsed.stored_tensors(),
        has_adam_state: parsed.moment_offsets.is_some(),
        num_step: parsed.num_step,
        num_epoch: parsed.num_epoch,
    })
}
