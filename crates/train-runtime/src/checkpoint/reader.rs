// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Restores weights, optimizer moments and counters from a checkpoint buffer.

use super::format::{ByteReader, Header, HEADER_LEN};
use crate::optimizer::Optimizer;
use crate::window::TrainingWindow;
use crate::{TrainError, TrainingContext};
use model_ir::{GraphContext, TensorIndex};

/// Header, offset tables and trailer of a checkpoint, bounds-checked.
pub(crate) struct ParsedCheckpoint<'a> {
    pub header: Header,
    pub weight_offsets: Vec<usize>,
    pub moment_offsets: Option<(Vec<usize>, Vec<usize>)>,
    pub num_step: u32,
    pub num_epoch: u32,
    pub reader: ByteReader<'a>,
}

impl<'a> ParsedCheckpoint<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, TrainError> {
        let reader = ByteReader::new(bytes);
        let header = Header::read(&reader)?;
        let count = header.tensor_count as usize;
        let weight_offsets = reader.offset_table(HEADER_LEN, count)?;
        let moment_offsets = match (header.m_table_offset, header.v_table_offset) {
            (0, 0) => None,
            (0, _) | (_, 0) => {
                return Err(TrainError::FailReadCheckpointFile(
                    "checkpoint carries only one Adam moment table".into(),
                ))
            }
            (m, v) => Some((
                reader.offset_table(m as usize, count)?,
                reader.offset_table(v as usize, count)?,
            )),
        };
        let trailer = header.trailer_offset as usize;
        let num_step = reader.u32_at(trailer)?;
        let num_epoch = reader.u32_at(trailer + 4)?;
        Ok(Self {
            header,
            weight_offsets,
            moment_offsets,
            num_step,
            num_epoch,
            reader,
        })
    }

    /// Number of tensors with a nonzero weight offset.
    pub fn stored_tensors(&self) -> usize {
        self.weight_offsets.iter().filter(|&&o| o != 0).count()
    }

    fn stored_slice(
        &self,
        table: &[usize],
        index: TensorIndex,
        len: usize,
        what: &str,
    ) -> Result<&'a [u8], TrainError> {
        match table.get(index).copied() {
            Some(0) | None => Err(TrainError::FailReadCheckpointFile(format!(
                "checkpoint holds no {what} for trainable tensor {index}"
            ))),
            Some(offset) => self.reader.slice(offset, len),
        }
    }
}

/// Loads a checkpoint into the graph weights, optimizer and counters.
///
/// The whole buffer is validated against the graph and optimizer before
/// anything is written, so a rejected checkpoint leaves every piece of state
/// as it was. An Adam optimizer reading a checkpoint without moment tables
/// starts from zero moments; an SGD optimizer rejects one that has them.
pub fn read_checkpoint(
    bytes: &[u8],
    ctx: &mut TrainingContext,
    graph: &mut dyn GraphContext,
    window: &TrainingWindow,
    optimizer: &mut Optimizer,
) -> Result<(), TrainError> {
    let parsed = ParsedCheckpoint::parse(bytes)?;
    let count = parsed.header.tensor_count as usize;
    if count != graph.tensor_count() {
        return Err(TrainError::FailReadCheckpointFile(format!(
            "checkpoint has {count} tensors, graph has {}",
            graph.tensor_count()
        )));
    }
    if optimizer.as_adam().is_none() && parsed.moment_offsets.is_some() {
        return Err(TrainError::FailReadCheckpointFile(
            "checkpoint carries Adam moments but the optimizer is SGD".into(),
        ));
    }

    let mut weights = Vec::with_capacity(window.trainable_tensors().len());
    let mut moments = Vec::new();
    for &index in window.trainable_tensors() {
        let size = graph
            .const_data(index)
            .ok_or_else(|| TrainError::Unknown(format!("trainable tensor {index} has no data")))?
            .size_bytes();
        weights.push((index, parsed.stored_slice(&parsed.weight_offsets, index, size, "weights")?));
        if let Some((m_table, v_table)) = &parsed.moment_offsets {
            let m = parsed.stored_slice(m_table, index, size, "first moment")?;
            let v = parsed.stored_slice(v_table, index, size, "second moment")?;
            moments.push((index, m, v));
        }
    }
    let ignored = parsed.stored_tensors().saturating_sub(weights.len());
    if ignored > 0 {
        tracing::debug!("ignoring {ignored} stored tensors outside the training window");
    }

    // Apply.
    match optimizer.as_adam_mut() {
        Some(adam) if parsed.moment_offsets.is_some() => adam.restore_moments(&moments)?,
        Some(adam) => adam.full_reset(),
        None => optimizer.full_reset(),
    }
    for (index, data) in weights {
        graph
            .const_data_mut(index)
            .ok_or_else(|| TrainError::Unknown(format!("trainable tensor {index} has no data")))?
            .as_bytes_mut()
            .copy_from_slice(data);
    }
    ctx.num_step = parsed.num_step;
    ctx.num_epoch = parsed.num_epoch;

    tracing::info!(
        "checkpoint restored: {} tensors, step {}, epoch {}",
        window.trainable_tensors().len(),
        ctx.num_step,
        ctx.num_epoch
    );
    Ok(())
}
