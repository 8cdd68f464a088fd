// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Serialises weights, optimizer moments and counters into one buffer.

use super::format::{ByteWriter, Header, HEADER_LEN, MAGIC, OFFSET_LEN, SCHEMA_VERSION, TRAILER_LEN};
use crate::optimizer::Optimizer;
use crate::window::TrainingWindow;
use crate::{TrainError, TrainingContext};
use model_ir::{GraphContext, TensorIndex};

struct StoredTensor<'a> {
    index: TensorIndex,
    weight: &'a [u8],
    moments: Option<(&'a [u8], &'a [u8])>,
}

/// Builds a checkpoint of the trainable weights in `window`.
///
/// Moment tables and buffers are written only when the optimizer is Adam and
/// holds moment state. The final size is computed first and the buffer is
/// allocated once.
pub fn write_checkpoint(
    ctx: &TrainingContext,
    graph: &dyn GraphContext,
    window: &TrainingWindow,
    optimizer: &Optimizer,
) -> Result<Vec<u8>, TrainError> {
    let adam = optimizer.as_adam().filter(|adam| adam.has_moments());

    let stored = window
        .trainable_tensors()
        .iter()
        .map(|&index| {
            let weight = graph
                .const_data(index)
                .ok_or_else(|| TrainError::Unknown(format!("trainable tensor {index} has no data")))?
                .as_bytes();
            let moments = match adam {
                None => None,
                Some(adam) => {
                    let (Some(m), Some(v)) = (adam.first_moment(index), adam.second_moment(index)) else {
                        return Err(TrainError::Unknown(format!(
                            "Adam moments missing for trainable tensor {index}"
                        )));
                    };
                    if m.size_bytes() != weight.len() || v.size_bytes() != weight.len() {
                        return Err(TrainError::Unknown(format!(
                            "Adam moments for tensor {index} do not match its weight size"
                        )));
                    }
                    Some((m.as_bytes(), v.as_bytes()))
                }
            };
            Ok(StoredTensor {
                index,
                weight,
                moments,
            })
        })
        .collect::<Result<Vec<_>, TrainError>>()?;

    let tensor_count = graph.tensor_count();
    let copies = if adam.is_some() { 3 } else { 1 };
    let overflow = || TrainError::FailedPrecondition("checkpoint size overflows".into());

    let table_bytes = tensor_count
        .checked_mul(OFFSET_LEN * copies)
        .ok_or_else(overflow)?;
    let data_bytes = stored
        .iter()
        .try_fold(0usize, |acc, t| acc.checked_add(t.weight.len()))
        .and_then(|w| w.checked_mul(copies))
        .ok_or_else(overflow)?;
    let data_start = HEADER_LEN + table_bytes;
    let trailer_offset = data_start.checked_add(data_bytes).ok_or_else(overflow)?;
    let total = trailer_offset.checked_add(TRAILER_LEN).ok_or_else(overflow)?;
    let to_u32 = |v: usize| u32::try_from(v).map_err(|_| overflow());
    to_u32(total)?;

    // Offsets of every stored buffer, laid out weights, then m, then v.
    let mut weight_offsets = vec![0u32; tensor_count];
    let mut m_offsets = vec![0u32; tensor_count];
    let mut v_offsets = vec![0u32; tensor_count];
    let mut cursor = data_start;
    for t in &stored {
        weight_offsets[t.index] = to_u32(cursor)?;
        cursor += t.weight.len();
    }
    if adam.is_some() {
        for table in [&mut m_offsets, &mut v_offsets] {
            for t in &stored {
                table[t.index] = to_u32(cursor)?;
                cursor += t.weight.len();
            }
        }
    }

    let header = Header {
        magic: MAGIC,
        schema_version: SCHEMA_VERSION,
        reserved: 0,
        m_table_offset: match adam {
            Some(_) => to_u32(HEADER_LEN + tensor_count * OFFSET_LEN)?,
            None => 0,
        },
        v_table_offset: match adam {
            Some(_) => to_u32(HEADER_LEN + 2 * tensor_count * OFFSET_LEN)?,
            None => 0,
        },
        trailer_offset: to_u32(trailer_offset)?,
        tensor_count: to_u32(tensor_count)?,
    };

    let mut w = ByteWriter::with_len(total);
    header.write(&mut w)?;
    for &offset in &weight_offsets {
        w.put_u32(offset)?;
    }
    if adam.is_some() {
        for &offset in m_offsets.iter().chain(&v_offsets) {
            w.put_u32(offset)?;
        }
    }
    for t in &stored {
        w.put_bytes(t.weight)?;
    }
    for t in &stored {
        if let Some((m, _)) = t.moments {
            w.put_bytes(m)?;
        }
    }
    for t in &stored {
        if let Some((_, v)) = t.moments {
            w.put_bytes(v)?;
        }
    }
    debug_assert_eq!(w.position(), trailer_offset);
    w.put_u32(ctx.num_step)?;
    w.put_u32(ctx.num_epoch)?;

    tracing::info!(
        "checkpoint written: {} bytes, {} tensors, adam state: {}",
        total,
        stored.len(),
        adam.is_some()
    );
    w.finish()
}
