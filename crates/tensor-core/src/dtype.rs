// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scalar element kinds carried by graph tensors.

/// Enumerates the element types a graph tensor can hold.
///
/// Only [`DataType::Float32`] is trainable; the remaining tags exist so the
/// allocator can size every tensor the graph declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
    Float16,
    Float32,
    Float64,
    Bool,
}

impl DataType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::U8 | DataType::S8 | DataType::Bool => 1,
            DataType::U16 | DataType::S16 | DataType::Float16 => 2,
            DataType::U32 | DataType::S32 | DataType::Float32 => 4,
            DataType::U64 | DataType::S64 | DataType::Float64 => 8,
        }
    }

    /// Returns `true` for floating-point tags.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float16 | DataType::Float32 | DataType::Float64)
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::U8 => "u8",
            DataType::S8 => "s8",
            DataType::U16 => "u16",
            DataType::S16 => "s16",
            DataType::U32 => "u32",
            DataType::S32 => "s32",
            DataType::U64 => "u64",
            DataType::S64 => "s64",
            DataType::Float16 => "float16",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
