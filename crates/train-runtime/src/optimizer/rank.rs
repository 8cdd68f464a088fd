// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Depth slices: training part of a layer's output channels.

use model_ir::TensorIndex;
use std::collections::BTreeMap;
use std::ops::Range;
use tensor_core::Shape;

/// Which slice of a weight's leading dimension an update touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateRank {
    #[default]
    All,
    /// Leading indices `[0, d0 / 2)`.
    UpperHalf,
    /// Leading indices `[d0 / 2, d0)`.
    LowerHalf,
}

impl UpdateRank {
    /// Flat element range of the slice within a buffer of `shape`.
    ///
    /// Scalars have no leading dimension and are always updated whole.
    pub fn element_range(self, shape: &Shape) -> Range<usize> {
        let total = shape.num_elements();
        let Some(depth) = shape.dim(0) else {
            return 0..total;
        };
        let inner = shape.inner_size();
        let half = depth / 2;
        match self {
            UpdateRank::All => 0..total,
            UpdateRank::UpperHalf => 0..half * inner,
            UpdateRank::LowerHalf => half * inner..total,
        }
    }
}

/// Per-tensor depth slices; tensors not listed are updated whole.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UpdateRankTable {
    ranks: BTreeMap<TensorIndex, UpdateRank>,
}

impl UpdateRankTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: TensorIndex, rank: UpdateRank) {
        if rank == UpdateRank::All {
            self.ranks.remove(&index);
        } else {
            self.ranks.insert(index, rank);
        }
    }

    pub fn get(&self, index: TensorIndex) -> UpdateRank {
        self.ranks.get(&index).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}
