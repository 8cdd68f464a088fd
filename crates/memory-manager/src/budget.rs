// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Hard memory ceiling for a training session.

use crate::MemoryError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// An upper bound on the bytes the training core may hold at once.
///
/// Microcontroller-class targets count RAM in kilobytes, so the parser
/// accepts `K`/`KB` alongside `M` and `G`.
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b = MemoryBudget::parse("256K").unwrap();
/// assert_eq!(b.as_bytes(), 256 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KIB }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses `"512"`, `"64K"`, `"64KB"`, `"2M"`, `"1G"` (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let digits_end = upper
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(upper.len());
        let (num, suffix) = upper.split_at(digits_end);

        let multiplier = match suffix.trim() {
            "" | "B" => 1,
            "K" | "KB" => KIB,
            "M" | "MB" => MIB,
            "G" | "GB" => GIB,
            _ => return Err(MemoryError::InvalidBudget(s.to_string())),
        };

        let value: usize = num
            .parse()
            .map_err(|_| MemoryError::InvalidBudget(s.to_string()))?;
        let bytes = value
            .checked_mul(multiplier)
            .filter(|&b| b > 0)
            .ok_or_else(|| MemoryError::InvalidBudget(s.to_string()))?;

        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes {
            b if b >= GIB && b % GIB == 0 => write!(f, "{} GB", b / GIB),
            b if b >= MIB && b % MIB == 0 => write!(f, "{} MB", b / MIB),
            b if b >= KIB && b % KIB == 0 => write!(f, "{} KB", b / KIB),
            b => write!(f, "{b} B"),
        }
    }
}
