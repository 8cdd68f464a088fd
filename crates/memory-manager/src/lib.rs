// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! The single source of tensor memory for the training core.
//!
//! # Key Components
//!
//! - [`MemoryManager`]: allocates zero-filled buffers; optionally accounts
//!   every byte and enforces a [`MemoryBudget`].
//! - [`TensorBuffer`]: an RAII buffer. Dropping it returns its bytes to the
//!   ledger, so double frees and accounting leaks cannot be expressed.
//! - [`MemoryStats`]: current/peak bytes and event counters, created only
//!   when accounting is requested.
//!
//! # Ownership Model
//!
//! ```text
//! MemoryManager::allocate(size)
//!       │
//!       ▼
//!   TensorBuffer  ◄─── owns AlignedBytes, holds Option<Arc<Ledger>>
//!       │
//!       │  drop() / MemoryManager::deallocate(Some(buf))
//!       ▼
//!   Ledger::release()  ──► MemoryStats (peak refreshed, current reduced)
//! ```

mod budget;
mod buffer;
mod error;
mod manager;
mod stats;

pub use budget::MemoryBudget;
pub use buffer::TensorBuffer;
pub use error::MemoryError;
pub use manager::MemoryManager;
pub use stats::MemoryStats;
