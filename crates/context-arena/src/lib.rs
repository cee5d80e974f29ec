// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # context-arena
//!
//! A budget-enforced block allocator for layer context blocks.
//!
//! Layer contexts are allocated exactly once, while the master core builds
//! the layer graph, and live for the rest of the process. The arena therefore
//! never refunds: every successful [`ContextArena::alloc`] permanently commits
//! its bytes against the [`ArenaBudget`]. An allocation that would cross the
//! budget fails with [`ArenaError::OutOfMemory`], which the graph builder
//! treats as fatal.
//!
//! - [`ArenaBudget`]: the byte ceiling, with human-readable parsing
//!   (`"64K"`, `"1M"`).
//! - [`ContextArena`]: the allocator. `Send + Sync`; counters are atomic.
//! - [`ArenaStats`]: allocation counts, committed bytes and refusals.
//!
//! # Example
//! ```
//! use context_arena::{ArenaBudget, ContextArena};
//!
//! let arena = ContextArena::new(ArenaBudget::from_kb(4));
//! let block = arena.alloc([0u32; 16]).unwrap();
//! assert_eq!(block.len(), 16);
//! assert_eq!(arena.committed_bytes(), 64);
//!
//! // Dropping the block does not refund the arena.
//! drop(block);
//! assert_eq!(arena.committed_bytes(), 64);
//! ```

mod arena;
mod budget;
mod error;
mod stats;

pub use arena::ContextArena;
pub use budget::ArenaBudget;
pub use error::ArenaError;
pub use stats::ArenaStats;
