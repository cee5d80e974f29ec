// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Never-freeing block allocator with budget enforcement.
//!
//! The [`ContextArena`] hands out owned `Box<T>` blocks and charges
//! `size_of::<T>()` against the budget. Charged bytes are never returned,
//! even if a block is dropped. Contexts live for the remainder of the
//! process.
//!
//! # Thread Safety
//! The committed-bytes counter is reserved with a compare-and-swap loop, so
//! concurrent allocations can never jointly overshoot the budget.

use crate::{ArenaBudget, ArenaError, ArenaStats};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// The context block allocator.
pub struct ContextArena {
    budget: ArenaBudget,
    committed: AtomicUsize,
    stats: Mutex<ArenaStats>,
}

impl ContextArena {
    /// Creates an empty arena with the given budget.
    pub fn new(budget: ArenaBudget) -> Self {
        Self {
            budget,
            committed: AtomicUsize::new(0),
            stats: Mutex::new(ArenaStats::default()),
        }
    }

    /// Moves `value` into a new block, charging its size to the budget.
    ///
    /// Zero-sized types are charged one byte so that every block is
    /// accounted for.
    pub fn alloc<T>(&self, value: T) -> Result<Box<T>, ArenaError> {
        let size = std::mem::size_of::<T>().max(1);
        self.reserve(size)?;

        if let Ok(mut stats) = self.stats.lock() {
            stats.record_allocation(size);
        }
        tracing::trace!(
            "context arena: committed {size} bytes for {}",
            std::any::type_name::<T>()
        );

        Ok(Box::new(value))
    }

    /// Returns the bytes committed so far.
    pub fn committed_bytes(&self) -> usize {
        self.committed.load(Ordering::Acquire)
    }

    /// Returns the bytes still available under the budget.
    pub fn available_bytes(&self) -> usize {
        self.budget.as_bytes().saturating_sub(self.committed_bytes())
    }

    /// Returns the arena budget.
    pub fn budget(&self) -> ArenaBudget {
        self.budget
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> ArenaStats {
        self.stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn reserve(&self, size: usize) -> Result<(), ArenaError> {
        let budget = self.budget.as_bytes();
        let reserved = self
            .committed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(size).filter(|&next| next <= budget)
            });

        match reserved {
            Ok(_) => Ok(()),
            Err(current) => {
                if let Ok(mut stats) = self.stats.lock() {
                    stats.record_refusal();
                }
                Err(ArenaError::OutOfMemory {
                    requested_bytes: size,
                    available_bytes: budget.saturating_sub(current),
                    budget_bytes: budget,
                })
            }
        }
    }
}

impl std::fmt::Debug for ContextArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextArena")
            .field("budget", &self.budget)
            .field("committed_bytes", &self.committed_bytes())
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
