// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for context allocation.

/// Errors that can occur when allocating context blocks.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    /// The requested block would exceed the arena budget.
    #[error("out of memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// A budget string could not be parsed.
    #[error("invalid budget '{input}': {detail}")]
    InvalidBudget { input: String, detail: String },
}
