// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for cross-core synchronisation.

use crate::CoreId;

/// Errors raised by the semaphore bank, barrier and gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A channel number outside the bank was used.
    #[error("semaphore channel {channel} out of range (bank has {channels})")]
    ChannelOutOfRange { channel: usize, channels: usize },

    /// A core id that cannot own a channel was used.
    #[error("invalid core id {0}")]
    InvalidCore(CoreId),

    /// The channel is already held by another core.
    #[error("semaphore channel {channel} is held by core {owner}")]
    ChannelBusy { channel: usize, owner: CoreId },

    /// A core released a channel it does not own.
    #[error("core {core} released semaphore channel {channel} owned by {owner:?}")]
    NotOwner {
        channel: usize,
        core: CoreId,
        owner: Option<CoreId>,
    },

    /// The master aborted the ready barrier.
    #[error("ready barrier aborted: {0}")]
    BarrierAborted(String),

    /// The ready barrier was already signalled or aborted.
    #[error("ready barrier already resolved")]
    AlreadyResolved,

    /// The core topology is inconsistent.
    #[error("invalid core topology: {0}")]
    InvalidTopology(String),
}
