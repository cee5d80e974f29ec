// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A bank of hardware-semaphore channels.
//!
//! Each channel is a word holding either [`FREE`] or the id of the owning
//! core. Acquisition is a compare-and-swap from free to the caller's id,
//! release a compare-and-swap back, so only the owner can release. This is
//! the behaviour of the SoC semaphore block the barrier and gate sit on;
//! on the host the words are plain atomics.

use crate::{CoreId, SyncError};
use std::sync::atomic::{AtomicU32, Ordering};

/// Marker for an unowned channel.
const FREE: CoreId = CoreId::MAX;

/// Spin iterations before falling back to yielding the thread.
const SPIN_LIMIT: u32 = 64;

/// Waits a little before the next poll: busy-spins first, then yields.
pub(crate) fn backoff(iteration: &mut u32) {
    if *iteration < SPIN_LIMIT {
        std::hint::spin_loop();
        *iteration += 1;
    } else {
        std::thread::yield_now();
    }
}

/// A fixed set of semaphore channels shared by all cores.
pub struct SemaphoreBank {
    channels: Vec<AtomicU32>,
}

impl SemaphoreBank {
    /// Creates a bank of `channels` free channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| AtomicU32::new(FREE)).collect(),
        }
    }

    /// Returns the number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the bank has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Tries once to take `channel` for `core`.
    ///
    /// Returns `Ok(false)` if another core holds it. Re-acquiring a channel
    /// the caller already holds also returns `Ok(false)`: channels do not
    /// nest.
    pub fn try_acquire(&self, channel: usize, core: CoreId) -> Result<bool, SyncError> {
        check_core(core)?;
        let slot = self.slot(channel)?;
        Ok(slot
            .compare_exchange(FREE, core, Ordering::Acquire, Ordering::Relaxed)
            .is_ok())
    }

    /// Spins until `channel` is taken for `core`. There is no timeout.
    pub fn acquire(&self, channel: usize, core: CoreId) -> Result<(), SyncError> {
        let mut iteration = 0;
        while !self.try_acquire(channel, core)? {
            backoff(&mut iteration);
        }
        Ok(())
    }

    /// Releases `channel`, which must be held by `core`.
    pub fn release(&self, channel: usize, core: CoreId) -> Result<(), SyncError> {
        check_core(core)?;
        let slot = self.slot(channel)?;
        slot.compare_exchange(core, FREE, Ordering::Release, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|owner| SyncError::NotOwner {
                channel,
                core,
                owner: (owner != FREE).then_some(owner),
            })
    }

    /// Returns the core currently holding `channel`, if any.
    pub fn owner(&self, channel: usize) -> Result<Option<CoreId>, SyncError> {
        let owner = self.slot(channel)?.load(Ordering::Acquire);
        Ok((owner != FREE).then_some(owner))
    }

    fn slot(&self, channel: usize) -> Result<&AtomicU32, SyncError> {
        self.channels
            .get(channel)
            .ok_or(SyncError::ChannelOutOfRange {
                channel,
                channels: self.channels.len(),
            })
    }
}

fn check_core(core: CoreId) -> Result<(), SyncError> {
    if core == FREE {
        return Err(SyncError::InvalidCore(core));
    }
    Ok(())
}

impl std::fmt::Debug for SemaphoreBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let held = self
            .channels
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) != FREE)
            .count();
        f.debug_struct("SemaphoreBank")
            .field("channels", &self.channels.len())
            .field("held", &held)
            .finish()
    }
}
