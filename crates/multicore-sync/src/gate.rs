// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Mutual exclusion over shared-region metadata.
//!
//! The layer graph is immutable once published, so steady-state reads never
//! take the gate. It exists for coherent access to shared metadata outside
//! of initial construction, such as a later reconfiguration step.

use crate::semaphore::backoff;
use crate::{CoreId, SemaphoreBank, SyncError};
use std::sync::Arc;

/// A cross-core lock on one semaphore channel.
#[derive(Debug)]
pub struct RegionGate {
    bank: Arc<SemaphoreBank>,
    channel: usize,
}

impl RegionGate {
    /// Creates a gate on `channel`. The channel must exist in the bank.
    pub fn new(bank: Arc<SemaphoreBank>, channel: usize) -> Result<Self, SyncError> {
        bank.owner(channel)?;
        Ok(Self { bank, channel })
    }

    /// Spins until the gate is held by `core`. There is no timeout.
    pub fn lock(&self, core: CoreId) -> Result<GateGuard<'_>, SyncError> {
        let mut iteration = 0;
        loop {
            if let Some(guard) = self.try_lock(core)? {
                return Ok(guard);
            }
            backoff(&mut iteration);
        }
    }

    /// Takes the gate for `core` if it is free.
    pub fn try_lock(&self, core: CoreId) -> Result<Option<GateGuard<'_>>, SyncError> {
        if self.bank.try_acquire(self.channel, core)? {
            Ok(Some(GateGuard { gate: self, core }))
        } else {
            Ok(None)
        }
    }

    /// Returns the core holding the gate, if any.
    pub fn holder(&self) -> Option<CoreId> {
        self.bank.owner(self.channel).ok().flatten()
    }

    /// Returns the semaphore channel the gate sits on.
    pub fn channel(&self) -> usize {
        self.channel
    }
}

/// RAII guard for a held [`RegionGate`]; releases the channel on drop.
#[derive(Debug)]
pub struct GateGuard<'g> {
    gate: &'g RegionGate,
    core: CoreId,
}

impl GateGuard<'_> {
    /// Returns the core holding the gate.
    pub fn core(&self) -> CoreId {
        self.core
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.gate.bank.release(self.gate.channel, self.core) {
            tracing::error!("region gate release failed: {e}");
        }
    }
}
