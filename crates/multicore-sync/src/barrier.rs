// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Single-shot ready barrier.
//!
//! ```text
//!          arm()                signal()
//!  (none) ───────► Pending ─────────────► Ready
//!                     │
//!                     │ abort(reason)
//!                     ▼
//!                   Failed
//! ```
//!
//! The master holds the barrier's semaphore channel for as long as the
//! barrier is pending, so a second master cannot arm the same channel. The
//! barrier resolves exactly once; it cannot be reset.
//!
//! A failed construction is published as [`BarrierState::Failed`] rather
//! than by never signalling, so that workers stop waiting and see the
//! reason instead of spinning forever.

use crate::semaphore::backoff;
use crate::{CoreId, SemaphoreBank, SyncError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

const PENDING: u8 = 0;
const READY: u8 = 1;
const FAILED: u8 = 2;

/// Observable state of a [`ReadyBarrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    Pending,
    Ready,
    Failed,
}

/// One-shot cross-core signal marking graph construction complete.
pub struct ReadyBarrier {
    bank: Arc<SemaphoreBank>,
    channel: usize,
    master: CoreId,
    state: AtomicU8,
    reason: Mutex<Option<String>>,
}

impl ReadyBarrier {
    /// Arms the barrier on `channel`, taking the channel for `master`.
    ///
    /// Fails with [`SyncError::ChannelBusy`] if any core already holds it.
    pub fn arm(bank: Arc<SemaphoreBank>, channel: usize, master: CoreId) -> Result<Self, SyncError> {
        if !bank.try_acquire(channel, master)? {
            let owner = bank.owner(channel)?.unwrap_or(master);
            return Err(SyncError::ChannelBusy { channel, owner });
        }
        tracing::debug!("ready barrier armed on channel {channel} by core {master}");
        Ok(Self {
            bank,
            channel,
            master,
            state: AtomicU8::new(PENDING),
            reason: Mutex::new(None),
        })
    }

    /// Marks construction complete and releases waiting cores.
    ///
    /// The caller must have written back everything workers will read.
    pub fn signal(&self) -> Result<(), SyncError> {
        self.resolve(READY, None)?;
        tracing::info!("ready barrier signalled on channel {}", self.channel);
        Ok(())
    }

    /// Marks construction failed; waiting cores return the reason.
    pub fn abort(&self, reason: impl Into<String>) -> Result<(), SyncError> {
        let reason = reason.into();
        tracing::warn!("ready barrier aborted: {reason}");
        self.resolve(FAILED, Some(reason))
    }

    /// Blocks until the barrier resolves. There is no timeout.
    ///
    /// Returns `Ok(())` once signalled, or [`SyncError::BarrierAborted`]
    /// carrying the master's reason.
    pub fn wait(&self) -> Result<(), SyncError> {
        let mut iteration = 0;
        loop {
            match self.state.load(Ordering::Acquire) {
                READY => return Ok(()),
                FAILED => return Err(SyncError::BarrierAborted(self.failure_reason())),
                _ => backoff(&mut iteration),
            }
        }
    }

    /// Returns the current state without blocking.
    pub fn state(&self) -> BarrierState {
        match self.state.load(Ordering::Acquire) {
            PENDING => BarrierState::Pending,
            READY => BarrierState::Ready,
            _ => BarrierState::Failed,
        }
    }

    /// Returns the semaphore channel the barrier sits on.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Returns the core that armed the barrier.
    pub fn master(&self) -> CoreId {
        self.master
    }

    fn failure_reason(&self) -> String {
        self.reason
            .lock()
            .ok()
            .and_then(|r| r.clone())
            .unwrap_or_else(|| "unknown failure".to_string())
    }

    fn resolve(&self, to: u8, reason: Option<String>) -> Result<(), SyncError> {
        // The reason lock serialises resolvers and orders the reason before
        // the state store that publishes it.
        let mut slot = self
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.state.load(Ordering::Acquire) != PENDING {
            return Err(SyncError::AlreadyResolved);
        }
        *slot = reason;
        self.state.store(to, Ordering::Release);
        drop(slot);

        self.bank.release(self.channel, self.master)
    }
}

impl std::fmt::Debug for ReadyBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyBarrier")
            .field("channel", &self.channel)
            .field("master", &self.master)
            .field("state", &self.state())
            .finish()
    }
}
