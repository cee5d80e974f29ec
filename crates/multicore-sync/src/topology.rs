// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Static core and semaphore-channel assignment.
//!
//! # TOML Format
//! ```toml
//! num_cores = 8
//! master_core = 0
//! ready_channel = 2
//! gate_channel = 3
//! semaphore_channels = 32
//! cache_line_bytes = 64
//! ```

use crate::{CoreId, SyncError};

/// Core count, master identity and the two reserved semaphore channels.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CoreTopology {
    /// Total number of DSP cores.
    pub num_cores: u32,
    /// The core that builds the graph.
    pub master_core: CoreId,
    /// Channel of the ready barrier.
    pub ready_channel: usize,
    /// Channel of the shared-region gate.
    pub gate_channel: usize,
    /// Number of channels in the semaphore bank.
    pub semaphore_channels: usize,
    /// L1 cache line size used to align maintenance spans.
    pub cache_line_bytes: usize,
}

impl Default for CoreTopology {
    fn default() -> Self {
        Self {
            num_cores: 8,
            master_core: 0,
            ready_channel: 2,
            gate_channel: 3,
            semaphore_channels: 32,
            cache_line_bytes: 64,
        }
    }
}

impl CoreTopology {
    /// Checks the topology for internal consistency.
    pub fn validate(&self) -> Result<(), SyncError> {
        let invalid = |detail: String| Err(SyncError::InvalidTopology(detail));

        if self.num_cores == 0 {
            return invalid("num_cores must be at least 1".into());
        }
        if self.master_core >= self.num_cores {
            return invalid(format!(
                "master core {} outside 0..{}",
                self.master_core, self.num_cores
            ));
        }
        if self.ready_channel == self.gate_channel {
            return invalid(format!(
                "ready and gate channels must differ (both {})",
                self.ready_channel
            ));
        }
        for (name, ch) in [("ready", self.ready_channel), ("gate", self.gate_channel)] {
            if ch >= self.semaphore_channels {
                return invalid(format!(
                    "{name} channel {ch} outside 0..{}",
                    self.semaphore_channels
                ));
            }
        }
        if !self.cache_line_bytes.is_power_of_two() {
            return invalid(format!(
                "cache line size {} is not a power of two",
                self.cache_line_bytes
            ));
        }
        Ok(())
    }

    /// Returns `true` if `core` is the master.
    pub fn is_master(&self, core: CoreId) -> bool {
        core == self.master_core
    }

    /// Iterates over the worker core ids.
    pub fn workers(&self) -> impl Iterator<Item = CoreId> + '_ {
        (0..self.num_cores).filter(move |&c| c != self.master_core)
    }
}
