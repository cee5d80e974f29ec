// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # multicore-sync
//!
//! Synchronisation between the master core that builds the layer graph and
//! the worker cores that consume it, over a shared memory region that the
//! hardware does not keep coherent.
//!
//! - [`SemaphoreBank`]: a model of the SoC hardware semaphores: numbered
//!   channels, each either free or owned by one core.
//! - [`ReadyBarrier`]: a single-shot barrier on one channel. The master arms
//!   it, then either signals it (graph published) or aborts it with a reason
//!   (construction failed). Workers block on [`ReadyBarrier::wait`].
//! - [`RegionGate`]: mutual exclusion over shared metadata on a second
//!   channel, with an RAII [`GateGuard`].
//! - [`CacheMaintenance`]: the write-back / invalidate contract.
//! - [`CoreTopology`]: core count, master id and channel assignment.
//!
//! # Visibility Contract
//!
//! ```text
//!  master                                  worker
//!  ──────                                  ──────
//!  build graph
//!  write_back(graph regions)
//!  barrier.signal()  ───── happens-before ────►  barrier.wait()
//!                                          invalidate(graph regions)
//!                                          read graph (read-only)
//! ```
//!
//! A worker must never read the region before invalidating it, and the
//! master must never signal before writing it back.

mod barrier;
mod cache;
mod error;
mod gate;
mod semaphore;
mod topology;

pub use barrier::{BarrierState, ReadyBarrier};
pub use cache::{CacheLog, CacheMaintenance, CacheOp, HostCoherent, RegionSpan};
pub use error::SyncError;
pub use gate::{GateGuard, RegionGate};
pub use semaphore::SemaphoreBank;
pub use topology::CoreTopology;

/// Identifier of a DSP core.
pub type CoreId = u32;
