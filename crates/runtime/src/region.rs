// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The shared region: where the master publishes the graph to the workers.
//!
//! ```text
//! master core                         worker cores
//! ───────────                         ────────────
//! SharedRegion::new   (arms barrier)
//! construct()                         attach()
//!   build + assign                      barrier.wait()  ── blocks ──┐
//!   write_back(regions)                                             │
//!   barrier.signal()  ──────────────────────────────────────────────┘
//!                                       invalidate(regions)
//!                                       &LayerGraph<Quantized>
//! ```
//!
//! A construction error or a panic on the master aborts the barrier, so
//! workers return [`RuntimeError::ConstructionFailed`] instead of waiting
//! forever.

use crate::{RuntimeConfig, RuntimeError};
use context_arena::ContextArena;
use layer_graph::{LayerGraph, QuantDefaults, Quantized, WeightBlob};
use multicore_sync::{
    BarrierState, CacheMaintenance, CoreId, CoreTopology, GateGuard, ReadyBarrier, RegionGate,
    SemaphoreBank, SyncError,
};
use net_model::{InputDims, ModelTable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// The memory region shared by all cores, holding the published graph.
///
/// `'w` is the lifetime of the weight blob the graph borrows from.
pub struct SharedRegion<'w> {
    topology: CoreTopology,
    barrier: ReadyBarrier,
    gate: RegionGate,
    cache: Arc<dyn CacheMaintenance>,
    started: AtomicBool,
    graph: OnceLock<LayerGraph<'w, Quantized>>,
}

impl<'w> SharedRegion<'w> {
    /// Creates the region and arms the ready barrier for the master core.
    pub fn new(
        topology: CoreTopology,
        bank: Arc<SemaphoreBank>,
        cache: Arc<dyn CacheMaintenance>,
    ) -> Result<Self, RuntimeError> {
        topology.validate()?;
        let barrier = ReadyBarrier::arm(
            Arc::clone(&bank),
            topology.ready_channel,
            topology.master_core,
        )?;
        let gate = RegionGate::new(bank, topology.gate_channel)?;

        tracing::info!(
            "shared region: {} cores, master {}, ready channel {}, gate channel {}",
            topology.num_cores,
            topology.master_core,
            topology.ready_channel,
            topology.gate_channel
        );

        Ok(Self {
            topology,
            barrier,
            gate,
            cache,
            started: AtomicBool::new(false),
            graph: OnceLock::new(),
        })
    }

    /// Creates a region with its own semaphore bank, sized from `config`.
    pub fn from_config(
        config: &RuntimeConfig,
        cache: Arc<dyn CacheMaintenance>,
    ) -> Result<Self, RuntimeError> {
        let bank = Arc::new(SemaphoreBank::new(config.topology.semaphore_channels));
        Self::new(config.topology.clone(), bank, cache)
    }

    /// Builds the graph on the master core and publishes it.
    ///
    /// Runs both construction passes. On success the graph is stored, every
    /// region it occupies is written back, and the barrier is signalled. On
    /// failure the barrier is aborted with the error text and the error is
    /// returned; no graph is published.
    ///
    /// # Errors
    /// - [`RuntimeError::NotMaster`] if `core` is not the master.
    /// - [`RuntimeError::AlreadyConstructed`] on a second call.
    /// - [`RuntimeError::GraphError`] for any construction failure.
    pub fn construct(
        &self,
        core: CoreId,
        table: &ModelTable,
        input: InputDims,
        weights: &'w WeightBlob,
        arena: &ContextArena,
        defaults: &QuantDefaults,
    ) -> Result<&LayerGraph<'w, Quantized>, RuntimeError> {
        if !self.topology.is_master(core) {
            return Err(RuntimeError::NotMaster {
                core,
                master: self.topology.master_core,
            });
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyConstructed);
        }

        let guard = AbortOnUnwind::new(&self.barrier);
        tracing::info!("core {core}: constructing graph '{}'", table.name);

        let built = LayerGraph::build(table, input, arena).and_then(|g| g.assign(weights, defaults));
        let graph = match built {
            Ok(graph) => graph,
            Err(e) => {
                guard.disarm();
                self.barrier.abort(e.to_string())?;
                return Err(e.into());
            }
        };

        let graph = self.graph.get_or_init(|| graph);
        let line = self.topology.cache_line_bytes;
        let regions = graph.regions();
        for span in &regions {
            self.cache.write_back(span.aligned(line));
        }

        guard.disarm();
        self.barrier.signal()?;
        tracing::info!(
            "core {core}: published {} ({} regions written back)",
            graph.summary(),
            regions.len()
        );
        Ok(graph)
    }

    /// Blocks until the master publishes, then returns the graph.
    ///
    /// Invalidates every region of the graph before handing it out. There is
    /// no timeout; a failed construction is returned as
    /// [`RuntimeError::ConstructionFailed`]. The master may only attach once
    /// the barrier has resolved, otherwise it would wait on itself
    /// ([`RuntimeError::NotWorker`]).
    pub fn attach(&self, core: CoreId) -> Result<&LayerGraph<'w, Quantized>, RuntimeError> {
        if core >= self.topology.num_cores {
            return Err(SyncError::InvalidCore(core).into());
        }
        if self.topology.is_master(core) && self.barrier.state() == BarrierState::Pending {
            return Err(RuntimeError::NotWorker { core });
        }

        match self.barrier.wait() {
            Ok(()) => {}
            Err(SyncError::BarrierAborted(reason)) => {
                tracing::warn!("core {core}: construction failed: {reason}");
                return Err(RuntimeError::ConstructionFailed(reason));
            }
            Err(e) => return Err(e.into()),
        }

        let graph = self.graph.get().ok_or_else(|| {
            RuntimeError::ConstructionFailed("barrier signalled without a graph".into())
        })?;
        let line = self.topology.cache_line_bytes;
        for span in graph.regions() {
            self.cache.invalidate(span.aligned(line));
        }

        tracing::debug!("core {core}: attached to graph '{}'", graph.name());
        Ok(graph)
    }

    /// Takes the metadata gate for `core`, spinning until it is free.
    pub fn lock_metadata(&self, core: CoreId) -> Result<GateGuard<'_>, RuntimeError> {
        if core >= self.topology.num_cores {
            return Err(SyncError::InvalidCore(core).into());
        }
        Ok(self.gate.lock(core)?)
    }

    /// The published graph, without waiting.
    pub fn graph(&self) -> Option<&LayerGraph<'w, Quantized>> {
        match self.barrier.state() {
            BarrierState::Ready => self.graph.get(),
            BarrierState::Pending | BarrierState::Failed => None,
        }
    }

    pub fn state(&self) -> BarrierState {
        self.barrier.state()
    }

    pub fn topology(&self) -> &CoreTopology {
        &self.topology
    }
}

impl std::fmt::Debug for SharedRegion<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("topology", &self.topology)
            .field("barrier", &self.barrier)
            .field("gate", &self.gate)
            .field("cache", &self.cache)
            .field("published", &self.graph.get().is_some())
            .finish()
    }
}

/// Aborts the barrier if dropped while still armed.
///
/// Held across construction so that a panic on the master releases the
/// workers with a failure instead of leaving them blocked.
struct AbortOnUnwind<'b> {
    barrier: &'b ReadyBarrier,
    armed: bool,
}

impl<'b> AbortOnUnwind<'b> {
    fn new(barrier: &'b ReadyBarrier) -> Self {
        Self {
            barrier,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.barrier.abort("master core panicked during graph construction") {
                tracing::error!("failed to abort ready barrier: {e}");
            }
        }
    }
}
