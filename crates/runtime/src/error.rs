// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph publication.

use multicore_sync::CoreId;

/// Errors raised while constructing, publishing or attaching to the graph.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Graph construction failed on the master.
    #[error("graph construction error: {0}")]
    GraphError(#[from] layer_graph::GraphError),

    /// A semaphore, barrier or gate operation failed.
    #[error("synchronisation error: {0}")]
    SyncError(#[from] multicore_sync::SyncError),

    /// The context budget could not be parsed.
    #[error("arena error: {0}")]
    ArenaError(#[from] context_arena::ArenaError),

    /// The model table could not be loaded.
    #[error("model error: {0}")]
    ModelError(#[from] net_model::ModelError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A core other than the master tried to construct the graph.
    #[error("core {core} is not the master core ({master})")]
    NotMaster { core: CoreId, master: CoreId },

    /// The master tried to wait for a graph it has not published yet.
    #[error("core {core} is the master core and must construct before attaching")]
    NotWorker { core: CoreId },

    /// Construction was already started on this region.
    #[error("graph construction already ran for this region")]
    AlreadyConstructed,

    /// The master aborted the barrier; the reason is its error text.
    #[error("master failed to construct the graph: {0}")]
    ConstructionFailed(String),
}
