// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for layer-graph construction.
//!
//! Every variant is fatal: construction runs once, before inference, and a
//! failure means the model table, weights or configuration are wrong.

use crate::ShapeError;
use net_model::LayerKind;

/// Errors that abort layer-graph construction.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The model table is malformed (unsupported kind, missing parameter, ...).
    #[error("model table error: {0}")]
    Model(#[from] net_model::ModelError),

    /// Shape propagation produced an invalid shape.
    #[error("shape error at layer {index} ('{layer}'): {source}")]
    Shape {
        index: usize,
        layer: String,
        #[source]
        source: ShapeError,
    },

    /// A context block could not be allocated.
    #[error("context allocation failed at layer {index} ('{layer}'): {source}")]
    Allocation {
        index: usize,
        layer: String,
        #[source]
        source: context_arena::ArenaError,
    },

    /// The weight blob does not hold one entry per layer of a weighted kind.
    #[error("{kind} weight array holds {supplied} entries, graph has {expected} {kind} layers")]
    WeightCountMismatch {
        kind: LayerKind,
        expected: usize,
        supplied: usize,
    },

    /// A bound weight or bias tensor has the wrong length for its layer.
    #[error("layer {index} ('{layer}'): {tensor} tensor holds {found} values, expected {expected}")]
    WeightShapeMismatch {
        index: usize,
        layer: String,
        tensor: &'static str,
        expected: usize,
        found: usize,
    },

    /// A context field was left unset after both passes.
    #[error("layer {index} ('{layer}'): field '{field}' was never populated")]
    Incomplete {
        index: usize,
        layer: String,
        field: &'static str,
    },
}
