// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for reading the model description table.

/// Errors that can occur when reading or interpreting the model table.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The table file could not be read.
    #[error("failed to read model table: {0}")]
    TableReadError(#[from] std::io::Error),

    /// The table JSON is malformed.
    #[error("failed to parse model table: {0}")]
    TableParseError(#[from] serde_json::Error),

    /// A record names a layer kind outside the supported set.
    #[error("layer {index} ('{layer}'): unsupported layer kind '{kind}'")]
    UnsupportedLayerKind {
        index: usize,
        layer: String,
        kind: String,
    },

    /// A record lacks a parameter its kind requires.
    #[error("layer {index} ('{layer}'): missing parameter '{field}'")]
    MissingParameter {
        index: usize,
        layer: String,
        field: &'static str,
    },

    /// A layer definition is invalid (e.g., a zero stride).
    #[error("invalid layer '{layer}': {detail}")]
    InvalidLayer { layer: String, detail: String },

    /// The table does not hold the declared number of layers.
    #[error("table declares {declared} layers but contains {found}")]
    LayerCountMismatch { declared: usize, found: usize },

    /// The table is empty.
    #[error("model table contains no layers")]
    EmptyTable,
}
