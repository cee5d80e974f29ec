// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # net-model
//!
//! The per-layer model description table consumed by the DSP graph builder.
//!
//! The table is an ordered list of [`LayerRecord`]s, one per layer of a
//! strictly sequential CNN. Each record carries a string kind tag and the
//! optional parameters of every kind; only the fields belonging to the
//! record's kind are read. Converting a record into typed [`LayerParams`]
//! is where an unsupported kind tag or a missing parameter is rejected.
//!
//! - [`LayerKind`]: the closed set of supported layer kinds.
//! - [`LayerParams`]: the typed, per-kind static parameters of one layer.
//! - [`ModelTable`]: the whole table, with its declared layer count.
//! - [`InputDims`]: the fixed input image dimensions feeding layer 0.
//!
//! # Example
//! ```
//! use net_model::{LayerKind, ModelTable};
//!
//! let table = ModelTable::from_json(r#"{
//!     "name": "tiny",
//!     "num_layers": 2,
//!     "layers": [
//!         { "name": "conv1", "kind": "convolution", "kernel_size": 5, "output_maps": 8 },
//!         { "name": "prob", "kind": "softmax" }
//!     ]
//! }"#).unwrap();
//! table.validate().unwrap();
//! assert_eq!(table.layers[0].layer_kind_at(0).unwrap(), LayerKind::Convolution);
//! ```

mod error;
mod layer;
mod table;

pub use error::ModelError;
pub use layer::{
    ActParams, ActivationFunction, ConvParams, IpParams, LayerKind, LayerParams, PoolOperator,
    PoolParams,
};
pub use table::{InputDims, LayerRecord, ModelTable};
