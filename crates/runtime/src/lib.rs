// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Publishes the constructed layer graph from the master core to the worker
//! cores.
//!
//! The runtime ties together:
//! - A [`ModelTable`](net_model::ModelTable) and a
//!   [`WeightBlob`](layer_graph::WeightBlob) supplied by the caller.
//! - The two construction passes from `layer-graph`.
//! - The ready barrier, metadata gate and cache maintenance from
//!   `multicore-sync`.
//!
//! [`SharedRegion::construct`] runs once, on the master. Every other core
//! calls [`SharedRegion::attach`] and gets a shared reference to the same
//! immutable graph, or the master's failure.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use layer_graph::{LayerGraph, WeightBlob};
//! use multicore_sync::HostCoherent;
//! use net_model::ModelTable;
//! use runtime::{RuntimeConfig, SharedRegion};
//!
//! let table = ModelTable::from_json(r#"{
//!     "name": "tiny", "num_layers": 2,
//!     "layers": [
//!         { "name": "ip1", "kind": "inner_product", "fc_outputs": 10 },
//!         { "name": "prob", "kind": "softmax" }
//!     ]
//! }"#).unwrap();
//! let config = RuntimeConfig::default();
//!
//! let sizing = config.create_arena().unwrap();
//! let weights = WeightBlob::zeroed(
//!     &LayerGraph::build(&table, config.input, &sizing).unwrap().weight_requirements().unwrap(),
//! );
//!
//! let region = SharedRegion::from_config(&config, Arc::new(HostCoherent)).unwrap();
//! let arena = config.create_arena().unwrap();
//! std::thread::scope(|s| {
//!     let worker = s.spawn(|| region.attach(1).map(|g| g.len()));
//!     region
//!         .construct(0, &table, config.input, &weights, &arena, &config.quantization)
//!         .unwrap();
//!     assert_eq!(worker.join().unwrap().unwrap(), 2);
//! });
//! ```

mod config;
mod error;
mod region;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use region::SharedRegion;
