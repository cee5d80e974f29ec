// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # layer-graph
//!
//! Builds the execution graph of a sequential CNN in two passes.
//!
//! 1. **Shape pass** ([`LayerGraph::build`]): for each layer in order, the
//!    output shape is derived from the input shape ([`next_shape`]) and a
//!    context block is allocated from a
//!    [`ContextArena`](context_arena::ContextArena) and filled with the
//!    layer geometry ([`LayerContextAllocator`]).
//! 2. **Quantization pass** ([`LayerGraph::assign`]): a census assigns each
//!    weighted layer its occurrence ordinal, every context receives its
//!    arithmetic mode, kernel path and fraction widths, and convolution and
//!    inner product layers are bound to their slice of the [`WeightBlob`]
//!    ([`QuantizationModeAssigner`]).
//!
//! The result is a [`LayerGraph<Quantized>`](Quantized), which is what the
//! master core publishes to the workers.
//!
//! # Example
//! ```
//! use context_arena::{ArenaBudget, ContextArena};
//! use layer_graph::{LayerGraph, MapShape, QuantDefaults, WeightBlob};
//! use net_model::{InputDims, ModelTable};
//!
//! let table = ModelTable::from_json(r#"{
//!     "name": "tiny",
//!     "num_layers": 3,
//!     "layers": [
//!         { "name": "conv1", "kind": "convolution", "kernel_size": 5, "output_maps": 20 },
//!         { "name": "pool1", "kind": "pooling", "pool_window": 2, "pool_stride": 2 },
//!         { "name": "prob", "kind": "softmax" }
//!     ]
//! }"#).unwrap();
//!
//! let arena = ContextArena::new(ArenaBudget::from_kb(4));
//! let shaped = LayerGraph::build(&table, InputDims::default(), &arena).unwrap();
//! let weights = WeightBlob::zeroed(&shaped.weight_requirements().unwrap());
//! let graph = shaped.assign(&weights, &QuantDefaults::default()).unwrap();
//! assert_eq!(graph.output(), MapShape::flat(12 * 12 * 20));
//! ```

mod allocator;
mod context;
mod error;
mod graph;
mod quantize;
mod shape;
mod weights;

pub use allocator::LayerContextAllocator;
pub use context::{
    ActContext, ActInfo, ArithMode, BlockInfo, ContextInfo, ConvContext, ConvInfo, ExecProfile,
    FractionBits, IpContext, IpInfo, LayerContext, MapLayout, OptPath, PoolContext, PoolInfo,
    SoftmaxContext, WeightBinding,
};
pub use error::GraphError;
pub use graph::{GraphState, LayerGraph, LayerNode, NodeDescriptor, Quantized, Shaped};
pub use quantize::{KindCensus, QuantDefaults, QuantizationModeAssigner};
pub use shape::{next_shape, window_output, MapShape, ShapeError};
pub use weights::{ParamPair, TensorLens, WeightBlob, WeightRequirements};
