// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The layer graph: an ordered chain of layers with their contexts.
//!
//! # Type-State Pattern
//!
//! ```text
//! LayerGraph<Shaped>     : shapes propagated, contexts allocated,
//!       │                  second-pass fields still unset.
//!       │  .assign(weights, defaults)
//!       ▼
//! LayerGraph<Quantized>  : every context complete, weights bound,
//!                          ready to be published to the worker cores.
//! ```
//!
//! Only a `Quantized` graph exposes the memory [`regions`](LayerGraph::regions)
//! that must be written back before the ready barrier is signalled, so an
//! incomplete graph cannot be published.

use crate::allocator::LayerContextAllocator;
use crate::context::{BlockInfo, ContextInfo, ExecProfile, FractionBits, LayerContext, MapLayout};
use crate::quantize::{QuantDefaults, QuantizationModeAssigner};
use crate::weights::{WeightBlob, WeightRequirements};
use crate::{next_shape, GraphError, MapShape};
use context_arena::ContextArena;
use multicore_sync::RegionSpan;
use net_model::{InputDims, LayerKind, ModelTable};
use std::fmt;
use std::marker::PhantomData;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: shapes and first-pass contexts are in place.
#[derive(Debug, Clone, Copy)]
pub struct Shaped;

/// Marker: every context is complete and weights are bound.
#[derive(Debug, Clone, Copy)]
pub struct Quantized;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Shaped {}
    impl Sealed for super::Quantized {}
}

/// Sealed trait for graph states.
pub trait GraphState: sealed::Sealed + fmt::Debug {}
impl GraphState for Shaped {}
impl GraphState for Quantized {}

// ── LayerNode ──────────────────────────────────────────────────────

/// One layer of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerNode<'w> {
    /// Execution position.
    pub index: usize,
    pub name: String,
    pub input: MapShape,
    pub output: MapShape,
    pub context: LayerContext<'w>,
}

impl LayerNode<'_> {
    /// The layer kind, taken from the context variant.
    pub fn kind(&self) -> LayerKind {
        self.context.kind()
    }

    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "[{:>2}] {:<12} {:<13} {} -> {}",
            self.index,
            self.name,
            self.kind(),
            self.input,
            self.output
        )
    }
}

/// Serializable view of one node, used for inspection and comparison.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NodeDescriptor {
    pub index: usize,
    pub name: String,
    pub kind: LayerKind,
    pub input: MapShape,
    pub output: MapShape,
    pub info: ContextInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction: Option<FractionBits>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<MapLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<BlockInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_ordinal: Option<usize>,
    /// For pooling: whether a vectorised 2x2/2 kernel could have been used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fast_path_eligible: Option<bool>,
}

// ── LayerGraph ─────────────────────────────────────────────────────

/// The constructed layer chain.
///
/// `'w` is the lifetime of the [`WeightBlob`] the contexts borrow from once
/// the graph is quantized.
#[derive(Debug, Clone)]
pub struct LayerGraph<'w, S: GraphState = Shaped> {
    name: String,
    input: MapShape,
    nodes: Vec<LayerNode<'w>>,
    _state: PhantomData<S>,
}

// ── Shaped state ───────────────────────────────────────────────────

impl<'w> LayerGraph<'w, Shaped> {
    /// Runs the first pass over `table`.
    ///
    /// The table is validated as a whole first (see [`ModelTable::validate`]),
    /// so nothing is allocated for a malformed table. Then for each layer, in
    /// order: parse its parameters, derive its output
    /// shape from its input shape, allocate its context from `arena`.
    /// Layer 0 reads `input`; layer i reads layer i-1's output.
    ///
    /// # Errors
    /// - [`GraphError::Model`] for a length mismatch, an unsupported kind, a
    ///   missing parameter, a softmax before the last layer or a duplicate
    ///   layer name.
    /// - [`GraphError::Shape`] for a degenerate derived shape, or weight
    ///   lengths that overflow.
    /// - [`GraphError::Allocation`] when the arena budget is exhausted.
    pub fn build(
        table: &ModelTable,
        input: InputDims,
        arena: &ContextArena,
    ) -> Result<Self, GraphError> {
        table.validate()?;

        let mut shape = MapShape::from(input)
            .validated()
            .map_err(|source| GraphError::Shape {
                index: 0,
                layer: table.layers[0].name.clone(),
                source,
            })?;

        let allocator = LayerContextAllocator::new(arena);
        let mut nodes: Vec<LayerNode<'w>> = Vec::with_capacity(table.num_layers);

        for (index, record) in table.layers.iter().enumerate() {
            let params = record.params(index)?;
            let output = next_shape(&params, shape).map_err(|source| GraphError::Shape {
                index,
                layer: record.name.clone(),
                source,
            })?;
            let context = allocator.allocate(index, &record.name, &params, shape)?;

            tracing::debug!(
                "layer {index} '{}' ({}): {shape} -> {output}",
                record.name,
                params.kind()
            );
            nodes.push(LayerNode {
                index,
                name: record.name.clone(),
                input: shape,
                output,
                context,
            });
            shape = output;
        }

        tracing::info!(
            "shaped graph '{}': {} layers, {} context bytes committed",
            table.name,
            nodes.len(),
            arena.committed_bytes()
        );

        Ok(Self {
            name: table.name.clone(),
            input: MapShape::from(input),
            nodes,
            _state: PhantomData,
        })
    }

    /// Weight and bias lengths each weighted layer will require.
    ///
    /// `build` already rejects unrepresentable lengths, so this only fails
    /// for a graph whose contexts were edited afterwards.
    pub fn weight_requirements(&self) -> Result<WeightRequirements, GraphError> {
        let mut req = WeightRequirements::default();
        for node in &self.nodes {
            let shape_err = |source| GraphError::Shape {
                index: node.index,
                layer: node.name.clone(),
                source,
            };
            match &node.context {
                LayerContext::Convolution(c) => {
                    req.conv.push(c.info.tensor_lens().map_err(shape_err)?)
                }
                LayerContext::InnerProduct(ip) => req
                    .inner_product
                    .push(ip.info.tensor_lens().map_err(shape_err)?),
                LayerContext::Pooling(_) | LayerContext::Activation(_) | LayerContext::Softmax(_) => {}
            }
        }
        Ok(req)
    }

    /// Runs the second pass and transitions to [`Quantized`].
    ///
    /// Fails if the assigner rejects the weights, or if any context field is
    /// still unset afterwards ([`GraphError::Incomplete`]).
    pub fn assign(
        mut self,
        weights: &'w WeightBlob,
        defaults: &QuantDefaults,
    ) -> Result<LayerGraph<'w, Quantized>, GraphError> {
        QuantizationModeAssigner::new(defaults).assign(&mut self.nodes, weights)?;

        for node in &self.nodes {
            if let Some(field) = node.context.missing_field() {
                return Err(GraphError::Incomplete {
                    index: node.index,
                    layer: node.name.clone(),
                    field,
                });
            }
        }

        Ok(LayerGraph {
            name: self.name,
            input: self.input,
            nodes: self.nodes,
            _state: PhantomData,
        })
    }
}

// ── Quantized state ────────────────────────────────────────────────

impl LayerGraph<'_, Quantized> {
    /// Every memory span a worker reads when it walks the graph.
    ///
    /// Covers the node array, each node's name and context block, and the
    /// bound weight and bias tensors. Empty spans are omitted.
    pub fn regions(&self) -> Vec<RegionSpan> {
        let mut spans = Vec::with_capacity(1 + self.nodes.len() * 4);
        spans.push(RegionSpan::of(self.nodes.as_slice()));
        for node in &self.nodes {
            spans.push(RegionSpan::of(node.name.as_str()));
            spans.push(node.context.span());
            if let Some(binding) = node.context.binding() {
                spans.push(RegionSpan::of(binding.weights));
                spans.push(RegionSpan::of(binding.bias));
            }
        }
        spans.retain(|s| s.len > 0);
        spans
    }

    /// Bytes of bound weight and bias values.
    pub fn bound_weight_bytes(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| n.context.binding())
            .map(|b| std::mem::size_of_val(b.weights) + std::mem::size_of_val(b.bias))
            .sum()
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<'w, S: GraphState> LayerGraph<'w, S> {
    /// Model name from the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input shape of layer 0.
    pub fn input(&self) -> MapShape {
        self.input
    }

    /// Output shape of the last layer.
    pub fn output(&self) -> MapShape {
        self.nodes.last().map_or(self.input, |n| n.output)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The nodes in execution order.
    pub fn nodes(&self) -> &[LayerNode<'w>] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&LayerNode<'w>> {
        self.nodes.get(index)
    }

    /// Number of layers of `kind`.
    pub fn count_of(&self, kind: LayerKind) -> usize {
        self.nodes.iter().filter(|n| n.kind() == kind).count()
    }

    /// Serializable per-node descriptors, in execution order.
    pub fn describe(&self) -> Vec<NodeDescriptor> {
        self.nodes
            .iter()
            .map(|n| NodeDescriptor {
                index: n.index,
                name: n.name.clone(),
                kind: n.kind(),
                input: n.input,
                output: n.output,
                info: n.context.info(),
                exec: n.context.exec(),
                fraction: n.context.fraction(),
                layout: n.context.layout(),
                block: match &n.context {
                    LayerContext::Convolution(c) => c.block,
                    _ => None,
                },
                weight_ordinal: n.context.binding().map(|b| b.ordinal),
                fast_path_eligible: match &n.context {
                    LayerContext::Pooling(p) => Some(p.info.fast_path_eligible()),
                    _ => None,
                },
            })
            .collect()
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        format!(
            "Graph '{}': {} layers ({} conv, {} pool, {} act, {} ip, {} softmax), {} -> {}",
            self.name,
            self.len(),
            self.count_of(LayerKind::Convolution),
            self.count_of(LayerKind::Pooling),
            self.count_of(LayerKind::Activation),
            self.count_of(LayerKind::InnerProduct),
            self.count_of(LayerKind::Softmax),
            self.input,
            self.output(),
        )
    }
}

impl<S: GraphState> fmt::Display for LayerGraph<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LayerGraph '{}' ({} layers):", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ShapeError, TensorLens};
    use context_arena::ArenaBudget;
    use net_model::{LayerRecord, ModelError};

    fn lenet() -> ModelTable {
        ModelTable::from_json(
            r#"{
                "name": "lenet",
                "num_layers": 8,
                "layers": [
                    { "name": "conv1", "kind": "convolution", "kernel_size": 5, "output_maps": 20 },
                    { "name": "pool1", "kind": "pooling", "pool_window": 2, "pool_stride": 2 },
                    { "name": "conv2", "kind": "convolution", "kernel_size": 5, "output_maps": 50 },
                    { "name": "pool2", "kind": "pooling", "pool_window": 2, "pool_stride": 2 },
                    { "name": "ip1", "kind": "inner_product", "fc_outputs": 500 },
                    { "name": "relu1", "kind": "activation" },
                    { "name": "ip2", "kind": "inner_product", "fc_outputs": 10 },
                    { "name": "prob", "kind": "softmax" }
                ]
            }"#,
        )
        .unwrap()
    }

    fn mnist() -> InputDims {
        InputDims::default()
    }

    fn arena() -> ContextArena {
        ContextArena::new(ArenaBudget::from_kb(16))
    }

    #[test]
    fn test_build_lenet_shapes() {
        let arena = arena();
        let graph = LayerGraph::build(&lenet(), mnist(), &arena).unwrap();
        let outputs: Vec<MapShape> = graph.nodes().iter().map(|n| n.output).collect();
        assert_eq!(
            outputs,
            vec![
                MapShape::new(24, 24, 20),
                MapShape::new(12, 12, 20),
                MapShape::new(8, 8, 50),
                MapShape::new(4, 4, 50),
                MapShape::flat(500),
                MapShape::flat(500),
                MapShape::flat(10),
                MapShape::flat(10),
            ]
        );
        assert_eq!(arena.stats().allocations, 8);
    }

    #[test]
    fn test_chain_invariant() {
        let arena = arena();
        let graph = LayerGraph::build(&lenet(), mnist(), &arena).unwrap();
        assert_eq!(graph.node(0).unwrap().input, MapShape::new(28, 28, 1));
        for pair in graph.nodes().windows(2) {
            assert_eq!(pair[1].input, pair[0].output);
        }
    }

    #[test]
    fn test_ip_after_7x7x64() {
        let mut conv = LayerRecord::new("conv", "convolution");
        conv.kernel_size = Some(1);
        conv.output_maps = Some(64);
        let mut ip = LayerRecord::new("ip", "inner_product");
        ip.fc_outputs = Some(3136);
        let table = ModelTable::new("flat", vec![conv, ip, LayerRecord::new("prob", "softmax")]);
        let input = InputDims {
            maps: 3,
            width: 7,
            height: 7,
        };
        let arena = arena();
        let graph = LayerGraph::build(&table, input, &arena).unwrap();
        assert_eq!(
            graph.node(1).unwrap().context.info(),
            ContextInfo::InnerProduct(crate::IpInfo {
                inputs: 3136,
                outputs: 3136
            })
        );
        assert_eq!(graph.node(2).unwrap().output, MapShape::flat(3136));
        assert_eq!(
            graph.node(2).unwrap().context.info(),
            ContextInfo::Softmax { inputs: 3136 }
        );
    }

    #[test]
    fn test_unsupported_kind() {
        let table = ModelTable::new(
            "bad",
            vec![
                LayerRecord::new("lrn1", "lrn"),
                LayerRecord::new("prob", "softmax"),
            ],
        );
        let arena = arena();
        let err = LayerGraph::build(&table, mnist(), &arena).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Model(ModelError::UnsupportedLayerKind { index: 0, .. })
        ));
        assert_eq!(arena.stats().allocations, 0);
    }

    #[test]
    fn test_layer_after_softmax() {
        let table = ModelTable::new(
            "bad",
            vec![
                LayerRecord::new("prob", "softmax"),
                LayerRecord::new("relu", "activation"),
            ],
        );
        let arena = arena();
        let err = LayerGraph::build(&table, mnist(), &arena).unwrap_err();
        assert!(matches!(err, GraphError::Model(ModelError::InvalidLayer { .. })));
        assert_eq!(arena.stats().allocations, 0);
    }

    #[test]
    fn test_duplicate_layer_name_rejected() {
        let mut ip = LayerRecord::new("fc", "inner_product");
        ip.fc_outputs = Some(10);
        let table = ModelTable::new(
            "dup",
            vec![
                ip,
                LayerRecord::new("fc", "activation"),
                LayerRecord::new("prob", "softmax"),
            ],
        );
        let err = LayerGraph::build(&table, mnist(), &arena()).unwrap_err();
        assert!(
            matches!(&err, GraphError::Model(ModelError::InvalidLayer { layer, .. }) if layer == "fc"),
            "{err}"
        );
    }

    #[test]
    fn test_declared_length_mismatch() {
        let mut table = lenet();
        table.num_layers = 9;
        let err = LayerGraph::build(&table, mnist(), &arena()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Model(ModelError::LayerCountMismatch {
                declared: 9,
                found: 8
            })
        ));
    }

    #[test]
    fn test_degenerate_shape() {
        let input = InputDims {
            maps: 1,
            width: 4,
            height: 4,
        };
        let err = LayerGraph::build(&lenet(), input, &arena()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Shape {
                index: 0,
                source: ShapeError::NonPositive { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_weight_length_overflow_rejected() {
        let mut ip = LayerRecord::new("ip_huge", "inner_product");
        ip.fc_outputs = Some(1 << 62);
        let table = ModelTable::new("huge", vec![ip, LayerRecord::new("prob", "softmax")]);

        let err = LayerGraph::build(&table, mnist(), &arena()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Shape {
                index: 0,
                source: ShapeError::Overflow,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_input_dims() {
        let input = InputDims {
            maps: 0,
            width: 28,
            height: 28,
        };
        let err = LayerGraph::build(&lenet(), input, &arena()).unwrap_err();
        assert!(matches!(err, GraphError::Shape { index: 0, .. }));
    }

    #[test]
    fn test_arena_exhausted() {
        let arena = ContextArena::new(ArenaBudget::from_bytes(64));
        let err = LayerGraph::build(&lenet(), mnist(), &arena).unwrap_err();
        assert!(matches!(err, GraphError::Allocation { .. }));
        assert!(arena.stats().refused > 0);
    }

    #[test]
    fn test_weight_requirements() {
        let graph = LayerGraph::build(&lenet(), mnist(), &arena()).unwrap();
        let req = graph.weight_requirements().unwrap();
        assert_eq!(
            req.conv,
            vec![
                TensorLens {
                    weights: 20 * 25,
                    bias: 20
                },
                TensorLens {
                    weights: 50 * 20 * 25,
                    bias: 50
                },
            ]
        );
        assert_eq!(
            req.inner_product,
            vec![
                TensorLens {
                    weights: 500 * 800,
                    bias: 500
                },
                TensorLens {
                    weights: 10 * 500,
                    bias: 10
                },
            ]
        );
    }

    #[test]
    fn test_assign_completes_every_context() {
        let arena = arena();
        let shaped = LayerGraph::build(&lenet(), mnist(), &arena).unwrap();
        let blob = WeightBlob::zeroed(&shaped.weight_requirements().unwrap());
        let graph = shaped.assign(&blob, &QuantDefaults::default()).unwrap();
        for node in graph.nodes() {
            assert_eq!(node.context.missing_field(), None, "layer {}", node.name);
        }
        assert_eq!(graph.bound_weight_bytes(), blob.size_bytes());
    }

    #[test]
    fn test_regions_cover_nodes_and_weights() {
        let arena = arena();
        let shaped = LayerGraph::build(&lenet(), mnist(), &arena).unwrap();
        let blob = WeightBlob::zeroed(&shaped.weight_requirements().unwrap());
        let graph = shaped.assign(&blob, &QuantDefaults::default()).unwrap();
        let regions = graph.regions();
        // node array + 8 names + 8 contexts + 4 weighted layers * 2 tensors
        assert_eq!(regions.len(), 1 + 8 + 8 + 8);
        assert!(regions.contains(&RegionSpan::of(graph.nodes())));
        assert!(regions.contains(&RegionSpan::of(blob.conv()[1].weights.as_slice())));
        assert!(regions.iter().all(|r| r.len > 0));
    }

    #[test]
    fn test_describe_is_deterministic() {
        let describe = || {
            let arena = arena();
            let shaped = LayerGraph::build(&lenet(), mnist(), &arena).unwrap();
            let blob = WeightBlob::zeroed(&shaped.weight_requirements().unwrap());
            let graph = shaped.assign(&blob, &QuantDefaults::default()).unwrap();
            serde_json::to_string(&graph.describe()).unwrap()
        };
        assert_eq!(describe(), describe());
    }

    #[test]
    fn test_describe_pooling_fast_path() {
        let graph = LayerGraph::build(&lenet(), mnist(), &arena()).unwrap();
        let desc = graph.describe();
        assert_eq!(desc[1].fast_path_eligible, Some(true));
        assert_eq!(desc[0].fast_path_eligible, None);
        assert_eq!(desc[0].exec, None);
    }

    #[test]
    fn test_summary_and_display() {
        let graph = LayerGraph::build(&lenet(), mnist(), &arena()).unwrap();
        let s = graph.summary();
        assert!(s.contains("lenet"));
        assert!(s.contains("8 layers"));
        assert!(s.contains("2 conv"));
        let display = format!("{graph}");
        assert!(display.contains("conv1"));
        assert!(display.contains("prob"));
        assert_eq!(graph.output(), MapShape::flat(10));
    }
}
