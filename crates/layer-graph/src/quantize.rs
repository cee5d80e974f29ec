// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Second pass: quantization modes and weight binding.
//!
//! The pass starts with an explicit census of the shaped graph: every layer
//! kind is counted and each convolution and inner product node receives its
//! occurrence ordinal. The k-th convolution binds conv entry k of the
//! [`WeightBlob`], the k-th inner product binds inner product entry k.
//!
//! No decision here depends on the shapes. Fraction widths come from
//! [`QuantDefaults`]; per-layer calibration would replace that lookup.

use crate::context::{
    ArithMode, BlockInfo, ExecProfile, FractionBits, LayerContext, MapLayout, OptPath,
    WeightBinding,
};
use crate::graph::LayerNode;
use crate::weights::{ParamPair, TensorLens, WeightBlob};
use crate::{GraphError, ShapeError};
use net_model::LayerKind;

/// Default quantization attributes, read from the `[quantization]` table.
///
/// # TOML Format
/// ```toml
/// kernel_fraction_bits = 11
/// map_fraction_bits = 15
/// arith = "floating_point"
/// opt = "scalar"
/// layout = "isolated"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct QuantDefaults {
    /// Fraction bits of convolution and inner product weights.
    pub kernel_fraction_bits: u8,
    /// Fraction bits of feature maps.
    pub map_fraction_bits: u8,
    pub arith: ArithMode,
    /// Kernel path for convolution, inner product, activation and softmax.
    /// Pooling always runs the scalar path.
    pub opt: OptPath,
    pub layout: MapLayout,
}

impl Default for QuantDefaults {
    fn default() -> Self {
        Self {
            kernel_fraction_bits: 11,
            map_fraction_bits: 15,
            arith: ArithMode::FloatingPoint,
            opt: OptPath::Scalar,
            layout: MapLayout::Isolated,
        }
    }
}

impl QuantDefaults {
    pub fn fraction(&self) -> FractionBits {
        FractionBits {
            kernel: self.kernel_fraction_bits,
            map: self.map_fraction_bits,
        }
    }

    pub fn exec(&self) -> ExecProfile {
        ExecProfile {
            opt: self.opt,
            arith: self.arith,
        }
    }
}

/// Per-kind layer counts and the occurrence ordinal of each weighted node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindCensus {
    counts: [usize; LayerKind::ALL.len()],
    ordinals: Vec<Option<usize>>,
}

impl KindCensus {
    /// Counts the kinds of `nodes` in execution order.
    pub fn of(nodes: &[LayerNode<'_>]) -> Self {
        let mut census = Self {
            counts: [0; LayerKind::ALL.len()],
            ordinals: Vec::with_capacity(nodes.len()),
        };
        for node in nodes {
            let kind = node.kind();
            let seen = &mut census.counts[slot(kind)];
            let ordinal = kind.has_weights().then_some(*seen);
            *seen += 1;
            census.ordinals.push(ordinal);
        }
        census
    }

    /// Number of layers of `kind`.
    pub fn count(&self, kind: LayerKind) -> usize {
        self.counts[slot(kind)]
    }

    /// Occurrence ordinal of the node at `index`, for weighted kinds.
    pub fn ordinal(&self, index: usize) -> Option<usize> {
        self.ordinals.get(index).copied().flatten()
    }
}

fn slot(kind: LayerKind) -> usize {
    match kind {
        LayerKind::Convolution => 0,
        LayerKind::Pooling => 1,
        LayerKind::Activation => 2,
        LayerKind::InnerProduct => 3,
        LayerKind::Softmax => 4,
    }
}

/// Fills the second-pass fields of every context in a shaped graph.
#[derive(Debug, Clone, Copy)]
pub struct QuantizationModeAssigner<'d> {
    defaults: &'d QuantDefaults,
}

impl<'d> QuantizationModeAssigner<'d> {
    pub fn new(defaults: &'d QuantDefaults) -> Self {
        Self { defaults }
    }

    /// Assigns modes and binds weights for all `nodes`.
    ///
    /// Fails with [`GraphError::WeightCountMismatch`] if `weights` does not
    /// hold exactly one entry per weighted layer, and with
    /// [`GraphError::WeightShapeMismatch`] if a bound tensor has the wrong
    /// length for its layer.
    pub fn assign<'w>(
        &self,
        nodes: &mut [LayerNode<'w>],
        weights: &'w WeightBlob,
    ) -> Result<KindCensus, GraphError> {
        let census = KindCensus::of(nodes);
        let fraction = self.defaults.fraction();
        let exec = self.defaults.exec();
        let scalar = ExecProfile {
            opt: OptPath::Scalar,
            ..exec
        };

        for node in nodes.iter_mut() {
            let kind = node.kind();
            let ordinal = census.ordinal(node.index);
            match &mut node.context {
                LayerContext::Convolution(c) => {
                    c.fraction = Some(fraction);
                    c.exec = Some(exec);
                    c.layout = Some(self.defaults.layout);
                    c.block = Some(BlockInfo {
                        blk_h: c.info.map_h,
                        blk_w: c.info.map_w,
                        opt_maps: c.info.out_maps,
                    });
                    let pair = entry(&census, weights, kind, ordinal)?;
                    let lens = c
                        .info
                        .tensor_lens()
                        .map_err(shape_error(node.index, &node.name))?;
                    c.binding = Some(bind(
                        node.index,
                        &node.name,
                        pair,
                        ordinal.unwrap_or_default(),
                        lens,
                    )?);
                }
                LayerContext::Pooling(p) => {
                    if p.info.fast_path_eligible() {
                        tracing::debug!(
                            "layer {} ('{}'): 2x2/2 pooling fast path eligible, using scalar path",
                            node.index,
                            node.name
                        );
                    }
                    p.exec = Some(scalar);
                    p.layout = Some(self.defaults.layout);
                }
                LayerContext::Activation(a) => a.exec = Some(exec),
                LayerContext::InnerProduct(ip) => {
                    ip.fraction = Some(fraction);
                    ip.exec = Some(exec);
                    let pair = entry(&census, weights, kind, ordinal)?;
                    let lens = ip
                        .info
                        .tensor_lens()
                        .map_err(shape_error(node.index, &node.name))?;
                    ip.binding = Some(bind(
                        node.index,
                        &node.name,
                        pair,
                        ordinal.unwrap_or_default(),
                        lens,
                    )?);
                }
                LayerContext::Softmax(s) => s.exec = Some(exec),
            }
        }

        for kind in [LayerKind::Convolution, LayerKind::InnerProduct] {
            check_count(&census, weights, kind)?;
        }

        tracing::info!(
            "quantization pass: {} conv, {} pool, {} act, {} ip, {} softmax; fraction bits {}/{}",
            census.count(LayerKind::Convolution),
            census.count(LayerKind::Pooling),
            census.count(LayerKind::Activation),
            census.count(LayerKind::InnerProduct),
            census.count(LayerKind::Softmax),
            fraction.kernel,
            fraction.map,
        );
        Ok(census)
    }
}

fn check_count(census: &KindCensus, weights: &WeightBlob, kind: LayerKind) -> Result<(), GraphError> {
    let expected = census.count(kind);
    let supplied = weights.count(kind);
    if expected != supplied {
        return Err(GraphError::WeightCountMismatch {
            kind,
            expected,
            supplied,
        });
    }
    Ok(())
}

fn entry<'w>(
    census: &KindCensus,
    weights: &'w WeightBlob,
    kind: LayerKind,
    ordinal: Option<usize>,
) -> Result<&'w ParamPair, GraphError> {
    ordinal
        .and_then(|k| weights.pair(kind, k))
        .ok_or(GraphError::WeightCountMismatch {
            kind,
            expected: census.count(kind),
            supplied: weights.count(kind),
        })
}

fn shape_error(index: usize, layer: &str) -> impl Fn(ShapeError) -> GraphError + '_ {
    move |source| GraphError::Shape {
        index,
        layer: layer.to_string(),
        source,
    }
}

fn bind<'w>(
    index: usize,
    layer: &str,
    pair: &'w ParamPair,
    ordinal: usize,
    lens: TensorLens,
) -> Result<WeightBinding<'w>, GraphError> {
    for (tensor, expected, found) in [
        ("weight", lens.weights, pair.weights.len()),
        ("bias", lens.bias, pair.bias.len()),
    ] {
        if expected != found {
            return Err(GraphError::WeightShapeMismatch {
                index,
                layer: layer.to_string(),
                tensor,
                expected,
                found,
            });
        }
    }
    Ok(WeightBinding {
        ordinal,
        weights: &pair.weights,
        bias: &pair.bias,
    })
}
