// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-kind layer context blocks.
//!
//! A context carries everything a compute kernel needs to run one layer.
//! Geometry (`*Info`) is filled by the allocator in the first pass; the
//! execution attributes, fraction widths and weight bindings are `Option`s
//! filled by the quantization pass. A context with any `None` left is
//! rejected before the graph can be published.

use crate::{ShapeError, TensorLens};
use multicore_sync::RegionSpan;
use net_model::{ActivationFunction, LayerKind, PoolOperator};

/// Arithmetic used by a layer's kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithMode {
    #[default]
    FloatingPoint,
    FixedPoint,
}

/// Kernel implementation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptPath {
    /// Reference implementation.
    #[default]
    Scalar,
    /// SIMD implementation.
    Vectorized,
}

/// Memory layout of feature maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapLayout {
    /// Each map is stored contiguously.
    #[default]
    Isolated,
    /// Maps are interleaved value by value.
    Interleaved,
}

/// Kernel selection for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ExecProfile {
    pub opt: OptPath,
    pub arith: ArithMode,
}

/// Fixed-point fraction widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FractionBits {
    /// Fraction bits of kernel weights.
    pub kernel: u8,
    /// Fraction bits of feature maps.
    pub map: u8,
}

/// Tiling hint for blocked convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BlockInfo {
    pub blk_h: usize,
    pub blk_w: usize,
    /// Output maps computed per tile.
    pub opt_maps: usize,
}

/// Non-owning view of one layer's weights and biases.
///
/// The slices borrow the [`WeightBlob`](crate::WeightBlob); their lengths
/// are checked against the layer geometry when bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBinding<'w> {
    /// Position among layers of the same kind.
    pub ordinal: usize,
    pub weights: &'w [f32],
    pub bias: &'w [f32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ConvInfo {
    pub map_h: usize,
    pub map_w: usize,
    pub in_maps: usize,
    pub out_maps: usize,
    pub kernel: usize,
    pub stride: usize,
    pub pad: usize,
}

impl ConvInfo {
    /// Number of kernel weights, `out_maps * in_maps * kernel²`.
    pub fn weight_len(&self) -> Result<usize, ShapeError> {
        [self.in_maps, self.kernel, self.kernel]
            .into_iter()
            .try_fold(self.out_maps, usize::checked_mul)
            .ok_or(ShapeError::Overflow)
    }

    pub fn bias_len(&self) -> usize {
        self.out_maps
    }

    pub fn tensor_lens(&self) -> Result<TensorLens, ShapeError> {
        TensorLens::checked(self.weight_len()?, self.bias_len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvContext<'w> {
    pub info: ConvInfo,
    pub fraction: Option<FractionBits>,
    pub exec: Option<ExecProfile>,
    pub layout: Option<MapLayout>,
    pub block: Option<BlockInfo>,
    pub binding: Option<WeightBinding<'w>>,
}

impl ConvContext<'_> {
    pub fn new(info: ConvInfo) -> Self {
        Self {
            info,
            fraction: None,
            exec: None,
            layout: None,
            block: None,
            binding: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolInfo {
    pub map_h: usize,
    pub map_w: usize,
    pub maps: usize,
    pub window: usize,
    pub stride: usize,
    pub pad: usize,
    pub operator: PoolOperator,
}

impl PoolInfo {
    /// `true` for the 2×2, stride-2 shape a vectorised kernel can handle.
    pub fn fast_path_eligible(&self) -> bool {
        self.window == 2 && self.stride == 2
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolContext {
    pub info: PoolInfo,
    pub exec: Option<ExecProfile>,
    pub layout: Option<MapLayout>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ActInfo {
    pub maps: usize,
    pub map_h: usize,
    pub map_w: usize,
    pub function: ActivationFunction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActContext {
    pub info: ActInfo,
    pub exec: Option<ExecProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IpInfo {
    /// Flattened input feature count.
    pub inputs: usize,
    pub outputs: usize,
}

impl IpInfo {
    pub fn weight_len(&self) -> Result<usize, ShapeError> {
        self.outputs
            .checked_mul(self.inputs)
            .ok_or(ShapeError::Overflow)
    }

    pub fn bias_len(&self) -> usize {
        self.outputs
    }

    pub fn tensor_lens(&self) -> Result<TensorLens, ShapeError> {
        TensorLens::checked(self.weight_len()?, self.bias_len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IpContext<'w> {
    pub info: IpInfo,
    pub fraction: Option<FractionBits>,
    pub exec: Option<ExecProfile>,
    pub binding: Option<WeightBinding<'w>>,
}

impl IpContext<'_> {
    pub fn new(info: IpInfo) -> Self {
        Self {
            info,
            fraction: None,
            exec: None,
            binding: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxContext {
    /// Flattened input feature count.
    pub inputs: usize,
    pub exec: Option<ExecProfile>,
}

/// Geometry of a context, tagged by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextInfo {
    Convolution(ConvInfo),
    Pooling(PoolInfo),
    Activation(ActInfo),
    InnerProduct(IpInfo),
    Softmax { inputs: usize },
}

/// An owned context block; the variant is the layer kind.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerContext<'w> {
    Convolution(Box<ConvContext<'w>>),
    Pooling(Box<PoolContext>),
    Activation(Box<ActContext>),
    InnerProduct(Box<IpContext<'w>>),
    Softmax(Box<SoftmaxContext>),
}

impl<'w> LayerContext<'w> {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Convolution(_) => LayerKind::Convolution,
            Self::Pooling(_) => LayerKind::Pooling,
            Self::Activation(_) => LayerKind::Activation,
            Self::InnerProduct(_) => LayerKind::InnerProduct,
            Self::Softmax(_) => LayerKind::Softmax,
        }
    }

    pub fn info(&self) -> ContextInfo {
        match self {
            Self::Convolution(c) => ContextInfo::Convolution(c.info),
            Self::Pooling(p) => ContextInfo::Pooling(p.info),
            Self::Activation(a) => ContextInfo::Activation(a.info),
            Self::InnerProduct(ip) => ContextInfo::InnerProduct(ip.info),
            Self::Softmax(s) => ContextInfo::Softmax { inputs: s.inputs },
        }
    }

    pub fn exec(&self) -> Option<ExecProfile> {
        match self {
            Self::Convolution(c) => c.exec,
            Self::Pooling(p) => p.exec,
            Self::Activation(a) => a.exec,
            Self::InnerProduct(ip) => ip.exec,
            Self::Softmax(s) => s.exec,
        }
    }

    pub fn fraction(&self) -> Option<FractionBits> {
        match self {
            Self::Convolution(c) => c.fraction,
            Self::InnerProduct(ip) => ip.fraction,
            _ => None,
        }
    }

    pub fn layout(&self) -> Option<MapLayout> {
        match self {
            Self::Convolution(c) => c.layout,
            Self::Pooling(p) => p.layout,
            _ => None,
        }
    }

    pub fn binding(&self) -> Option<&WeightBinding<'w>> {
        match self {
            Self::Convolution(c) => c.binding.as_ref(),
            Self::InnerProduct(ip) => ip.binding.as_ref(),
            _ => None,
        }
    }

    /// Returns the first second-pass field still unset, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            Self::Convolution(c) => first_missing(&[
                ("fraction", c.fraction.is_some()),
                ("exec", c.exec.is_some()),
                ("layout", c.layout.is_some()),
                ("block", c.block.is_some()),
                ("binding", c.binding.is_some()),
            ]),
            Self::Pooling(p) => first_missing(&[
                ("exec", p.exec.is_some()),
                ("layout", p.layout.is_some()),
            ]),
            Self::Activation(a) => first_missing(&[("exec", a.exec.is_some())]),
            Self::InnerProduct(ip) => first_missing(&[
                ("fraction", ip.fraction.is_some()),
                ("exec", ip.exec.is_some()),
                ("binding", ip.binding.is_some()),
            ]),
            Self::Softmax(s) => first_missing(&[("exec", s.exec.is_some())]),
        }
    }

    /// The memory span of the context block itself.
    pub fn span(&self) -> RegionSpan {
        match self {
            Self::Convolution(c) => RegionSpan::of(c.as_ref()),
            Self::Pooling(p) => RegionSpan::of(p.as_ref()),
            Self::Activation(a) => RegionSpan::of(a.as_ref()),
            Self::InnerProduct(ip) => RegionSpan::of(ip.as_ref()),
            Self::Softmax(s) => RegionSpan::of(s.as_ref()),
        }
    }
}

fn first_missing(fields: &[(&'static str, bool)]) -> Option<&'static str> {
    fields
        .iter()
        .find(|(_, present)| !present)
        .map(|(name, _)| *name)
}
