// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer kinds and their typed static parameters.
//!
//! A [`LayerParams`] value is what the graph builder works with: the kind is
//! implied by the variant, and every field the kind needs is present. It is
//! produced from a raw [`crate::LayerRecord`] by
//! [`LayerRecord::params`](crate::LayerRecord::params).

use std::fmt;

/// The kind of computation a layer performs.
///
/// The set is closed; the graph builder matches on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// 2-D convolution over all input maps.
    Convolution,
    /// Spatial pooling applied per map.
    Pooling,
    /// Element-wise non-linearity.
    Activation,
    /// Fully connected layer over the flattened input.
    InnerProduct,
    /// Normalised exponential over the flattened input. Always the last layer.
    Softmax,
}

impl LayerKind {
    /// All kinds, in declaration order.
    pub const ALL: [LayerKind; 5] = [
        Self::Convolution,
        Self::Pooling,
        Self::Activation,
        Self::InnerProduct,
        Self::Softmax,
    ];

    /// Parses a layer kind from a table tag.
    ///
    /// Accepts snake_case names and the short Caffe-style aliases
    /// (`"conv"`, `"pool"`, `"relu"`, `"ip"`, `"fc"`, `"smax"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "convolution" | "conv" => Some(Self::Convolution),
            "pooling" | "pool" => Some(Self::Pooling),
            "activation" | "act" | "relu" => Some(Self::Activation),
            "inner_product" | "innerproduct" | "ip" | "fc" | "inner_prod" => {
                Some(Self::InnerProduct)
            }
            "softmax" | "smax" => Some(Self::Softmax),
            _ => None,
        }
    }

    /// Returns a human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Convolution => "convolution",
            Self::Pooling => "pooling",
            Self::Activation => "activation",
            Self::InnerProduct => "inner_product",
            Self::Softmax => "softmax",
        }
    }

    /// Returns `true` for kinds that bind a weight/bias pair.
    pub fn has_weights(&self) -> bool {
        matches!(self, Self::Convolution | Self::InnerProduct)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pooling operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolOperator {
    #[default]
    #[serde(alias = "MAX")]
    Max,
    #[serde(alias = "avg", alias = "AVE", alias = "ave")]
    Average,
}

/// Activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationFunction {
    #[default]
    #[serde(alias = "RELU")]
    Relu,
    Sigmoid,
    Tanh,
}

/// Static parameters of a convolution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ConvParams {
    /// Square kernel size.
    pub kernel: usize,
    pub stride: usize,
    pub pad: usize,
    /// Number of output maps.
    pub output_maps: usize,
}

/// Static parameters of a pooling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolParams {
    /// Square window size.
    pub window: usize,
    pub stride: usize,
    pub pad: usize,
    pub operator: PoolOperator,
}

/// Static parameters of an activation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ActParams {
    pub function: ActivationFunction,
}

/// Static parameters of an inner-product layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct IpParams {
    /// Number of output features.
    pub outputs: usize,
}

/// Typed static parameters of one layer; the variant is the layer's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerParams {
    Convolution(ConvParams),
    Pooling(PoolParams),
    Activation(ActParams),
    InnerProduct(IpParams),
    Softmax,
}

impl LayerParams {
    /// Returns the layer kind these parameters belong to.
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Convolution(_) => LayerKind::Convolution,
            Self::Pooling(_) => LayerKind::Pooling,
            Self::Activation(_) => LayerKind::Activation,
            Self::InnerProduct(_) => LayerKind::InnerProduct,
            Self::Softmax => LayerKind::Softmax,
        }
    }
}
