// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The model weight blob.
//!
//! [`WeightBlob`] exclusively owns every weight and bias value. It holds two
//! ordered collections: one entry per convolution layer and one per inner
//! product layer, each in the order those layers occur in the graph. Layer
//! contexts only borrow from it (see [`WeightBinding`](crate::WeightBinding)).

use crate::ShapeError;
use net_model::LayerKind;

/// Weight and bias values of one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamPair {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl ParamPair {
    pub fn new(weights: Vec<f32>, bias: Vec<f32>) -> Self {
        Self { weights, bias }
    }

    /// A zero-filled pair of the given lengths.
    pub fn zeroed(lens: TensorLens) -> Self {
        Self {
            weights: vec![0.0; lens.weights],
            bias: vec![0.0; lens.bias],
        }
    }

    pub fn size_bytes(&self) -> usize {
        (self.weights.len() + self.bias.len()) * std::mem::size_of::<f32>()
    }
}

/// Expected weight and bias lengths of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TensorLens {
    pub weights: usize,
    pub bias: usize,
}

impl TensorLens {
    /// Lengths whose combined `f32` storage size is representable.
    pub fn checked(weights: usize, bias: usize) -> Result<Self, ShapeError> {
        weights
            .checked_add(bias)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or(ShapeError::Overflow)?;
        Ok(Self { weights, bias })
    }
}

/// Per-kind expected tensor lengths, in occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WeightRequirements {
    pub conv: Vec<TensorLens>,
    pub inner_product: Vec<TensorLens>,
}

impl WeightRequirements {
    /// Total bytes of all weight and bias tensors.
    pub fn total_bytes(&self) -> usize {
        self.conv
            .iter()
            .chain(&self.inner_product)
            .map(|l| {
                l.weights
                    .saturating_add(l.bias)
                    .saturating_mul(std::mem::size_of::<f32>())
            })
            .fold(0usize, usize::saturating_add)
    }
}

/// Owner of all weight and bias tensors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightBlob {
    conv: Vec<ParamPair>,
    inner_product: Vec<ParamPair>,
}

impl WeightBlob {
    /// Creates a blob from the two occurrence-ordered collections.
    pub fn new(conv: Vec<ParamPair>, inner_product: Vec<ParamPair>) -> Self {
        Self {
            conv,
            inner_product,
        }
    }

    /// Creates zero-filled storage matching `req`.
    pub fn zeroed(req: &WeightRequirements) -> Self {
        Self {
            conv: req.conv.iter().copied().map(ParamPair::zeroed).collect(),
            inner_product: req
                .inner_product
                .iter()
                .copied()
                .map(ParamPair::zeroed)
                .collect(),
        }
    }

    pub fn conv(&self) -> &[ParamPair] {
        &self.conv
    }

    pub fn inner_product(&self) -> &[ParamPair] {
        &self.inner_product
    }

    /// The collection for a weighted kind; empty for other kinds.
    pub fn entries(&self, kind: LayerKind) -> &[ParamPair] {
        match kind {
            LayerKind::Convolution => &self.conv,
            LayerKind::InnerProduct => &self.inner_product,
            LayerKind::Pooling | LayerKind::Activation | LayerKind::Softmax => &[],
        }
    }

    /// Number of entries supplied for `kind`.
    pub fn count(&self, kind: LayerKind) -> usize {
        self.entries(kind).len()
    }

    /// The `ordinal`-th entry of `kind`, if supplied.
    pub fn pair(&self, kind: LayerKind, ordinal: usize) -> Option<&ParamPair> {
        self.entries(kind).get(ordinal)
    }

    /// Total bytes held.
    pub fn size_bytes(&self) -> usize {
        self.conv
            .iter()
            .chain(&self.inner_product)
            .map(ParamPair::size_bytes)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> WeightRequirements {
        WeightRequirements {
            conv: vec![TensorLens {
                weights: 500,
                bias: 20,
            }],
            inner_product: vec![
                TensorLens {
                    weights: 40,
                    bias: 4,
                },
                TensorLens {
                    weights: 8,
                    bias: 2,
                },
            ],
        }
    }

    #[test]
    fn test_zeroed_matches_requirements() {
        let blob = WeightBlob::zeroed(&req());
        assert_eq!(blob.count(LayerKind::Convolution), 1);
        assert_eq!(blob.count(LayerKind::InnerProduct), 2);
        assert_eq!(blob.conv()[0].weights.len(), 500);
        assert_eq!(blob.inner_product()[1].bias.len(), 2);
        assert_eq!(blob.size_bytes(), req().total_bytes());
    }

    #[test]
    fn test_pair_lookup() {
        let blob = WeightBlob::new(
            vec![ParamPair::new(vec![1.0], vec![2.0])],
            vec![ParamPair::new(vec![3.0], vec![4.0])],
        );
        assert_eq!(blob.pair(LayerKind::Convolution, 0).unwrap().weights, vec![1.0]);
        assert_eq!(blob.pair(LayerKind::InnerProduct, 0).unwrap().bias, vec![4.0]);
        assert!(blob.pair(LayerKind::Convolution, 1).is_none());
        assert!(blob.pair(LayerKind::Pooling, 0).is_none());
        assert_eq!(blob.count(LayerKind::Softmax), 0);
    }

    #[test]
    fn test_total_bytes() {
        assert_eq!(req().total_bytes(), (520 + 44 + 10) * 4);
    }

    #[test]
    fn test_checked_lens() {
        assert_eq!(
            TensorLens::checked(500, 20),
            Ok(TensorLens {
                weights: 500,
                bias: 20
            })
        );
        assert_eq!(TensorLens::checked(usize::MAX, 1), Err(ShapeError::Overflow));
        assert_eq!(TensorLens::checked(usize::MAX / 4, 1), Err(ShapeError::Overflow));
    }
}
