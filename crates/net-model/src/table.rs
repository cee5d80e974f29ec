// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The model description table.
//!
//! # Format
//! ```json
//! {
//!   "name": "lenet",
//!   "num_layers": 4,
//!   "layers": [
//!     { "name": "conv1", "kind": "convolution", "kernel_size": 5, "stride": 1, "pad": 0, "output_maps": 20 },
//!     { "name": "pool1", "kind": "pooling", "pool_window": 2, "pool_stride": 2, "pool_operator": "max" },
//!     { "name": "ip1", "kind": "inner_product", "fc_outputs": 10 },
//!     { "name": "prob", "kind": "softmax" }
//!   ]
//! }
//! ```
//!
//! The table is trusted to describe a linear chain; it is still checked for
//! the declared layer count, recognised kinds and required parameters before
//! the graph builder runs.

use crate::{
    ActParams, ConvParams, IpParams, LayerKind, LayerParams, ModelError, PoolParams,
};
use std::collections::HashSet;
use std::path::Path;

/// Fixed input image dimensions, consumed only by layer 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputDims {
    /// Number of input maps (channels).
    pub maps: usize,
    pub width: usize,
    pub height: usize,
}

impl Default for InputDims {
    fn default() -> Self {
        Self {
            maps: 1,
            width: 28,
            height: 28,
        }
    }
}

/// One raw row of the model table.
///
/// Every parameter is optional at this level; [`LayerRecord::params`] reads
/// the ones belonging to `kind` and ignores the rest.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LayerRecord {
    /// Layer name, used in diagnostics only.
    #[serde(default)]
    pub name: String,
    /// Layer kind tag (see [`LayerKind::from_str_loose`]).
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pad: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_maps: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_window: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_stride: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_pad: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_operator: Option<crate::PoolOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fc_outputs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation: Option<crate::ActivationFunction>,
}

impl LayerRecord {
    /// Creates a record with only the kind tag set.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Parses the kind tag.
    ///
    /// Fails with [`ModelError::UnsupportedLayerKind`] for a tag outside the
    /// closed set. `index` is the record's position, used for diagnostics.
    pub fn layer_kind_at(&self, index: usize) -> Result<LayerKind, ModelError> {
        LayerKind::from_str_loose(&self.kind).ok_or_else(|| ModelError::UnsupportedLayerKind {
            index,
            layer: self.name.clone(),
            kind: self.kind.clone(),
        })
    }

    /// Converts the record into typed parameters for its kind.
    ///
    /// Pads default to 0, strides to 1, the pooling operator to max and the
    /// activation function to ReLU. Kernel size, output map count, pooling
    /// window and inner-product output count are required.
    pub fn params(&self, index: usize) -> Result<LayerParams, ModelError> {
        let kind = self.layer_kind_at(index)?;
        let params = match kind {
            LayerKind::Convolution => LayerParams::Convolution(ConvParams {
                kernel: self.require(index, "kernel_size", self.kernel_size)?,
                stride: self.stride.unwrap_or(1),
                pad: self.pad.unwrap_or(0),
                output_maps: self.require(index, "output_maps", self.output_maps)?,
            }),
            LayerKind::Pooling => LayerParams::Pooling(PoolParams {
                window: self.require(index, "pool_window", self.pool_window)?,
                stride: self.pool_stride.unwrap_or(1),
                pad: self.pool_pad.unwrap_or(0),
                operator: self.pool_operator.unwrap_or_default(),
            }),
            LayerKind::Activation => LayerParams::Activation(ActParams {
                function: self.activation.unwrap_or_default(),
            }),
            LayerKind::InnerProduct => LayerParams::InnerProduct(IpParams {
                outputs: self.require(index, "fc_outputs", self.fc_outputs)?,
            }),
            LayerKind::Softmax => LayerParams::Softmax,
        };
        Ok(params)
    }

    fn require(
        &self,
        index: usize,
        field: &'static str,
        value: Option<usize>,
    ) -> Result<usize, ModelError> {
        value.ok_or_else(|| ModelError::MissingParameter {
            index,
            layer: self.name.clone(),
            field,
        })
    }
}

/// The ordered per-layer table, deserialized from JSON.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelTable {
    /// Human-readable model name.
    pub name: String,
    /// Declared number of layers; the graph is built with exactly this length.
    pub num_layers: usize,
    /// Layer records in execution order.
    pub layers: Vec<LayerRecord>,
}

impl ModelTable {
    /// Creates a table whose declared count is the number of records.
    pub fn new(name: impl Into<String>, layers: Vec<LayerRecord>) -> Self {
        Self {
            name: name.into(),
            num_layers: layers.len(),
            layers,
        }
    }

    /// Loads a table from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a table from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let table: Self = serde_json::from_str(json)?;
        Ok(table)
    }

    /// Serialises the table to pretty JSON.
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the declared layer count against the records.
    pub fn check_length(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::EmptyTable);
        }
        if self.layers.len() != self.num_layers {
            return Err(ModelError::LayerCountMismatch {
                declared: self.num_layers,
                found: self.layers.len(),
            });
        }
        Ok(())
    }

    /// Validates that the table is internally consistent.
    ///
    /// Checks:
    /// - The table is non-empty and holds exactly `num_layers` records.
    /// - Every kind tag is recognised and every required parameter is present.
    /// - Softmax appears only as the last layer.
    /// - No duplicate non-empty layer names.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.check_length()?;

        let mut seen_names = HashSet::new();
        let last = self.layers.len() - 1;
        for (i, record) in self.layers.iter().enumerate() {
            if !record.name.is_empty() && !seen_names.insert(record.name.as_str()) {
                return Err(ModelError::InvalidLayer {
                    layer: record.name.clone(),
                    detail: "duplicate layer name".into(),
                });
            }

            let params = record.params(i)?;
            if params.kind() == LayerKind::Softmax && i != last {
                return Err(ModelError::InvalidLayer {
                    layer: record.name.clone(),
                    detail: format!("softmax at position {i} must be the final layer"),
                });
            }
        }

        Ok(())
    }

    /// Returns the number of records of the given kind.
    ///
    /// Records with an unrecognised kind tag are not counted.
    pub fn count_of(&self, kind: LayerKind) -> usize {
        self.layers
            .iter()
            .filter(|r| LayerKind::from_str_loose(&r.kind) == Some(kind))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActivationFunction, PoolOperator};

    fn lenet_json() -> &'static str {
        r#"{
            "name": "lenet",
            "num_layers": 8,
            "layers": [
                { "name": "conv1", "kind": "convolution", "kernel_size": 5, "stride": 1, "pad": 0, "output_maps": 20 },
                { "name": "pool1", "kind": "pooling", "pool_window": 2, "pool_stride": 2, "pool_operator": "max" },
                { "name": "conv2", "kind": "conv", "kernel_size": 5, "output_maps": 50 },
                { "name": "pool2", "kind": "pool", "pool_window": 2, "pool_stride": 2 },
                { "name": "ip1", "kind": "inner_product", "fc_outputs": 500 },
                { "name": "relu1", "kind": "relu" },
                { "name": "ip2", "kind": "ip", "fc_outputs": 10 },
                { "name": "prob", "kind": "softmax" }
            ]
        }"#
    }

    #[test]
    fn test_parse_table() {
        let t = ModelTable::from_json(lenet_json()).unwrap();
        assert_eq!(t.name, "lenet");
        assert_eq!(t.num_layers, 8);
        assert_eq!(t.layers.len(), 8);
        assert_eq!(t.layers[0].kernel_size, Some(5));
    }

    #[test]
    fn test_validate_ok() {
        let t = ModelTable::from_json(lenet_json()).unwrap();
        t.validate().unwrap();
    }

    #[test]
    fn test_count_of() {
        let t = ModelTable::from_json(lenet_json()).unwrap();
        assert_eq!(t.count_of(LayerKind::Convolution), 2);
        assert_eq!(t.count_of(LayerKind::InnerProduct), 2);
        assert_eq!(t.count_of(LayerKind::Softmax), 1);
    }

    #[test]
    fn test_params_defaults() {
        let r = LayerRecord {
            kernel_size: Some(3),
            output_maps: Some(16),
            ..LayerRecord::new("c", "conv")
        };
        let p = r.params(0).unwrap();
        assert_eq!(
            p,
            LayerParams::Convolution(ConvParams {
                kernel: 3,
                stride: 1,
                pad: 0,
                output_maps: 16,
            })
        );

        let pool = LayerRecord {
            pool_window: Some(3),
            ..LayerRecord::new("p", "pool")
        };
        match pool.params(1).unwrap() {
            LayerParams::Pooling(pp) => {
                assert_eq!(pp.stride, 1);
                assert_eq!(pp.operator, PoolOperator::Max);
            }
            other => panic!("unexpected params {other:?}"),
        }

        match LayerRecord::new("a", "act").params(2).unwrap() {
            LayerParams::Activation(a) => assert_eq!(a.function, ActivationFunction::Relu),
            other => panic!("unexpected params {other:?}"),
        }
    }

    #[test]
    fn test_missing_parameter() {
        let r = LayerRecord::new("ip", "fc");
        let err = r.params(4).unwrap_err();
        assert!(matches!(
            err,
            ModelError::MissingParameter { index: 4, field: "fc_outputs", .. }
        ));
    }

    #[test]
    fn test_unsupported_kind() {
        let r = LayerRecord::new("lrn1", "lrn");
        let err = r.params(3).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedLayerKind { index: 3, .. }));
        assert!(err.to_string().contains("lrn"));
    }

    #[test]
    fn test_unsupported_kind_reports_position() {
        let mut t = ModelTable::from_json(lenet_json()).unwrap();
        t.layers[5].kind = "lrn".into();
        assert!(matches!(
            t.validate(),
            Err(ModelError::UnsupportedLayerKind { index: 5, .. })
        ));
        assert_eq!(
            t.layers[2].layer_kind_at(2).unwrap(),
            LayerKind::Convolution
        );
    }

    #[test]
    fn test_validate_count_mismatch() {
        let mut t = ModelTable::from_json(lenet_json()).unwrap();
        t.num_layers = 9;
        assert!(matches!(
            t.validate(),
            Err(ModelError::LayerCountMismatch { declared: 9, found: 8 })
        ));
    }

    #[test]
    fn test_validate_empty() {
        let t = ModelTable::new("empty", vec![]);
        assert!(matches!(t.validate(), Err(ModelError::EmptyTable)));
    }

    #[test]
    fn test_validate_softmax_not_last() {
        let t = ModelTable::new(
            "bad",
            vec![
                LayerRecord::new("prob", "softmax"),
                LayerRecord::new("relu", "relu"),
            ],
        );
        assert!(matches!(t.validate(), Err(ModelError::InvalidLayer { .. })));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let t = ModelTable::new(
            "dup",
            vec![LayerRecord::new("a", "relu"), LayerRecord::new("a", "relu")],
        );
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let t = ModelTable::from_json(lenet_json()).unwrap();
        let json = t.to_json().unwrap();
        let back = ModelTable::from_json(&json).unwrap();
        assert_eq!(back.layers.len(), t.layers.len());
        assert_eq!(back.layers[1].pool_window, Some(2));
        assert!(!json.contains("fc_outputs\": null"));
    }
}
