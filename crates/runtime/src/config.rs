// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! model_table = "./models/lenet.json"
//! context_budget = "64K"
//!
//! [input]
//! maps = 1
//! width = 28
//! height = 28
//!
//! [topology]
//! num_cores = 8
//! master_core = 0
//! ready_channel = 2
//! gate_channel = 3
//!
//! [quantization]
//! kernel_fraction_bits = 11
//! map_fraction_bits = 15
//! ```
//!
//! Every key is optional; omitted keys take their defaults.

use crate::RuntimeError;
use context_arena::{ArenaBudget, ContextArena};
use layer_graph::QuantDefaults;
use multicore_sync::CoreTopology;
use net_model::InputDims;
use std::path::{Path, PathBuf};

/// Configuration for graph construction and publication.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Path to the JSON model table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_table: Option<PathBuf>,
    /// Budget of the context arena (human-readable, e.g. `"64K"`).
    pub context_budget: String,
    /// Input image dimensions fed to layer 0.
    pub input: InputDims,
    /// Cores and semaphore channel assignment.
    pub topology: CoreTopology,
    /// Default quantization attributes.
    pub quantization: QuantDefaults,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model_table: None,
            context_budget: "64K".to_string(),
            input: InputDims::default(),
            topology: CoreTopology::default(),
            quantization: QuantDefaults::default(),
        }
    }
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Parses the context budget string into an [`ArenaBudget`].
    pub fn parse_budget(&self) -> Result<ArenaBudget, RuntimeError> {
        Ok(ArenaBudget::parse(&self.context_budget)?)
    }

    /// Creates an empty context arena with the configured budget.
    pub fn create_arena(&self) -> Result<ContextArena, RuntimeError> {
        Ok(ContextArena::new(self.parse_budget()?))
    }

    /// Checks the topology and the budget.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.topology.validate()?;
        self.parse_budget()?;
        Ok(())
    }
}
