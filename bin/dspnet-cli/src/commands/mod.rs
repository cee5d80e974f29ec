// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared helpers.

pub mod config;
pub mod inspect;
pub mod simulate;

use anyhow::Context;
use net_model::ModelTable;
use runtime::RuntimeConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let config = match path {
        Some(p) => RuntimeConfig::from_file(p)?,
        None => RuntimeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Loads the model table named on the command line or in the config.
pub fn load_table(config: &RuntimeConfig, model: Option<PathBuf>) -> anyhow::Result<ModelTable> {
    let path = model
        .or_else(|| config.model_table.clone())
        .context("no model table given: pass --model or set model_table in the config")?;
    let table = ModelTable::from_file(&path)
        .with_context(|| format!("failed to load model table '{}'", path.display()))?;
    Ok(table)
}

/// Formats a byte count for display.
pub fn format_bytes(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
