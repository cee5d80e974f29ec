// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dspnet
//!
//! Command-line interface for the DSP CNN layer-graph builder.
//!
//! ## Usage
//! ```bash
//! # Build the graph and print every layer's context
//! dspnet inspect --model ./models/lenet.json
//!
//! # Run the master/worker handshake on one thread per core
//! dspnet --config dspnet.toml simulate --model ./models/lenet.json --cores 8 --trace
//!
//! # Print the effective configuration as TOML
//! dspnet config
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dspnet",
    about = "Layer-graph construction for multicore DSP CNN inference",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the layer graph and print its shapes and contexts.
    Inspect {
        /// Path to the JSON model table (defaults to `model_table` in the config).
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Print node descriptors as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Construct on the master core and attach every worker, one thread per core.
    Simulate {
        /// Path to the JSON model table (defaults to `model_table` in the config).
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Number of cores (overrides the configured topology).
        #[arg(long)]
        cores: Option<u32>,

        /// Record and print cache write-back / invalidate operations.
        #[arg(long)]
        trace: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { model, json } => commands::inspect::execute(&config, model, json),
        Commands::Simulate {
            model,
            cores,
            trace,
        } => commands::simulate::execute(config, model, cores, trace),
        Commands::Config => commands::config::execute(&config),
    }
}
