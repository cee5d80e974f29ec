// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dspnet simulate` command: run the cross-core handshake on threads.
//!
//! One thread per core. The master constructs and publishes the graph;
//! every worker attaches and reports what it sees. With `--trace` the cache
//! maintenance operations are recorded and summarised.

use super::{format_bytes, load_table};
use layer_graph::{LayerGraph, WeightBlob};
use multicore_sync::{CacheLog, CacheMaintenance, HostCoherent};
use runtime::{RuntimeConfig, RuntimeError, SharedRegion};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// What one core observed.
enum Outcome {
    Published { layers: usize, elapsed_us: u128 },
    Attached { layers: usize, elapsed_us: u128 },
    Failed(RuntimeError),
}

pub fn execute(
    mut config: RuntimeConfig,
    model: Option<PathBuf>,
    cores: Option<u32>,
    trace: bool,
) -> anyhow::Result<()> {
    if let Some(n) = cores {
        config.topology.num_cores = n;
        config.validate()?;
    }
    let table = load_table(&config, model)?;

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            dspnet · Multicore Simulation            ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!(
        "  Model '{}': {} layers, {} cores, master {}",
        table.name,
        table.num_layers,
        config.topology.num_cores,
        config.topology.master_core
    );

    // Weights are sized from a dry shape pass in a scratch arena. If that
    // pass fails the master will fail the same way and abort the barrier.
    let scratch = config.create_arena()?;
    let requirements =
        LayerGraph::build(&table, config.input, &scratch).and_then(|g| g.weight_requirements());
    let weights = match requirements {
        Ok(req) => WeightBlob::zeroed(&req),
        Err(e) => {
            tracing::warn!("shape pass failed: {e}");
            WeightBlob::default()
        }
    };
    println!("  Weights: {} (zero-filled)", format_bytes(weights.size_bytes()));
    println!();

    let log = Arc::new(CacheLog::new());
    let cache: Arc<dyn CacheMaintenance> = if trace {
        log.clone()
    } else {
        Arc::new(HostCoherent)
    };

    let arena = config.create_arena()?;
    let region = SharedRegion::from_config(&config, cache)?;
    let master = config.topology.master_core;

    let outcomes: Vec<(u32, Outcome)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..config.topology.num_cores)
            .map(|core| {
                let (region, table, weights, arena, config) =
                    (&region, &table, &weights, &arena, &config);
                s.spawn(move || {
                    let start = Instant::now();
                    let outcome = if core == master {
                        region
                            .construct(
                                core,
                                table,
                                config.input,
                                weights,
                                arena,
                                &config.quantization,
                            )
                            .map(|g| Outcome::Published {
                                layers: g.len(),
                                elapsed_us: start.elapsed().as_micros(),
                            })
                    } else {
                        region.attach(core).map(|g| Outcome::Attached {
                            layers: g.len(),
                            elapsed_us: start.elapsed().as_micros(),
                        })
                    };
                    (core, outcome.unwrap_or_else(Outcome::Failed))
                })
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .collect()
    });

    // ── Per-Core Results ───────────────────────────────────────
    let mut failures = 0;
    for (core, outcome) in &outcomes {
        match outcome {
            Outcome::Published { layers, elapsed_us } => {
                println!("  core {core:>2}  master  published {layers} layers in {elapsed_us} µs")
            }
            Outcome::Attached { layers, elapsed_us } => {
                println!("  core {core:>2}  worker  attached to {layers} layers after {elapsed_us} µs")
            }
            Outcome::Failed(e) => {
                failures += 1;
                println!("  core {core:>2}  FAILED  {e}");
            }
        }
    }
    println!();
    println!("  Contexts: {}", arena.stats().summary());

    if trace {
        let written = log.write_backs();
        let invalidated = log.invalidations();
        let bytes: usize = written.iter().map(|s| s.len).sum();
        println!(
            "  Cache: {} write-backs ({}), {} invalidations",
            written.len(),
            format_bytes(bytes),
            invalidated.len()
        );
    }
    println!();

    if outcomes.len() != config.topology.num_cores as usize {
        anyhow::bail!("a core thread panicked");
    }
    if failures > 0 {
        anyhow::bail!("{failures} of {} cores failed", outcomes.len());
    }
    Ok(())
}
