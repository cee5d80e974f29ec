// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dspnet inspect` command: build the graph and print it.
//!
//! Runs both construction passes on the current thread against zero-filled
//! weights sized from the shaped graph, then prints each layer's shapes,
//! geometry and assigned modes.

use super::{format_bytes, load_table};
use layer_graph::{ContextInfo, LayerGraph, NodeDescriptor, WeightBlob};
use runtime::RuntimeConfig;
use std::path::PathBuf;

pub fn execute(config: &RuntimeConfig, model: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let table = load_table(config, model)?;
    let arena = config.create_arena()?;

    let shaped = LayerGraph::build(&table, config.input, &arena)?;
    let requirements = shaped.weight_requirements()?;
    let weights = WeightBlob::zeroed(&requirements);
    let graph = shaped.assign(&weights, &config.quantization)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&graph.describe())?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              dspnet · Graph Inspector               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    // ── Summary ────────────────────────────────────────────────
    println!("  {}", graph.summary());
    println!("  Weights: {}", format_bytes(requirements.total_bytes()));
    println!("  Contexts: {}", arena.stats().summary());
    println!();

    // ── Per-Layer Detail ───────────────────────────────────────
    println!(
        "  {:<4} {:<14} {:<13} {:>12} {:>12}  {}",
        "Idx", "Name", "Kind", "Input", "Output", "Detail",
    );
    println!("  {}", "-".repeat(86));
    for node in graph.describe() {
        println!(
            "  {:<4} {:<14} {:<13} {:>12} {:>12}  {}",
            node.index,
            truncate(&node.name, 14),
            node.kind.as_str(),
            node.input.to_string(),
            node.output.to_string(),
            detail(&node),
        );
    }
    println!();
    Ok(())
}

fn detail(node: &NodeDescriptor) -> String {
    let mut parts = match node.info {
        ContextInfo::Convolution(c) => vec![format!(
            "k{} s{} p{} {}->{} maps",
            c.kernel, c.stride, c.pad, c.in_maps, c.out_maps
        )],
        ContextInfo::Pooling(p) => vec![format!(
            "{:?} {}x{} s{} p{}",
            p.operator, p.window, p.window, p.stride, p.pad
        )],
        ContextInfo::Activation(a) => vec![format!("{:?}", a.function)],
        ContextInfo::InnerProduct(ip) => vec![format!("{} -> {}", ip.inputs, ip.outputs)],
        ContextInfo::Softmax { inputs } => vec![format!("{inputs} inputs")],
    };
    if let Some(exec) = node.exec {
        parts.push(format!("{:?}/{:?}", exec.opt, exec.arith));
    }
    if let Some(f) = node.fraction {
        parts.push(format!("Q{}/Q{}", f.kernel, f.map));
    }
    if let Some(k) = node.weight_ordinal {
        parts.push(format!("w#{k}"));
    }
    if node.fast_path_eligible == Some(true) {
        parts.push("2x2 fast path eligible".to_string());
    }
    parts.join(", ")
}

/// Truncates a string to `max_len` with ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}
