// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: multicore construction and publication.
//!
//! These tests run the master and the workers on real threads, one per
//! simulated core, and check that every worker observes either the same
//! complete graph or the master's failure.

use context_arena::{ArenaBudget, ContextArena};
use layer_graph::{
    ArithMode, FractionBits, LayerGraph, MapShape, OptPath, ParamPair, QuantDefaults, WeightBlob,
};
use multicore_sync::{BarrierState, CacheLog, CacheOp, CoreTopology, HostCoherent, SemaphoreBank};
use net_model::{InputDims, LayerKind, ModelTable};
use runtime::{RuntimeConfig, RuntimeError, SharedRegion};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn lenet() -> ModelTable {
    ModelTable::from_json(
        r#"{
            "name": "lenet",
            "num_layers": 8,
            "layers": [
                { "name": "conv1", "kind": "convolution", "kernel_size": 5, "stride": 1, "pad": 0, "output_maps": 20 },
                { "name": "pool1", "kind": "pooling", "pool_window": 2, "pool_stride": 2, "pool_operator": "max" },
                { "name": "conv2", "kind": "convolution", "kernel_size": 5, "output_maps": 50 },
                { "name": "pool2", "kind": "pooling", "pool_window": 2, "pool_stride": 2 },
                { "name": "ip1", "kind": "inner_product", "fc_outputs": 500 },
                { "name": "relu1", "kind": "activation", "activation": "relu" },
                { "name": "ip2", "kind": "inner_product", "fc_outputs": 10 },
                { "name": "prob", "kind": "softmax" }
            ]
        }"#,
    )
    .unwrap()
}

fn mnist() -> InputDims {
    InputDims {
        maps: 1,
        width: 28,
        height: 28,
    }
}

fn arena() -> ContextArena {
    ContextArena::new(ArenaBudget::from_kb(64))
}

/// Weights whose first value encodes kind and ordinal.
fn tagged_weights(table: &ModelTable) -> WeightBlob {
    let sizing = arena();
    let req = LayerGraph::build(table, mnist(), &sizing)
        .unwrap()
        .weight_requirements()
        .unwrap();
    let tag = |lens, t: f32| {
        let mut pair = ParamPair::zeroed(lens);
        pair.weights[0] = t;
        pair
    };
    WeightBlob::new(
        req.conv
            .iter()
            .enumerate()
            .map(|(k, l)| tag(*l, 10.0 + k as f32))
            .collect(),
        req.inner_product
            .iter()
            .enumerate()
            .map(|(k, l)| tag(*l, 20.0 + k as f32))
            .collect(),
    )
}

fn topology(num_cores: u32) -> CoreTopology {
    CoreTopology {
        num_cores,
        ..Default::default()
    }
}

fn region<'w>(num_cores: u32, cache: Arc<dyn multicore_sync::CacheMaintenance>) -> SharedRegion<'w> {
    SharedRegion::new(topology(num_cores), Arc::new(SemaphoreBank::new(32)), cache).unwrap()
}

// ── Tests ──────────────────────────────────────────────────────

#[test]
fn test_workers_see_the_master_graph() {
    let table = lenet();
    let weights = tagged_weights(&table);
    let arena = arena();
    let region = region(4, Arc::new(HostCoherent));
    let defaults = QuantDefaults::default();

    let attached: Vec<usize> = std::thread::scope(|s| {
        let workers: Vec<_> = (1..4)
            .map(|core| {
                let region = &region;
                s.spawn(move || {
                    let graph = region.attach(core).unwrap();
                    graph as *const _ as usize
                })
            })
            .collect();

        let master = region
            .construct(0, &table, mnist(), &weights, &arena, &defaults)
            .unwrap();
        let master_addr = master as *const _ as usize;

        workers
            .into_iter()
            .map(|w| {
                let addr = w.join().unwrap();
                assert_eq!(addr, master_addr);
                addr
            })
            .collect()
    });

    assert_eq!(attached.len(), 3);
    assert_eq!(region.state(), BarrierState::Ready);
}

#[test]
fn test_every_context_complete_after_signal() {
    let table = lenet();
    let weights = tagged_weights(&table);
    let arena = arena();
    let region = region(2, Arc::new(HostCoherent));

    std::thread::scope(|s| {
        let worker = s.spawn(|| {
            let graph = region.attach(1).unwrap();
            for node in graph.nodes() {
                assert_eq!(node.context.missing_field(), None, "layer {}", node.name);
                let exec = node.context.exec().unwrap();
                assert_eq!(exec.arith, ArithMode::FloatingPoint);
                assert_eq!(exec.opt, OptPath::Scalar);
                if node.kind().has_weights() {
                    assert_eq!(
                        node.context.fraction(),
                        Some(FractionBits { kernel: 11, map: 15 })
                    );
                }
            }
            graph.len()
        });
        region
            .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
            .unwrap();
        assert_eq!(worker.join().unwrap(), 8);
    });
}

#[test]
fn test_weights_bound_by_ordinal() {
    let table = lenet();
    let weights = tagged_weights(&table);
    let arena = arena();
    let region = region(2, Arc::new(HostCoherent));
    region
        .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
        .unwrap();
    let graph = region.attach(1).unwrap();

    let first_values: Vec<(LayerKind, usize, f32)> = graph
        .nodes()
        .iter()
        .filter_map(|n| {
            n.context
                .binding()
                .map(|b| (n.kind(), b.ordinal, b.weights[0]))
        })
        .collect();
    assert_eq!(
        first_values,
        vec![
            (LayerKind::Convolution, 0, 10.0),
            (LayerKind::Convolution, 1, 11.0),
            (LayerKind::InnerProduct, 0, 20.0),
            (LayerKind::InnerProduct, 1, 21.0),
        ]
    );
}

#[test]
fn test_lenet_shapes_published() {
    let table = lenet();
    let weights = tagged_weights(&table);
    let arena = arena();
    let region = region(2, Arc::new(HostCoherent));
    let graph = region
        .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
        .unwrap();

    assert_eq!(graph.node(0).unwrap().output, MapShape::new(24, 24, 20));
    assert_eq!(graph.node(1).unwrap().output, MapShape::new(12, 12, 20));
    assert_eq!(graph.output(), MapShape::flat(10));
}

#[test]
fn test_unsupported_kind_aborts_all_workers() {
    let mut table = lenet();
    table.layers[5].kind = "lrn".into();
    let weights = tagged_weights(&lenet());
    let arena = arena();
    let region = region(4, Arc::new(HostCoherent));

    std::thread::scope(|s| {
        let workers: Vec<_> = (1..4)
            .map(|core| {
                let region = &region;
                s.spawn(move || region.attach(core).map(|g| g.len()))
            })
            .collect();

        let err = region
            .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
            .unwrap_err();
        assert!(err.to_string().contains("unsupported layer kind 'lrn'"), "{err}");

        for w in workers {
            match w.join().unwrap() {
                Err(RuntimeError::ConstructionFailed(reason)) => {
                    assert!(reason.contains("lrn"), "{reason}");
                }
                other => panic!("worker expected ConstructionFailed, got {other:?}"),
            }
        }
    });

    assert_eq!(region.state(), BarrierState::Failed);
    assert!(region.graph().is_none());
}

#[test]
fn test_allocation_failure_never_signals() {
    let table = lenet();
    let weights = tagged_weights(&table);
    let tight = ContextArena::new(ArenaBudget::from_bytes(256));
    let log = Arc::new(CacheLog::new());
    let region = region(2, log.clone());

    let err = region
        .construct(0, &table, mnist(), &weights, &tight, &QuantDefaults::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::GraphError(layer_graph::GraphError::Allocation { .. })
    ));
    assert_eq!(region.state(), BarrierState::Failed);
    assert!(log.ops().is_empty());
    assert!(matches!(
        region.attach(1),
        Err(RuntimeError::ConstructionFailed(_))
    ));
}

#[test]
fn test_weight_count_mismatch_aborts() {
    let table = lenet();
    let mut weights = tagged_weights(&table);
    weights = WeightBlob::new(weights.conv().to_vec(), weights.inner_product()[..1].to_vec());
    let arena = arena();
    let region = region(2, Arc::new(HostCoherent));

    let err = region
        .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::GraphError(layer_graph::GraphError::WeightCountMismatch {
            kind: LayerKind::InnerProduct,
            expected: 2,
            supplied: 1
        })
    ));
    assert!(matches!(
        region.attach(1),
        Err(RuntimeError::ConstructionFailed(_))
    ));
}

#[test]
fn test_write_back_precedes_invalidate() {
    let table = lenet();
    let weights = tagged_weights(&table);
    let arena = arena();
    let log = Arc::new(CacheLog::new());
    let region = region(3, log.clone());

    std::thread::scope(|s| {
        let w1 = s.spawn(|| region.attach(1).map(|_| ()));
        let w2 = s.spawn(|| region.attach(2).map(|_| ()));
        region
            .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
            .unwrap();
        w1.join().unwrap().unwrap();
        w2.join().unwrap().unwrap();
    });

    let ops = log.ops();
    let written = log.write_backs();
    let first_invalidate = ops
        .iter()
        .position(|op| matches!(op, CacheOp::Invalidate(_)))
        .unwrap();
    assert_eq!(first_invalidate, written.len());
    assert_eq!(log.invalidations().len(), 2 * written.len());
}

#[test]
fn test_construction_is_deterministic() {
    let table = lenet();
    let weights = tagged_weights(&table);

    let describe = || {
        let arena = arena();
        let region = region(2, Arc::new(HostCoherent));
        let graph = region
            .construct(0, &table, mnist(), &weights, &arena, &QuantDefaults::default())
            .unwrap();
        serde_json::to_string(&graph.describe()).unwrap()
    };

    let first = describe();
    assert_eq!(first, describe());
    assert!(first.contains("\"kind\":\"softmax\""));
}

#[test]
fn test_metadata_gate_serialises_cores() {
    let region = region(4, Arc::new(HostCoherent));
    let counter = std::sync::Mutex::new(Vec::new());

    std::thread::scope(|s| {
        for core in 0..4 {
            let region = &region;
            let counter = &counter;
            s.spawn(move || {
                for _ in 0..50 {
                    let guard = region.lock_metadata(core).unwrap();
                    assert_eq!(guard.core(), core);
                    counter.lock().unwrap().push(core);
                }
            });
        }
    });

    assert_eq!(counter.lock().unwrap().len(), 200);
}

#[test]
fn test_region_from_config() {
    let config = RuntimeConfig::from_toml(
        "context_budget = \"16K\"\n[topology]\nnum_cores = 2\nmaster_core = 1\n",
    )
    .unwrap();
    let table = lenet();
    let weights = tagged_weights(&table);
    let arena = config.create_arena().unwrap();
    let region = SharedRegion::from_config(&config, Arc::new(HostCoherent)).unwrap();

    assert!(matches!(
        region.construct(0, &table, config.input, &weights, &arena, &config.quantization),
        Err(RuntimeError::NotMaster { core: 0, master: 1 })
    ));
    let graph = region
        .construct(1, &table, config.input, &weights, &arena, &config.quantization)
        .unwrap();
    assert_eq!(graph.len(), 8);
    assert!(region.attach(0).is_ok());
}
