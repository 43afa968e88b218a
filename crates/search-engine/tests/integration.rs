// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end strategy search.
//!
//! These tests run the complete flow from cluster and profiles →
//! inter-stage plans → intra-stage candidates → costing → ranking, proving
//! that the four crates compose correctly and that the session type-state
//! works end-to-end.

use cluster_topology::{ClusterTopology, DeviceType, Node};
use profile_store::{ModelProfile, ProfileKey, ProfileRecord, ProfileStore};
use search_engine::{CancelToken, SearchConfig, SearchReport, SearchSession};

// ── Helpers ────────────────────────────────────────────────────

/// One node per `(type, devices)` entry, 16 GB per device.
fn cluster(nodes: &[(&str, usize)]) -> ClusterTopology {
    let nodes = nodes
        .iter()
        .enumerate()
        .map(|(id, &(name, num_devices))| Node {
            id,
            ip: format!("10.0.0.{}", id + 1),
            device_type: DeviceType::new(name),
            num_devices,
            device_memory_mb: 16 * 1024,
            intra_bandwidth_gbps: 600.0,
            inter_bandwidth_gbps: 100.0,
        })
        .collect();
    ClusterTopology::new(nodes).unwrap()
}

/// Profiles for `(type, tp, bs, per-layer ms)` points.
fn profiles(points: &[(&str, usize, usize, f64)], num_layers: usize) -> ProfileStore {
    let mut store = ProfileStore::new(ModelProfile {
        optimizer_time_ms: 2.0,
        batch_generator_time_ms: 0.5,
        parameters_per_layer_bytes: vec![1_000_000; num_layers],
    });
    for &(name, tp, bs, ms) in points {
        store
            .insert(
                ProfileKey::new(DeviceType::new(name), tp, bs),
                ProfileRecord {
                    layer_compute_ms: vec![ms; num_layers],
                    sync_ms: 0.4,
                    layer_memory_mb: vec![100.0; num_layers],
                },
            )
            .unwrap();
    }
    store
}

struct Knobs {
    num_layers: usize,
    global_batch_size: usize,
    variance: usize,
    max_permute_len: usize,
    max_tp: usize,
    max_bs: usize,
    threads: usize,
}

impl Default for Knobs {
    fn default() -> Self {
        Self {
            num_layers: 4,
            global_batch_size: 16,
            variance: 0,
            max_permute_len: 1,
            max_tp: 2,
            max_bs: 8,
            threads: 1,
        }
    }
}

fn config(knobs: &Knobs) -> SearchConfig {
    let mut config = SearchConfig::default();
    config.model.num_layers = knobs.num_layers;
    config.model.global_batch_size = knobs.global_batch_size;
    config.search.min_group_scale_variance = knobs.variance;
    config.search.max_permute_len = knobs.max_permute_len;
    config.search.max_profiled_tp_degree = knobs.max_tp;
    config.search.max_profiled_batch_size = knobs.max_bs;
    config.search.num_threads = Some(knobs.threads);
    config
}

fn search(knobs: &Knobs, topology: ClusterTopology, store: ProfileStore) -> SearchReport {
    SearchSession::from_parts(config(knobs), topology, store)
        .unwrap()
        .run(&CancelToken::new())
        .unwrap()
}

// ── Homogeneous cluster ────────────────────────────────────────

#[test]
fn test_homogeneous_counts() {
    let report = search(
        &Knobs::default(),
        cluster(&[("A", 4)]),
        profiles(&[("A", 1, 8, 1.0), ("A", 2, 8, 0.6)], 4),
    );

    // Groupings [4], [2,2], [1,1,1,1] times splits of 16.
    assert_eq!(report.stats.inter_plans, 15);
    // M = 1 gives mbs 16 > 8 and is skipped; the rest yield 2 + 4 + 1.
    assert_eq!(report.stats.intra_candidates, 28);
    // Only M = 2 (bs 8) is profiled.
    assert_eq!(report.stats.lookup_failures, 21);
    assert_eq!(report.stats.infeasible, 0);
    assert_eq!(report.len(), 7);
    assert!(!report.cancelled);

    assert!(report
        .candidates
        .iter()
        .all(|c| c.inter.batches.num_micro_batches == 2 && c.inter.batches.micro_batch_size == 8));

    let mut single_stage: Vec<(usize, usize)> = report
        .candidates
        .iter()
        .filter(|c| c.inter.num_stages() == 1)
        .map(|c| (c.intra.strategies[0].tp, c.intra.strategies[0].dp))
        .collect();
    single_stage.sort();
    assert_eq!(single_stage, vec![(1, 4), (2, 2)]);
}

#[test]
fn test_ranking_is_monotonic() {
    let report = search(
        &Knobs::default(),
        cluster(&[("A", 4)]),
        profiles(&[("A", 1, 8, 1.0), ("A", 2, 8, 0.6)], 4),
    );

    for (i, candidate) in report.candidates.iter().enumerate() {
        assert_eq!(candidate.rank, i + 1);
        assert_eq!(candidate.cost_ms, candidate.breakdown.total_ms);
        assert!(candidate.cost_ms.is_finite() && candidate.cost_ms > 0.0);
    }
    for pair in report.candidates.windows(2) {
        assert!(pair[0].cost_ms <= pair[1].cost_ms);
    }
    let best = report.best().unwrap();
    assert_eq!(best.rank, 1);
    assert_eq!(best.intra.layer_partition.iter().sum::<usize>(), 4);
}

#[test]
fn test_missing_batch_size_only_drops_its_candidates() {
    let knobs = Knobs {
        global_batch_size: 32,
        max_bs: 32,
        ..Knobs::default()
    };
    let base = [("A", 1, 8, 1.0), ("A", 2, 8, 0.6)];
    let with_32 = [("A", 1, 8, 1.0), ("A", 2, 8, 0.6), ("A", 1, 32, 3.5), ("A", 2, 32, 2.0)];

    let without = search(&knobs, cluster(&[("A", 4)]), profiles(&base, 4));
    let with = search(&knobs, cluster(&[("A", 4)]), profiles(&with_32, 4));

    assert_eq!(without.stats.intra_candidates, with.stats.intra_candidates);
    let mbs_32 = with
        .candidates
        .iter()
        .filter(|c| c.inter.batches.micro_batch_size == 32)
        .count();
    assert_eq!(mbs_32, 7);
    assert_eq!(with.len() - without.len(), mbs_32);
    assert_eq!(without.stats.lookup_failures - with.stats.lookup_failures, mbs_32);
}

// ── Heterogeneous cluster ──────────────────────────────────────

#[test]
fn test_heterogeneous_two_stage_split() {
    let knobs = Knobs {
        max_permute_len: 2,
        ..Knobs::default()
    };
    let report = search(
        &knobs,
        cluster(&[("A", 2), ("B", 2)]),
        profiles(
            &[("A", 1, 8, 1.0), ("A", 2, 8, 0.6), ("B", 1, 8, 2.0), ("B", 2, 8, 1.2)],
            4,
        ),
    );

    assert!(!report.is_empty());
    let split: Vec<_> = report
        .candidates
        .iter()
        .filter(|c| c.inter.group_sizes() == vec![2, 2])
        .collect();
    assert!(!split.is_empty());
    // Both device orders are visited.
    assert!(split.iter().any(|c| c.inter.node_sequence[0] == DeviceType::new("A")));
    assert!(split.iter().any(|c| c.inter.node_sequence[0] == DeviceType::new("B")));

    // Per-stage costs report the slower type of a mixed stage.
    for c in &report.candidates {
        assert_eq!(c.breakdown.stages.len(), c.inter.num_stages());
    }
}

#[test]
fn test_unequal_type_counts_without_variance() {
    let report = search(
        &Knobs {
            max_permute_len: 2,
            ..Knobs::default()
        },
        cluster(&[("A", 2), ("B", 1)]),
        profiles(&[("A", 1, 8, 1.0), ("B", 1, 8, 2.0)], 4),
    );

    // Three devices never split evenly in two.
    assert!(report.candidates.iter().all(|c| c.inter.num_stages() != 2));
    assert!(!report.is_empty());
}

#[test]
fn test_unprofiled_device_type_yields_empty_report() {
    let report = search(
        &Knobs::default(),
        cluster(&[("A", 4)]),
        profiles(&[("Z", 1, 8, 1.0)], 4),
    );

    assert!(report.is_empty());
    assert!(report.best().is_none());
    assert_eq!(report.stats.lookup_failures, report.stats.intra_candidates);
    assert!(report.summary().contains("no feasible candidates"));
}

// ── Parallel search and cancellation ───────────────────────────

#[test]
fn test_parallel_matches_sequential() {
    let points = [("A", 1, 8, 1.0), ("A", 2, 8, 0.6), ("B", 1, 8, 2.0), ("B", 2, 8, 1.2)];
    let key = |r: &SearchReport| -> Vec<(usize, f64, usize, usize)> {
        r.candidates
            .iter()
            .map(|c| (c.rank, c.cost_ms, c.inter.index, c.intra.index))
            .collect()
    };

    let sequential = search(
        &Knobs {
            max_permute_len: 2,
            ..Knobs::default()
        },
        cluster(&[("A", 2), ("B", 2)]),
        profiles(&points, 4),
    );
    let parallel = search(
        &Knobs {
            max_permute_len: 2,
            threads: 4,
            ..Knobs::default()
        },
        cluster(&[("A", 2), ("B", 2)]),
        profiles(&points, 4),
    );

    assert_eq!(key(&sequential), key(&parallel));
    assert_eq!(sequential.stats.inter_plans, parallel.stats.inter_plans);
    assert_eq!(sequential.stats.lookup_failures, parallel.stats.lookup_failures);
}

#[test]
fn test_pre_cancelled_search() {
    let session = SearchSession::from_parts(
        config(&Knobs::default()),
        cluster(&[("A", 4)]),
        profiles(&[("A", 1, 8, 1.0)], 4),
    )
    .unwrap();

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = session.run(&cancel).unwrap();

    assert!(report.cancelled);
    assert!(report.is_empty());
    assert_eq!(report.stats.inter_plans, 0);
    assert!(report.summary().contains("cancelled"));
}

fn assert_ranked(report: &SearchReport) {
    let ranks: Vec<usize> = report.candidates.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, (1..=report.len()).collect::<Vec<_>>());
    assert!(report
        .candidates
        .windows(2)
        .all(|pair| pair[0].cost_ms <= pair[1].cost_ms));
}

#[test]
fn test_cancelled_mid_run() {
    let knobs = Knobs {
        global_batch_size: 8,
        ..Knobs::default()
    };
    // Every micro-batch size of 8 is profiled, so early plans have candidates.
    let points = [("A", 1, 1, 1.0), ("A", 1, 2, 1.0), ("A", 1, 4, 1.0), ("A", 1, 8, 1.0)];
    let session =
        SearchSession::from_parts(config(&knobs), cluster(&[("A", 4)]), profiles(&points, 4)).unwrap();
    let total = session.inter_plans().count();
    assert_eq!(total, 12);

    let cancel = CancelToken::new();
    let seen = std::sync::atomic::AtomicUsize::new(0);
    let report = session
        .run_with_progress(&cancel, |_| {
            if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 == 3 {
                cancel.cancel();
            }
        })
        .unwrap();

    assert!(report.cancelled);
    // One worker: no plan starts after the token trips.
    assert_eq!(report.stats.inter_plans, 3);
    assert!(report.stats.inter_plans > 0 && report.stats.inter_plans <= total);
    assert!(!report.is_empty());
    assert_ranked(&report);
    assert!(report.summary().contains("cancelled"));
}

#[test]
fn test_cancelled_mid_run_parallel() {
    let knobs = Knobs {
        global_batch_size: 8,
        threads: 4,
        ..Knobs::default()
    };
    let points = [("A", 1, 1, 1.0), ("A", 1, 2, 1.0), ("A", 1, 4, 1.0), ("A", 1, 8, 1.0)];
    let session =
        SearchSession::from_parts(config(&knobs), cluster(&[("A", 4)]), profiles(&points, 4)).unwrap();
    let total = session.inter_plans().count();

    let cancel = CancelToken::new();
    let report = session.run_with_progress(&cancel, |_| cancel.cancel()).unwrap();

    assert!(report.cancelled);
    assert!(report.stats.inter_plans > 0 && report.stats.inter_plans <= total);
    assert_ranked(&report);
}

// ── Loading from disk ──────────────────────────────────────────

fn profile_json(per_layer_ms: f64, num_layers: usize) -> String {
    let layers = vec![per_layer_ms; num_layers];
    serde_json::json!({
        "model": { "parameters": { "parameters_per_layer_bytes": vec![1_000_000u64; num_layers] } },
        "execution_time": {
            "optimizer_time_ms": 1.0,
            "batch_generator_time_ms": 0.5,
            "layer_compute_total_ms": layers,
            "forward_backward_time_ms": per_layer_ms * num_layers as f64 + 0.4
        },
        "execution_memory": { "layer_memory_total_mb": vec![100.0; num_layers] }
    })
    .to_string()
}

#[test]
fn test_full_pipeline_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();

    std::fs::write(home.join("hostfile"), "10.0.0.1 slots=2\n10.0.0.2 slots=2\n").unwrap();
    std::fs::write(
        home.join("clusterfile.json"),
        r#"{
            "10.0.0.1": { "instance_type": "A", "memory": 16, "intra_bandwidth": 600, "inter_bandwidth": 100 },
            "10.0.0.2": { "instance_type": "B", "memory": 16, "intra_bandwidth": 300, "inter_bandwidth": 100 }
        }"#,
    )
    .unwrap();
    let profile_dir = home.join("profile_data");
    std::fs::create_dir(&profile_dir).unwrap();
    for (name, ms) in [("A_tp1_bs8", 1.0), ("A_tp2_bs8", 0.6), ("B_tp1_bs8", 2.0)] {
        std::fs::write(
            profile_dir.join(format!("DeviceType.{name}.json")),
            profile_json(ms, 4),
        )
        .unwrap();
    }

    let toml = format!(
        r#"
[model]
model_name = "GPT"
model_size = "test"
num_layers = 4
global_batch_size = 16
hidden_size = 1024
sequence_length = 512
vocab_size = 50257
attention_head_size = 64

[cluster]
hostfile_path = "hostfile"
clusterfile_path = "clusterfile.json"

[search]
max_profiled_tp_degree = 2
max_profiled_batch_size = 8
min_group_scale_variance = 0
max_permute_len = 2
num_threads = 2

[env]
home_dir = "{}"
profile_data_path = "profile_data"
output_path = "result.json"
"#,
        home.display()
    );
    let config_path = home.join("hetspeed.toml");
    std::fs::write(&config_path, toml).unwrap();

    let config = SearchConfig::from_file(&config_path).unwrap();
    let session = SearchSession::new(config).load().unwrap();
    assert_eq!(session.topology().total_devices(), 4);
    assert_eq!(session.profiles().len(), 3);
    // The optimizer step is counted twice.
    assert_eq!(session.profiles().model().optimizer_time_ms, 2.0);

    let report = session.run(&CancelToken::new()).unwrap();
    assert!(!report.is_empty());

    let output = session.config().output_path().unwrap();
    report.write_json(&output).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        written["candidates"].as_array().unwrap().len(),
        report.len()
    );
}

#[test]
fn test_load_rejects_layer_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    std::fs::write(home.join("hostfile"), "10.0.0.1 slots=2\n").unwrap();
    std::fs::write(
        home.join("clusterfile.json"),
        r#"{ "10.0.0.1": { "instance_type": "A", "memory": 16, "intra_bandwidth": 600, "inter_bandwidth": 100 } }"#,
    )
    .unwrap();
    std::fs::create_dir(home.join("profile_data")).unwrap();
    std::fs::write(
        home.join("profile_data").join("DeviceType.A_tp1_bs8.json"),
        profile_json(1.0, 6),
    )
    .unwrap();

    let mut config = config(&Knobs::default());
    config.env.home_dir = home.to_path_buf();
    let result = SearchSession::new(config).load();
    assert!(matches!(result, Err(search_engine::SearchError::ConfigError(_))));
}
