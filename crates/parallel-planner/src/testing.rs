// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests.

use crate::{BatchSplit, InterStagePlan, ModelConfig};
use cluster_topology::{ClusterTopology, DeviceType, Node};
use profile_store::{ModelProfile, ProfileKey, ProfileRecord, ProfileStore};

/// Per-layer memory of every fixture record (MB).
pub const LAYER_MEMORY_MB: f64 = 100.0;
/// Per-layer parameter bytes of the fixture model.
pub const LAYER_PARAM_BYTES: u64 = 1_000_000;
/// Sync residual of every fixture record (ms).
pub const SYNC_MS: f64 = 0.4;

/// One node per entry, 16 GB devices, 600/100 Gbit/s intra/inter links.
pub fn cluster(nodes: &[(&str, usize)]) -> ClusterTopology {
    let nodes = nodes
        .iter()
        .enumerate()
        .map(|(id, &(device_type, num_devices))| Node {
            id,
            ip: format!("10.0.0.{id}"),
            device_type: DeviceType::new(device_type),
            num_devices,
            device_memory_mb: 16 * 1024,
            intra_bandwidth_gbps: 600.0,
            inter_bandwidth_gbps: 100.0,
        })
        .collect();
    ClusterTopology::new(nodes).unwrap()
}

/// Records of `(type, tp, bs, per-layer ms)`, uniform across layers.
pub fn profiles(points: &[(&str, usize, usize, f64)], num_layers: usize) -> ProfileStore {
    let mut store = ProfileStore::new(ModelProfile {
        optimizer_time_ms: 2.0,
        batch_generator_time_ms: 0.5,
        parameters_per_layer_bytes: vec![LAYER_PARAM_BYTES; num_layers],
    });
    for &(device_type, tp, bs, layer_ms) in points {
        store
            .insert(
                ProfileKey::new(DeviceType::new(device_type), tp, bs),
                ProfileRecord {
                    layer_compute_ms: vec![layer_ms; num_layers],
                    sync_ms: SYNC_MS,
                    layer_memory_mb: vec![LAYER_MEMORY_MB; num_layers],
                },
            )
            .unwrap();
    }
    store
}

pub fn gpt(num_layers: usize) -> ModelConfig {
    ModelConfig {
        model_name: "GPT".into(),
        model_size: "test".into(),
        num_layers,
        hidden_size: 1024,
        sequence_length: 512,
        vocab_size: 50257,
        attention_head_size: 64,
    }
}

pub fn plan(
    sequence: &[&str],
    sizes: &[usize],
    num_micro_batches: usize,
    micro_batch_size: usize,
) -> InterStagePlan {
    InterStagePlan::from_group_sizes(
        0,
        sequence.iter().map(|t| DeviceType::new(*t)).collect(),
        sizes,
        BatchSplit {
            num_micro_batches,
            micro_batch_size,
        },
    )
}
