// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-iteration cost of a fully specified candidate on a heterogeneous
//! cluster.
//!
//! All times are in milliseconds; bandwidths are in Gbit/s.
//!
//! | Term | Model |
//! |---|---|
//! | stage time | `(compute + sync) · ceil(M / dp)`, slowest device type of the stage |
//! | pipeline | slowest stage time + Σ other stages' `compute + sync` (bubble) |
//! | point-to-point | activations forward and back, every boundary, every micro-batch |
//! | data-parallel | ring all-reduce of the stage's parameter shard, slowest stage |
//! | re-sharding | activations of every micro-batch per tp change, slowest boundary |
//! | fixed | optimizer step + batch generator |

use crate::plan::{check_assignment, layer_ranges};
use crate::stage::{
    boundary_bandwidth, collective_bandwidth, device_types_of, type_memory_mb, StageProfile,
};
use crate::{
    InterStagePlan, IntraStagePlan, ModelConfig, ModelVolume, PlannerError, RankDeviceMap,
    StageStrategy,
};
use cluster_topology::{ClusterTopology, Device};
use profile_store::ProfileStore;

/// Milliseconds needed to move `bytes` over a `gbps` link.
pub fn transfer_ms(bytes: f64, gbps: f64) -> f64 {
    bytes * 8.0 / (gbps * 1e9) * 1e3
}

/// Cost terms of one stage.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StageCost {
    /// Compute time of the stage's layers for one micro-batch.
    pub compute_ms: f64,
    /// Sync residual attributed to the stage for one micro-batch.
    pub sync_ms: f64,
    /// Micro-batches each data-parallel replica processes.
    pub rounds: usize,
    /// `(compute + sync) · rounds`.
    pub stage_ms: f64,
    /// Data-parallel gradient all-reduce.
    pub allreduce_ms: f64,
    /// Peak per-device memory of the stage's layers.
    pub memory_mb: f64,
}

/// Every term of a candidate's cost.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CostBreakdown {
    pub stages: Vec<StageCost>,
    /// Stage with the largest stage time (first on ties).
    pub slowest_stage: usize,
    /// Slowest stage time plus the bubble.
    pub pipeline_ms: f64,
    pub bubble_ms: f64,
    pub p2p_ms: f64,
    /// Largest per-stage all-reduce (stages reduce concurrently).
    pub allreduce_ms: f64,
    pub repartition_ms: f64,
    /// Optimizer step and batch generator.
    pub fixed_ms: f64,
    pub total_ms: f64,
}

/// Scores candidates from profiled data only.
///
/// Read-only and `Sync`; one estimator is shared by every search worker.
#[derive(Debug, Clone)]
pub struct HeteroCostEstimator<'a> {
    profiles: &'a ProfileStore,
    model: &'a ModelConfig,
    volume: ModelVolume,
    topology: &'a ClusterTopology,
}

impl<'a> HeteroCostEstimator<'a> {
    pub fn new(
        profiles: &'a ProfileStore,
        model: &'a ModelConfig,
        volume: ModelVolume,
        topology: &'a ClusterTopology,
    ) -> Self {
        Self {
            profiles,
            model,
            volume,
            topology,
        }
    }

    /// Returns the total cost of a candidate (ms).
    pub fn get_cost(
        &self,
        inter: &InterStagePlan,
        strategies: &[StageStrategy],
        layer_partition: &[usize],
        ranks: &RankDeviceMap,
    ) -> Result<f64, PlannerError> {
        self.estimate(inter, strategies, layer_partition, ranks)
            .map(|cost| cost.total_ms)
    }

    /// Computes every cost term of a candidate.
    ///
    /// # Errors
    /// - [`PlannerError::LookupFailure`] if a stage's `(type, tp, bs)`
    ///   point was never profiled.
    /// - [`PlannerError::OutOfMemory`] if a stage's layers exceed the
    ///   memory of one of its device types.
    /// - [`PlannerError::InvalidPlan`] if the inputs are inconsistent.
    pub fn estimate(
        &self,
        inter: &InterStagePlan,
        strategies: &[StageStrategy],
        layer_partition: &[usize],
        ranks: &RankDeviceMap,
    ) -> Result<CostBreakdown, PlannerError> {
        let num_layers = self.model.num_layers;
        if self.profiles.num_layers() != num_layers || self.volume.num_layers() != num_layers {
            return Err(PlannerError::InvalidModel(format!(
                "model has {num_layers} layers, profiles {}, volume model {}",
                self.profiles.num_layers(),
                self.volume.num_layers()
            )));
        }
        inter.validate()?;
        check_assignment(inter, strategies, layer_partition, num_layers)?;

        let groups = inter
            .device_groups
            .iter()
            .map(|group| {
                ranks.group(group).ok_or_else(|| {
                    PlannerError::InvalidPlan(format!(
                        "group {group} runs past the {} mapped ranks",
                        ranks.len()
                    ))
                })
            })
            .collect::<Result<Vec<&[Device]>, _>>()?;

        let bs = inter.batches.micro_batch_size;
        let micro_batches = inter.batches.num_micro_batches;
        let ranges = layer_ranges(layer_partition);

        let mut stages = Vec::with_capacity(groups.len());
        for (stage, ((strategy, devices), layers)) in
            strategies.iter().zip(&groups).zip(ranges).enumerate()
        {
            let profile = StageProfile::lookup(self.profiles, &device_types_of(devices), strategy.tp, bs)?;
            let compute_ms = profile.compute_ms(layers.clone());
            let sync_ms = profile.sync_ms(layers.len(), num_layers);
            let rounds = micro_batches.div_ceil(strategy.dp);

            let mut memory_mb: f64 = 0.0;
            for (device_type, record) in profile.records() {
                let required_mb = record.memory_mb(layers.clone());
                let available_mb = type_memory_mb(self.topology, devices, device_type)
                    .ok_or_else(|| unknown_node(stage))?;
                if required_mb > available_mb as f64 {
                    return Err(PlannerError::OutOfMemory {
                        stage,
                        device_type: device_type.clone(),
                        required_mb,
                        available_mb,
                    });
                }
                memory_mb = memory_mb.max(required_mb);
            }

            let allreduce_ms = if strategy.dp > 1 {
                let dp = strategy.dp as f64;
                let shard_bytes = self.volume.parameter_bytes(layers) as f64 / strategy.tp as f64;
                let bandwidth =
                    collective_bandwidth(self.topology, devices).ok_or_else(|| unknown_node(stage))?;
                transfer_ms(2.0 * (dp - 1.0) / dp * shard_bytes, bandwidth)
            } else {
                0.0
            };

            stages.push(StageCost {
                compute_ms,
                sync_ms,
                rounds,
                stage_ms: (compute_ms + sync_ms) * rounds as f64,
                allreduce_ms,
                memory_mb,
            });
        }

        let slowest_stage = (0..stages.len()).fold(0, |best, s| {
            if stages[s].stage_ms > stages[best].stage_ms {
                s
            } else {
                best
            }
        });
        let bubble_ms: f64 = stages
            .iter()
            .enumerate()
            .filter(|&(s, _)| s != slowest_stage)
            .map(|(_, c)| c.compute_ms + c.sync_ms)
            .sum();
        let pipeline_ms = stages[slowest_stage].stage_ms + bubble_ms;

        let activation_bytes = self.volume.activation_bytes(bs) as f64;
        let mut p2p_ms = 0.0;
        let mut slowest_link = f64::INFINITY;
        for (boundary, pair) in groups.windows(2).enumerate() {
            let bandwidth = boundary_bandwidth(self.topology, pair[0], pair[1])
                .ok_or_else(|| unknown_node(boundary))?;
            slowest_link = slowest_link.min(bandwidth);
            p2p_ms += 2.0 * micro_batches as f64 * transfer_ms(activation_bytes, bandwidth);
        }

        let num_repartition = IntraStagePlan::count_repartitions(strategies);
        let repartition_ms = if num_repartition > 0 {
            (num_repartition * micro_batches) as f64 * transfer_ms(activation_bytes, slowest_link)
        } else {
            0.0
        };

        let allreduce_ms = stages.iter().map(|c| c.allreduce_ms).fold(0.0, f64::max);
        let model = self.profiles.model();
        let fixed_ms = model.optimizer_time_ms + model.batch_generator_time_ms;
        let total_ms = pipeline_ms + p2p_ms + allreduce_ms + repartition_ms + fixed_ms;

        Ok(CostBreakdown {
            stages,
            slowest_stage,
            pipeline_ms,
            bubble_ms,
            p2p_ms,
            allreduce_ms,
            repartition_ms,
            fixed_ms,
            total_ms,
        })
    }
}

fn unknown_node(stage: usize) -> PlannerError {
    PlannerError::InvalidPlan(format!("stage {stage} references a node outside the cluster"))
}
