// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device placement and stage-scoped profile lookups.
//!
//! A [`StagePerformance`] binds one [`InterStagePlan`] to the cluster: it
//! lays out ranks along the plan's node sequence and answers, per stage,
//! "which devices, which device types, which profiled numbers, which
//! links". Lookups are exact; an unprofiled point is a
//! [`LookupFailure`](profile_store::LookupFailure).

use crate::{DeviceGroup, InterStagePlan, ModelConfig, PlannerError};
use cluster_topology::{ClusterTopology, Device, DeviceType};
use profile_store::{LookupFailure, ProfileRecord, ProfileStore};
use std::collections::BTreeSet;
use std::ops::Range;

/// Rank → physical device for one node sequence.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RankDeviceMap {
    devices: Vec<Device>,
}

impl RankDeviceMap {
    /// Lays out every device of the sequence's types in rank order.
    pub fn new(topology: &ClusterTopology, node_sequence: &[DeviceType]) -> Result<Self, PlannerError> {
        let devices = topology
            .rank_order(node_sequence)
            .map_err(|e| PlannerError::InvalidPlan(e.to_string()))?;
        Ok(Self { devices })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Returns the device holding a rank.
    pub fn device(&self, rank: usize) -> Option<&Device> {
        self.devices.get(rank)
    }

    /// Returns the devices of a group, or `None` if it runs past the map.
    pub fn group(&self, group: &DeviceGroup) -> Option<&[Device]> {
        self.devices.get(group.ranks())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }
}

/// The exact records of every device type present in one stage.
#[derive(Debug, Clone)]
pub struct StageProfile<'a> {
    records: Vec<(DeviceType, &'a ProfileRecord)>,
    bottleneck: usize,
}

impl<'a> StageProfile<'a> {
    /// Looks up `(type, tp, bs)` for every type; fails on the first gap.
    ///
    /// Types are visited in name order, so the reported failure and the
    /// bottleneck tie-break are deterministic.
    pub fn lookup(
        profiles: &'a ProfileStore,
        device_types: &BTreeSet<DeviceType>,
        tp: usize,
        bs: usize,
    ) -> Result<Self, LookupFailure> {
        let mut records = Vec::with_capacity(device_types.len());
        for device_type in device_types {
            records.push((device_type.clone(), profiles.get(device_type, tp, bs)?));
        }

        // Slowest type; the first one wins on equal totals.
        let mut bottleneck = 0;
        for (i, (_, record)) in records.iter().enumerate() {
            if record.total_compute_ms() > records[bottleneck].1.total_compute_ms() {
                bottleneck = i;
            }
        }

        Ok(Self {
            records,
            bottleneck,
        })
    }

    /// The slowest device type of the stage.
    pub fn bottleneck_type(&self) -> &DeviceType {
        &self.records[self.bottleneck].0
    }

    /// The record of the slowest device type.
    pub fn bottleneck(&self) -> &'a ProfileRecord {
        self.records[self.bottleneck].1
    }

    /// Per-type records in name order.
    pub fn records(&self) -> &[(DeviceType, &'a ProfileRecord)] {
        &self.records
    }

    /// Compute time of a layer range on the slowest type for that range (ms).
    pub fn compute_ms(&self, layers: Range<usize>) -> f64 {
        self.records
            .iter()
            .map(|(_, r)| r.compute_ms(layers.clone()))
            .fold(0.0, f64::max)
    }

    /// Sync residual scaled to the share of layers the stage hosts (ms).
    pub fn sync_ms(&self, stage_layers: usize, total_layers: usize) -> f64 {
        if total_layers == 0 {
            return 0.0;
        }
        let share = stage_layers as f64 / total_layers as f64;
        self.records
            .iter()
            .map(|(_, r)| r.sync_ms * share)
            .fold(0.0, f64::max)
    }
}

/// Bandwidth of a collective over `devices` (Gbit/s).
///
/// Intra-node bandwidth when every device sits on one node, otherwise the
/// slowest inter-node link among the nodes involved. `None` if a device
/// names a node the topology does not know.
pub(crate) fn collective_bandwidth(topology: &ClusterTopology, devices: &[Device]) -> Option<f64> {
    let nodes: BTreeSet<usize> = devices.iter().map(|d| d.node_id).collect();
    match nodes.len() {
        0 => None,
        1 => nodes.first().and_then(|&id| topology.intra_bandwidth(id)),
        _ => nodes
            .iter()
            .map(|&id| topology.inter_bandwidth(id))
            .try_fold(f64::INFINITY, |acc, bw| bw.map(|bw| acc.min(bw))),
    }
}

/// Bandwidth of the link between the last device of one stage and the
/// first device of the next (Gbit/s).
pub(crate) fn boundary_bandwidth(
    topology: &ClusterTopology,
    left: &[Device],
    right: &[Device],
) -> Option<f64> {
    let (a, b) = (left.last()?, right.first()?);
    if a.node_id == b.node_id {
        topology.intra_bandwidth(a.node_id)
    } else {
        let out = topology.inter_bandwidth(a.node_id)?;
        let into = topology.inter_bandwidth(b.node_id)?;
        Some(out.min(into))
    }
}

/// Smallest per-device memory (MB) among `devices` of one type.
pub(crate) fn type_memory_mb(
    topology: &ClusterTopology,
    devices: &[Device],
    device_type: &DeviceType,
) -> Option<u64> {
    devices
        .iter()
        .filter(|d| &d.device_type == device_type)
        .filter_map(|d| topology.device_memory_mb(d.node_id))
        .min()
}

/// Distinct device types among `devices`.
pub(crate) fn device_types_of(devices: &[Device]) -> BTreeSet<DeviceType> {
    devices.iter().map(|d| d.device_type.clone()).collect()
}

/// One inter-stage plan laid out on the cluster.
#[derive(Debug)]
pub struct StagePerformance<'a> {
    profiles: &'a ProfileStore,
    topology: &'a ClusterTopology,
    plan: &'a InterStagePlan,
    placement: RankDeviceMap,
    stage_types: Vec<BTreeSet<DeviceType>>,
}

impl<'a> StagePerformance<'a> {
    pub fn new(
        model: &ModelConfig,
        profiles: &'a ProfileStore,
        topology: &'a ClusterTopology,
        plan: &'a InterStagePlan,
    ) -> Result<Self, PlannerError> {
        plan.validate()?;
        if model.num_layers != profiles.num_layers() {
            return Err(PlannerError::InvalidModel(format!(
                "model has {} layers, profiles cover {}",
                model.num_layers,
                profiles.num_layers()
            )));
        }

        let placement = RankDeviceMap::new(topology, &plan.node_sequence)?;
        if plan.total_devices() > placement.len() {
            return Err(PlannerError::InvalidPlan(format!(
                "plan {} needs {} devices, node sequence provides {}",
                plan.index,
                plan.total_devices(),
                placement.len()
            )));
        }

        let stage_types = plan
            .device_groups
            .iter()
            .filter_map(|g| placement.group(g))
            .map(device_types_of)
            .collect();

        Ok(Self {
            profiles,
            topology,
            plan,
            placement,
            stage_types,
        })
    }

    pub fn plan(&self) -> &'a InterStagePlan {
        self.plan
    }

    pub fn num_stages(&self) -> usize {
        self.plan.num_stages()
    }

    /// Rank → device map for the plan's node sequence.
    pub fn device_placement(&self) -> &RankDeviceMap {
        &self.placement
    }

    /// Devices of one stage, in rank order.
    pub fn stage_devices(&self, stage: usize) -> &[Device] {
        self.placement
            .group(&self.plan.device_groups[stage])
            .unwrap_or_default()
    }

    /// Device types present in one stage.
    pub fn stage_device_types(&self, stage: usize) -> &BTreeSet<DeviceType> {
        &self.stage_types[stage]
    }

    /// Exact profiled numbers for a stage at `(tp, bs)`.
    pub fn stage_profile(
        &self,
        stage: usize,
        tp: usize,
        bs: usize,
    ) -> Result<StageProfile<'a>, PlannerError> {
        Ok(StageProfile::lookup(self.profiles, &self.stage_types[stage], tp, bs)?)
    }

    /// Returns a per-stage description of the placement.
    pub fn summary(&self) -> String {
        let stages: Vec<String> = (0..self.num_stages())
            .map(|s| {
                let types: Vec<&str> = self.stage_types[s].iter().map(|t| t.name()).collect();
                let bandwidth = collective_bandwidth(self.topology, self.stage_devices(s)).unwrap_or(0.0);
                format!(
                    "stage {s}: {} devices [{}] {bandwidth:.0} Gbit/s",
                    self.plan.device_groups[s].num_devices,
                    types.join("+"),
                )
            })
            .collect();
        format!("Placement of plan #{}: {}", self.plan.index, stages.join("; "))
    }
}
