// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The immutable cluster description shared by every search iteration.

use crate::{Device, DeviceType, TopologyError};
use std::collections::BTreeSet;

/// A single host and the accelerators it carries.
///
/// All devices on a node share one [`DeviceType`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Node {
    /// Node id (hostfile line order, starting at 0).
    pub id: usize,
    /// Host address as written in the hostfile.
    pub ip: String,
    /// Accelerator class installed on this node.
    pub device_type: DeviceType,
    /// Number of accelerators on this node.
    pub num_devices: usize,
    /// Memory of a single accelerator in MB.
    pub device_memory_mb: u64,
    /// Bandwidth between accelerators of this node, in Gbit/s.
    pub intra_bandwidth_gbps: f64,
    /// Bandwidth from this node to other nodes, in Gbit/s.
    pub inter_bandwidth_gbps: f64,
}

impl Node {
    /// Returns a one-line description of this node.
    pub fn summary(&self) -> String {
        format!(
            "node {} ({}): {}x {} [{} MB/device, intra {:.0} Gbit/s, inter {:.0} Gbit/s]",
            self.id,
            self.ip,
            self.num_devices,
            self.device_type,
            self.device_memory_mb,
            self.intra_bandwidth_gbps,
            self.inter_bandwidth_gbps,
        )
    }
}

/// The set of nodes that make up a (possibly heterogeneous) cluster.
///
/// Constructed once, validated, and never mutated afterwards. Nodes are
/// stored in ascending id order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClusterTopology {
    nodes: Vec<Node>,
}

impl ClusterTopology {
    /// Builds a topology from a list of nodes.
    ///
    /// # Checks
    /// - At least one node.
    /// - Node ids are unique.
    /// - Every node has at least one device.
    /// - Bandwidths are finite and positive.
    pub fn new(mut nodes: Vec<Node>) -> Result<Self, TopologyError> {
        if nodes.is_empty() {
            return Err(TopologyError::InvalidTopology(
                "cluster contains no nodes".into(),
            ));
        }

        nodes.sort_by_key(|n| n.id);
        for pair in nodes.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(TopologyError::InvalidTopology(format!(
                    "duplicate node id {}",
                    pair[0].id
                )));
            }
        }

        for node in &nodes {
            if node.num_devices == 0 {
                return Err(TopologyError::InvalidTopology(format!(
                    "node {} has no devices",
                    node.id
                )));
            }
            let bandwidths = [node.intra_bandwidth_gbps, node.inter_bandwidth_gbps];
            if bandwidths.iter().any(|bw| !bw.is_finite() || *bw <= 0.0) {
                return Err(TopologyError::InvalidTopology(format!(
                    "node {} has a non-positive bandwidth",
                    node.id
                )));
            }
        }

        Ok(Self { nodes })
    }

    /// Returns the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns all nodes in ascending id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Looks up a node by id.
    pub fn node(&self, node_id: usize) -> Option<&Node> {
        self.nodes
            .binary_search_by_key(&node_id, |n| n.id)
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Returns the total number of accelerators in the cluster.
    pub fn total_devices(&self) -> usize {
        self.nodes.iter().map(|n| n.num_devices).sum()
    }

    /// Returns the distinct device types present, sorted by name.
    pub fn device_types(&self) -> BTreeSet<DeviceType> {
        self.nodes.iter().map(|n| n.device_type.clone()).collect()
    }

    /// Iterates over the nodes carrying a given device type.
    pub fn nodes_of_type<'a>(
        &'a self,
        device_type: &'a DeviceType,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |n| &n.device_type == device_type)
    }

    /// Returns the number of accelerators of a given type.
    pub fn num_devices_of_type(&self, device_type: &DeviceType) -> usize {
        self.nodes_of_type(device_type).map(|n| n.num_devices).sum()
    }

    /// Returns the per-device memory (MB) on a node.
    pub fn device_memory_mb(&self, node_id: usize) -> Option<u64> {
        self.node(node_id).map(|n| n.device_memory_mb)
    }

    /// Returns the intra-node bandwidth (Gbit/s) of a node.
    pub fn intra_bandwidth(&self, node_id: usize) -> Option<f64> {
        self.node(node_id).map(|n| n.intra_bandwidth_gbps)
    }

    /// Returns the inter-node bandwidth (Gbit/s) of a node.
    pub fn inter_bandwidth(&self, node_id: usize) -> Option<f64> {
        self.node(node_id).map(|n| n.inter_bandwidth_gbps)
    }

    /// Lays out devices in rank order for a given device-type sequence.
    ///
    /// Ranks walk the sequence type by type; within one type, nodes in
    /// ascending id; within one node, devices by local index. Types absent
    /// from `node_sequence` contribute no ranks.
    pub fn rank_order(&self, node_sequence: &[DeviceType]) -> Result<Vec<Device>, TopologyError> {
        let mut seen = BTreeSet::new();
        let mut devices = Vec::with_capacity(self.total_devices());

        for device_type in node_sequence {
            if !seen.insert(device_type) {
                return Err(TopologyError::InvalidTopology(format!(
                    "device type {device_type} appears twice in the node sequence"
                )));
            }

            let mut found = false;
            for node in self.nodes_of_type(device_type) {
                found = true;
                devices.extend((0..node.num_devices).map(|local_index| Device {
                    node_id: node.id,
                    local_index,
                    device_type: device_type.clone(),
                }));
            }

            if !found {
                return Err(TopologyError::InvalidTopology(format!(
                    "device type {device_type} is not present in the cluster"
                )));
            }
        }

        Ok(devices)
    }

    /// Returns a human-readable summary of the cluster.
    pub fn summary(&self) -> String {
        let per_type: Vec<String> = self
            .device_types()
            .iter()
            .map(|t| format!("{}x {t}", self.num_devices_of_type(t)))
            .collect();
        format!(
            "Cluster: {} nodes, {} devices ({})",
            self.num_nodes(),
            self.total_devices(),
            per_type.join(", "),
        )
    }
}
