// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Topology loading from a hostfile + clusterfile pair.
//!
//! # Hostfile
//! One node per line, `#` starts a comment:
//! ```text
//! 10.0.0.1 slots=4
//! 10.0.0.2 slots=8
//! ```
//! Node ids are assigned in line order starting at 0.
//!
//! # Clusterfile
//! A JSON object keyed by host address:
//! ```json
//! {
//!   "10.0.0.1": {
//!     "instance_type": "A100",
//!     "memory": 40,
//!     "intra_bandwidth": 600,
//!     "inter_bandwidth": 100
//!   }
//! }
//! ```
//! `memory` is per-device GB; bandwidths are Gbit/s.

use crate::{ClusterTopology, DeviceType, Node, TopologyError};
use std::collections::HashMap;
use std::path::Path;

/// One hostfile entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Host address.
    pub ip: String,
    /// Number of accelerators (`slots=`).
    pub num_devices: usize,
}

/// One clusterfile entry, describing the hardware behind a host address.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeSpec {
    /// Accelerator class name (e.g., `"A100"`).
    pub instance_type: String,
    /// Per-device memory in GB.
    pub memory: u64,
    /// Intra-node bandwidth in Gbit/s.
    pub intra_bandwidth: f64,
    /// Inter-node bandwidth in Gbit/s.
    pub inter_bandwidth: f64,
}

/// Loads a [`ClusterTopology`] from descriptor files.
///
/// # Example
/// ```no_run
/// use cluster_topology::TopologyLoader;
/// use std::path::Path;
///
/// let cluster = TopologyLoader::load(Path::new("hostfile"), Path::new("clusterfile.json")).unwrap();
/// println!("{}", cluster.summary());
/// ```
pub struct TopologyLoader;

impl TopologyLoader {
    /// Reads both descriptor files and builds the topology.
    pub fn load(hostfile: &Path, clusterfile: &Path) -> Result<ClusterTopology, TopologyError> {
        let hosts = Self::parse_hostfile(&read(hostfile)?)?;
        let specs = Self::parse_clusterfile(&read(clusterfile)?)?;
        let topology = Self::from_entries(&hosts, &specs)?;
        tracing::info!("{}", topology.summary());
        Ok(topology)
    }

    /// Parses hostfile text into entries, in line order.
    pub fn parse_hostfile(content: &str) -> Result<Vec<HostEntry>, TopologyError> {
        let mut hosts = Vec::new();

        for (i, raw) in content.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let ip = parts.next().unwrap_or_default().to_string();
            let slots = parts.next().ok_or_else(|| TopologyError::MalformedHostLine {
                line: line_no,
                detail: format!("missing 'slots=' after host '{ip}'"),
            })?;
            if let Some(extra) = parts.next() {
                return Err(TopologyError::MalformedHostLine {
                    line: line_no,
                    detail: format!("unexpected token '{extra}'"),
                });
            }

            let count = slots
                .strip_prefix("slots=")
                .ok_or_else(|| TopologyError::MalformedHostLine {
                    line: line_no,
                    detail: format!("expected 'slots=<n>', got '{slots}'"),
                })?;
            let num_devices: usize =
                count.parse().map_err(|_| TopologyError::MalformedHostLine {
                    line: line_no,
                    detail: format!("slot count '{count}' is not a number"),
                })?;
            if num_devices == 0 {
                return Err(TopologyError::MalformedHostLine {
                    line: line_no,
                    detail: "slot count must be positive".into(),
                });
            }

            hosts.push(HostEntry { ip, num_devices });
        }

        if hosts.is_empty() {
            return Err(TopologyError::InvalidTopology(
                "hostfile lists no hosts".into(),
            ));
        }
        Ok(hosts)
    }

    /// Parses clusterfile JSON into a map from host address to spec.
    pub fn parse_clusterfile(content: &str) -> Result<HashMap<String, NodeSpec>, TopologyError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Combines parsed hostfile and clusterfile entries.
    pub fn from_entries(
        hosts: &[HostEntry],
        specs: &HashMap<String, NodeSpec>,
    ) -> Result<ClusterTopology, TopologyError> {
        let mut nodes = Vec::with_capacity(hosts.len());

        for (node_id, host) in hosts.iter().enumerate() {
            let spec = specs.get(&host.ip).ok_or_else(|| TopologyError::UnknownHost {
                ip: host.ip.clone(),
                node_id,
            })?;

            nodes.push(Node {
                id: node_id,
                ip: host.ip.clone(),
                device_type: spec.instance_type.parse::<DeviceType>()?,
                num_devices: host.num_devices,
                device_memory_mb: spec.memory * 1024,
                intra_bandwidth_gbps: spec.intra_bandwidth,
                inter_bandwidth_gbps: spec.inter_bandwidth,
            });
        }

        ClusterTopology::new(nodes)
    }
}

fn read(path: &Path) -> Result<String, TopologyError> {
    std::fs::read_to_string(path).map_err(|source| TopologyError::ReadError {
        path: path.display().to_string(),
        source,
    })
}
