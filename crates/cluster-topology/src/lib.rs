// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # cluster-topology
//!
//! Describes a heterogeneous accelerator cluster as seen by the strategy
//! search:
//!
//! - [`DeviceType`]: an accelerator class, used as a lookup key.
//! - [`Node`]: one host: device type, device count, memory, bandwidth.
//! - [`ClusterTopology`]: the validated, immutable set of nodes, with
//!   derived queries (total devices, devices per type, rank order).
//! - [`TopologyLoader`]: builds a topology from a hostfile + clusterfile.
//!
//! # Example
//! ```no_run
//! use cluster_topology::TopologyLoader;
//! use std::path::Path;
//!
//! let cluster = TopologyLoader::load(Path::new("./hostfile"), Path::new("./clusterfile.json")).unwrap();
//! for node in cluster.nodes() {
//!     println!("  {}", node.summary());
//! }
//! ```

mod device;
mod error;
mod loader;
mod topology;

pub use device::{Device, DeviceType};
pub use error::TopologyError;
pub use loader::{HostEntry, NodeSpec, TopologyLoader};
pub use topology::{ClusterTopology, Node};
