// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for cluster topology loading.

/// Errors that can occur when loading or querying a cluster topology.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// A descriptor file could not be read.
    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The clusterfile JSON is malformed.
    #[error("failed to parse clusterfile: {0}")]
    ClusterFileParse(#[from] serde_json::Error),

    /// A hostfile line does not follow `<ip> slots=<n>`.
    #[error("hostfile line {line}: {detail}")]
    MalformedHostLine { line: usize, detail: String },

    /// A host listed in the hostfile has no clusterfile entry.
    #[error("host '{ip}' (node {node_id}) is not described in the clusterfile")]
    UnknownHost { ip: String, node_id: usize },

    /// The topology is structurally invalid (e.g., no nodes).
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}
