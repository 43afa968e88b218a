// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the search driver.

/// Errors that abort a search run.
///
/// Per-candidate lookup failures and infeasible candidates are not errors
/// at this level; they are counted in [`crate::SearchStats`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The configuration is unreadable or rejects a required value.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The cluster descriptors could not be loaded.
    #[error("topology error: {0}")]
    Topology(#[from] cluster_topology::TopologyError),

    /// The profiling directory could not be loaded.
    #[error("profile error: {0}")]
    Profile(#[from] profile_store::ProfileError),

    /// The planner hit a contract violation.
    #[error("planner error: {0}")]
    Planner(#[from] parallel_planner::PlannerError),

    /// The worker pool could not be started.
    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The report could not be serialised.
    #[error("report serialisation failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The report could not be written.
    #[error("failed to write '{path}': {source}")]
    OutputError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
