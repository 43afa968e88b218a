// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the parallelization planner.

use cluster_topology::DeviceType;

/// Errors that can occur while generating or costing a candidate.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// A required profiling point was never measured.
    #[error(transparent)]
    LookupFailure(#[from] profile_store::LookupFailure),

    /// A stage's layers do not fit the memory of one of its devices.
    #[error(
        "stage {stage} needs {required_mb:.0} MB per {device_type} device, {available_mb} MB available"
    )]
    OutOfMemory {
        stage: usize,
        device_type: DeviceType,
        required_mb: f64,
        available_mb: u64,
    },

    /// A plan violates a structural invariant (caller contract violation).
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The model description is unusable.
    #[error("invalid model configuration: {0}")]
    InvalidModel(String),

    /// The plan could not be laid out on the cluster.
    #[error("topology error: {0}")]
    Topology(#[from] cluster_topology::TopologyError),
}

impl PlannerError {
    /// Returns `true` for a missing profiling point.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::LookupFailure(_))
    }

    /// Returns `true` if the candidate can never run (memory).
    pub fn is_infeasible(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Returns `true` if the search may drop the candidate and continue.
    pub fn is_recoverable(&self) -> bool {
        self.is_lookup_failure() || self.is_infeasible()
    }
}
