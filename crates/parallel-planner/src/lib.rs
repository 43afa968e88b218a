// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # parallel-planner
//!
//! Search space and cost model for distributed training on heterogeneous
//! clusters. Purely algorithmic: inputs are an already-loaded
//! [`ClusterTopology`](cluster_topology::ClusterTopology) and
//! [`ProfileStore`](profile_store::ProfileStore).
//!
//! # Pipeline
//!
//! | Step | Type | Produces |
//! |---|---|---|
//! | 1 | [`InterStagePlanGenerator`] | stage device groups + batch split |
//! | 2 | [`StagePerformance`] | rank placement, stage-scoped profile lookups |
//! | 3 | [`IntraStagePlanGenerator`] | per-stage (tp, dp) + layer partition |
//! | 4 | [`LayerLoadBalancer`] | throughput-proportional layer counts |
//! | 5 | [`HeteroCostEstimator`] | per-iteration cost, or a dropped candidate |
//!
//! # Example
//! ```no_run
//! use parallel_planner::*;
//! # fn run(
//! #     topology: &cluster_topology::ClusterTopology,
//! #     profiles: &profile_store::ProfileStore,
//! #     model: &ModelConfig,
//! # ) -> Result<(), PlannerError> {
//! let volume = ModelVolume::new(model, &profiles.model().parameters_per_layer_bytes);
//! let estimator = HeteroCostEstimator::new(profiles, model, volume, topology);
//! let balancer = LayerLoadBalancer::new(model);
//!
//! let plans = InterStagePlanGenerator::new(
//!     topology.device_types(), topology.total_devices(), 16, model.num_layers, 1, 2,
//! );
//! for inter in plans {
//!     let stages = StagePerformance::new(model, profiles, topology, &inter)?;
//!     for intra in IntraStagePlanGenerator::new(&inter, &stages, &balancer, 4, 8) {
//!         match estimator.get_cost(&inter, &intra.strategies, &intra.layer_partition, stages.device_placement()) {
//!             Ok(ms) => println!("{} -> {ms:.2} ms", inter.summary()),
//!             Err(e) if e.is_recoverable() => continue,
//!             Err(e) => return Err(e),
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod balancer;
mod cost;
mod error;
pub mod generator;
mod model;
mod plan;
mod stage;

#[cfg(test)]
mod testing;

pub use balancer::{partition_proportional, LayerLoadBalancer};
pub use cost::{transfer_ms, CostBreakdown, HeteroCostEstimator, StageCost};
pub use error::PlannerError;
pub use generator::inter_stage::InterStagePlanGenerator;
pub use generator::intra_stage::IntraStagePlanGenerator;
pub use model::{ModelConfig, ModelVolume, ACTIVATION_BYTES_PER_ELEMENT};
pub use plan::{layer_ranges, BatchSplit, DeviceGroup, InterStagePlan, IntraStagePlan, StageStrategy};
pub use stage::{RankDeviceMap, StagePerformance, StageProfile};
