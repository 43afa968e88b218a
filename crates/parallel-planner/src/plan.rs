// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Plan value types: the search space the generators walk.
//!
//! An [`InterStagePlan`] fixes the pipeline shape (which devices form each
//! stage and how the global batch is cut into micro-batches). An
//! [`IntraStagePlan`] fixes what happens inside each stage (tensor and data
//! parallel degrees) and how many layers each stage hosts.

use crate::PlannerError;
use cluster_topology::DeviceType;
use std::fmt;
use std::ops::Range;

/// How the global batch is cut into pipeline micro-batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct BatchSplit {
    pub num_micro_batches: usize,
    pub micro_batch_size: usize,
}

impl BatchSplit {
    /// Returns the global batch size this split reconstructs.
    pub fn global_batch_size(&self) -> usize {
        self.num_micro_batches * self.micro_batch_size
    }
}

impl fmt::Display for BatchSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.num_micro_batches, self.micro_batch_size)
    }
}

/// The devices of one pipeline stage: a contiguous range of ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct DeviceGroup {
    pub first_rank: usize,
    pub num_devices: usize,
}

impl DeviceGroup {
    /// Returns the ranks covered by this group.
    pub fn ranks(&self) -> Range<usize> {
        self.first_rank..self.first_rank + self.num_devices
    }
}

impl fmt::Display for DeviceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranks = self.ranks();
        write!(f, "[{}..{})", ranks.start, ranks.end)
    }
}

/// Pipeline shape of one candidate.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct InterStagePlan {
    /// Zero-based position in generation order.
    pub index: usize,
    /// Order in which device types receive ranks.
    pub node_sequence: Vec<DeviceType>,
    /// One group per pipeline stage, laid back to back from rank 0.
    pub device_groups: Vec<DeviceGroup>,
    pub batches: BatchSplit,
}

impl InterStagePlan {
    /// Builds a plan whose groups have the given sizes, in rank order.
    pub fn from_group_sizes(
        index: usize,
        node_sequence: Vec<DeviceType>,
        sizes: &[usize],
        batches: BatchSplit,
    ) -> Self {
        let mut first_rank = 0;
        let device_groups = sizes
            .iter()
            .map(|&num_devices| {
                let group = DeviceGroup {
                    first_rank,
                    num_devices,
                };
                first_rank += num_devices;
                group
            })
            .collect();
        Self {
            index,
            node_sequence,
            device_groups,
            batches,
        }
    }

    /// Returns the pipeline depth.
    pub fn num_stages(&self) -> usize {
        self.device_groups.len()
    }

    /// Returns the number of devices the plan uses.
    pub fn total_devices(&self) -> usize {
        self.device_groups.iter().map(|g| g.num_devices).sum()
    }

    /// Returns the device count of every stage.
    pub fn group_sizes(&self) -> Vec<usize> {
        self.device_groups.iter().map(|g| g.num_devices).collect()
    }

    /// Validates the plan.
    ///
    /// Checks:
    /// - At least one stage, no empty group.
    /// - Groups are contiguous from rank 0 (hence disjoint).
    /// - The batch split is non-degenerate.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.device_groups.is_empty() {
            return Err(PlannerError::InvalidPlan(format!(
                "plan {} has no stages",
                self.index
            )));
        }

        let mut next_rank = 0;
        for (stage, group) in self.device_groups.iter().enumerate() {
            if group.num_devices == 0 {
                return Err(PlannerError::InvalidPlan(format!(
                    "plan {}: stage {stage} has no devices",
                    self.index
                )));
            }
            if group.first_rank != next_rank {
                return Err(PlannerError::InvalidPlan(format!(
                    "plan {}: stage {stage} starts at rank {}, expected {next_rank}",
                    self.index, group.first_rank
                )));
            }
            next_rank += group.num_devices;
        }

        if self.batches.num_micro_batches == 0 || self.batches.micro_batch_size == 0 {
            return Err(PlannerError::InvalidPlan(format!(
                "plan {}: degenerate batch split {}",
                self.index, self.batches
            )));
        }

        Ok(())
    }

    /// Returns a human-readable summary of the plan.
    pub fn summary(&self) -> String {
        let sequence: Vec<&str> = self.node_sequence.iter().map(|t| t.name()).collect();
        format!(
            "Plan #{}: {} stages, sequence [{}], group sizes {:?}, batches {}",
            self.index,
            self.num_stages(),
            sequence.join(", "),
            self.group_sizes(),
            self.batches,
        )
    }
}

/// Tensor and data parallel degree of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct StageStrategy {
    pub tp: usize,
    pub dp: usize,
}

impl StageStrategy {
    /// Returns the number of devices this strategy occupies.
    pub fn num_devices(&self) -> usize {
        self.tp * self.dp
    }
}

/// Printed as `(dp, tp)`.
impl fmt::Display for StageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dp, self.tp)
    }
}

/// Per-stage parallelism and layer assignment for one inter-stage plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IntraStagePlan {
    /// Zero-based position within its inter-stage plan's candidates.
    pub index: usize,
    pub strategies: Vec<StageStrategy>,
    /// Number of layers hosted by each stage.
    pub layer_partition: Vec<usize>,
    /// Stage boundaries where the tensor-parallel degree changes.
    pub num_repartition: usize,
}

impl IntraStagePlan {
    /// Counts the adjacent stages whose tensor-parallel degrees differ.
    pub fn count_repartitions(strategies: &[StageStrategy]) -> usize {
        strategies.windows(2).filter(|w| w[0].tp != w[1].tp).count()
    }

    /// Returns the total number of layers assigned.
    pub fn total_layers(&self) -> usize {
        self.layer_partition.iter().sum()
    }

    /// Returns the layer range of every stage.
    pub fn layer_ranges(&self) -> Vec<Range<usize>> {
        layer_ranges(&self.layer_partition)
    }

    /// Checks this plan against its inter-stage plan and the model depth.
    pub fn validate(&self, inter: &InterStagePlan, num_layers: usize) -> Result<(), PlannerError> {
        check_assignment(inter, &self.strategies, &self.layer_partition, num_layers)?;
        let expected = Self::count_repartitions(&self.strategies);
        if self.num_repartition != expected {
            return Err(PlannerError::InvalidPlan(format!(
                "num_repartition is {}, strategies imply {expected}",
                self.num_repartition
            )));
        }
        Ok(())
    }
}

/// Converts per-stage layer counts into contiguous layer ranges.
pub fn layer_ranges(layer_partition: &[usize]) -> Vec<Range<usize>> {
    let mut start = 0;
    layer_partition
        .iter()
        .map(|&count| {
            let range = start..start + count;
            start += count;
            range
        })
        .collect()
}

/// Checks that strategies and a layer partition fit an inter-stage plan.
///
/// One strategy and one layer count per stage, `tp · dp` equal to the
/// stage's device count, and layer counts summing to `num_layers`.
pub(crate) fn check_assignment(
    inter: &InterStagePlan,
    strategies: &[StageStrategy],
    layer_partition: &[usize],
    num_layers: usize,
) -> Result<(), PlannerError> {
    let stages = inter.num_stages();
    if strategies.len() != stages || layer_partition.len() != stages {
        return Err(PlannerError::InvalidPlan(format!(
            "{} strategies and {} layer counts for {stages} stages",
            strategies.len(),
            layer_partition.len()
        )));
    }

    for (stage, (strategy, group)) in strategies.iter().zip(&inter.device_groups).enumerate() {
        if strategy.tp == 0 || strategy.num_devices() != group.num_devices {
            return Err(PlannerError::InvalidPlan(format!(
                "stage {stage}: tp={} x dp={} does not cover {} devices",
                strategy.tp, strategy.dp, group.num_devices
            )));
        }
    }

    let assigned: usize = layer_partition.iter().sum();
    if assigned != num_layers {
        return Err(PlannerError::InvalidPlan(format!(
            "layer partition {layer_partition:?} assigns {assigned} layers, model has {num_layers}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(sizes: &[usize]) -> InterStagePlan {
        InterStagePlan::from_group_sizes(
            0,
            vec![DeviceType::new("A100")],
            sizes,
            BatchSplit {
                num_micro_batches: 2,
                micro_batch_size: 8,
            },
        )
    }

    fn strategy(tp: usize, dp: usize) -> StageStrategy {
        StageStrategy { tp, dp }
    }

    #[test]
    fn test_groups_back_to_back() {
        let p = plan(&[2, 3, 1]);
        assert_eq!(p.device_groups[1].ranks(), 2..5);
        assert_eq!(p.device_groups[2].ranks(), 5..6);
        assert_eq!(p.total_devices(), 6);
        assert_eq!(p.num_stages(), 3);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_group() {
        assert!(plan(&[2, 0]).validate().is_err());
        assert!(plan(&[]).validate().is_err());
    }

    #[test]
    fn test_validate_gap_between_groups() {
        let mut p = plan(&[2, 2]);
        p.device_groups[1].first_rank = 3;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }

    #[test]
    fn test_count_repartitions() {
        let s = [strategy(1, 4), strategy(2, 2), strategy(2, 2), strategy(4, 1)];
        assert_eq!(IntraStagePlan::count_repartitions(&s), 2);
        assert_eq!(IntraStagePlan::count_repartitions(&s[..1]), 0);
    }

    #[test]
    fn test_layer_ranges() {
        assert_eq!(layer_ranges(&[2, 0, 3]), vec![0..2, 2..2, 2..5]);
    }

    #[test]
    fn test_intra_validate() {
        let inter = plan(&[4, 2]);
        let good = IntraStagePlan {
            index: 0,
            strategies: vec![strategy(2, 2), strategy(1, 2)],
            layer_partition: vec![3, 1],
            num_repartition: 1,
        };
        assert!(good.validate(&inter, 4).is_ok());
        assert!(good.validate(&inter, 5).is_err());

        let mut bad_degree = good.clone();
        bad_degree.strategies[0] = strategy(2, 1);
        assert!(bad_degree.validate(&inter, 4).is_err());

        let mut bad_count = good;
        bad_count.num_repartition = 0;
        assert!(bad_count.validate(&inter, 4).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(strategy(2, 4).to_string(), "(4, 2)");
        assert_eq!(plan(&[1]).batches.to_string(), "2x8");
        assert!(plan(&[2, 2]).summary().contains("[2, 2]"));
    }
}
