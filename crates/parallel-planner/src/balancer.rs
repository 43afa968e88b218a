// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Throughput-proportional layer assignment.

use crate::{ModelConfig, PlannerError, StagePerformance, StageStrategy};

/// Splits model layers across stages in proportion to stage throughput.
///
/// A stage's weight is `dp / Σ layer_compute_ms` of its slowest device
/// type at the stage's `(tp, micro_batch_size)` point. When any stage has
/// no profiled point, every stage is weighted by its device count instead;
/// the cost estimator reports the missing point separately.
#[derive(Debug, Clone, Copy)]
pub struct LayerLoadBalancer<'a> {
    model: &'a ModelConfig,
}

impl<'a> LayerLoadBalancer<'a> {
    pub fn new(model: &'a ModelConfig) -> Self {
        Self { model }
    }

    /// Returns the number of layers each stage hosts.
    pub fn partition(&self, stages: &StagePerformance<'_>, strategies: &[StageStrategy]) -> Vec<usize> {
        let weights = self.stage_weights(stages, strategies);
        partition_proportional(&weights, self.model.num_layers)
    }

    /// Relative throughput of every stage.
    pub fn stage_weights(&self, stages: &StagePerformance<'_>, strategies: &[StageStrategy]) -> Vec<f64> {
        let bs = stages.plan().batches.micro_batch_size;

        let profiled = strategies
            .iter()
            .enumerate()
            .map(|(stage, strategy)| {
                let profile = stages.stage_profile(stage, strategy.tp, bs)?;
                Ok(strategy.dp as f64 / profile.bottleneck().total_compute_ms())
            })
            .collect::<Result<Vec<f64>, PlannerError>>();

        match profiled {
            Ok(weights) => weights,
            Err(missing) => {
                tracing::trace!("weighting stages by device count: {missing}");
                strategies.iter().map(|s| s.num_devices() as f64).collect()
            }
        }
    }
}

/// Splits `num_layers` proportionally to `weights`.
///
/// Each stage gets `floor(L · w / W)` layers; the remainder goes one layer
/// at a time to stages 0, 1, 2, … When there are no more stages than
/// layers, empty stages then take single layers from the largest stage
/// (lowest index among equals). If any weight is non-finite or not
/// positive, all stages are weighted equally.
pub fn partition_proportional(weights: &[f64], num_layers: usize) -> Vec<usize> {
    let stages = weights.len();
    if stages == 0 {
        return Vec::new();
    }

    let usable = weights.iter().all(|w| w.is_finite() && *w > 0.0);
    let uniform = vec![1.0; stages];
    let weights = if usable { weights } else { &uniform[..] };
    let total: f64 = weights.iter().sum();

    let mut counts: Vec<usize> = weights
        .iter()
        .map(|w| (num_layers as f64 * w / total).floor() as usize)
        .collect();

    let mut assigned: usize = counts.iter().sum();
    // Rounding can overshoot by a hair on huge inputs.
    while assigned > num_layers {
        let largest = largest_stage(&counts);
        counts[largest] -= 1;
        assigned -= 1;
    }
    for stage in (0..stages).cycle().take(num_layers - assigned) {
        counts[stage] += 1;
    }

    if stages <= num_layers {
        while let Some(empty) = counts.iter().position(|&c| c == 0) {
            let largest = largest_stage(&counts);
            counts[largest] -= 1;
            counts[empty] += 1;
        }
    }

    counts
}

/// Index of the largest count; the lowest index wins ties.
fn largest_stage(counts: &[usize]) -> usize {
    (0..counts.len()).fold(0, |best, i| if counts[i] > counts[best] { i } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cluster, gpt, plan, profiles};
    use proptest::prelude::*;

    #[test]
    fn test_single_stage_gets_everything() {
        assert_eq!(partition_proportional(&[3.5], 24), vec![24]);
    }

    #[test]
    fn test_proportional_split() {
        assert_eq!(partition_proportional(&[1.0, 3.0], 8), vec![2, 6]);
        assert_eq!(partition_proportional(&[1.0, 1.0, 1.0], 9), vec![3, 3, 3]);
    }

    #[test]
    fn test_remainder_goes_to_low_indices() {
        assert_eq!(partition_proportional(&[1.0, 1.0, 1.0], 5), vec![2, 2, 1]);
        assert_eq!(partition_proportional(&[1.0; 4], 7), vec![2, 2, 2, 1]);
    }

    #[test]
    fn test_every_stage_gets_a_layer() {
        // Floor gives [0, 2]; remainder 1 goes to stage 0.
        assert_eq!(partition_proportional(&[0.01, 10.0], 3), vec![1, 2]);
        // Floor gives [0, 0, 4]; stage 0 gets remainder, stage 1 borrows from 2.
        assert_eq!(partition_proportional(&[0.001, 0.001, 10.0], 5), vec![1, 1, 3]);
    }

    #[test]
    fn test_more_stages_than_layers() {
        assert_eq!(partition_proportional(&[1.0, 1.0, 1.0], 2), vec![1, 1, 0]);
    }

    #[test]
    fn test_bad_weights_are_uniform() {
        assert_eq!(partition_proportional(&[f64::NAN, 1.0], 4), vec![2, 2]);
        assert_eq!(partition_proportional(&[0.0, 1.0], 4), vec![2, 2]);
        assert_eq!(partition_proportional(&[f64::INFINITY, 1.0], 3), vec![2, 1]);
    }

    #[test]
    fn test_empty() {
        assert!(partition_proportional(&[], 4).is_empty());
        assert_eq!(partition_proportional(&[1.0, 2.0], 0), vec![0, 0]);
    }

    #[test]
    fn test_faster_stage_gets_more_layers() {
        let topology = cluster(&[("A", 2), ("B", 2)]);
        // B is four times slower per layer.
        let store = profiles(&[("A", 1, 8, 1.0), ("B", 1, 8, 4.0)], 8);
        let model = gpt(8);
        let p = plan(&["A", "B"], &[2, 2], 2, 8);
        let stages = StagePerformance::new(&model, &store, &topology, &p).unwrap();
        let balancer = LayerLoadBalancer::new(&model);

        let strategies = [StageStrategy { tp: 1, dp: 2 }, StageStrategy { tp: 1, dp: 2 }];
        // Shares 6.4 and 1.6 floor to [6, 1]; stage 0 takes the remainder.
        assert_eq!(balancer.partition(&stages, &strategies), vec![7, 1]);
    }

    #[test]
    fn test_weights_use_plan_micro_batch_size() {
        let topology = cluster(&[("A", 2), ("B", 2)]);
        // Only bs=8 is profiled; a 4 x 8 split must still hit it.
        let store = profiles(&[("A", 1, 8, 1.0), ("B", 1, 8, 4.0)], 8);
        let model = gpt(8);
        let strategies = [StageStrategy { tp: 1, dp: 2 }, StageStrategy { tp: 1, dp: 2 }];
        let balancer = LayerLoadBalancer::new(&model);

        for num_micro_batches in [1, 2, 4] {
            let p = plan(&["A", "B"], &[2, 2], num_micro_batches, 8);
            let stages = StagePerformance::new(&model, &store, &topology, &p).unwrap();
            assert_eq!(balancer.stage_weights(&stages, &strategies), vec![2.0 / 8.0, 2.0 / 32.0]);
            assert_eq!(balancer.partition(&stages, &strategies), vec![7, 1]);
        }
    }

    #[test]
    fn test_fallback_to_device_count() {
        let topology = cluster(&[("A", 4)]);
        let store = profiles(&[("A", 1, 8, 1.0)], 6);
        let model = gpt(6);
        let p = plan(&["A"], &[1, 2], 2, 8);
        let stages = StagePerformance::new(&model, &store, &topology, &p).unwrap();
        let balancer = LayerLoadBalancer::new(&model);

        // tp=2 is not profiled, so weights are device counts 1 : 2.
        let strategies = [StageStrategy { tp: 1, dp: 1 }, StageStrategy { tp: 2, dp: 1 }];
        assert_eq!(balancer.stage_weights(&stages, &strategies), vec![1.0, 2.0]);
        assert_eq!(balancer.partition(&stages, &strategies), vec![2, 4]);
    }

    proptest! {
        #[test]
        fn prop_partition_sums_to_layers(
            weights in prop::collection::vec(prop_oneof![
                0.001f64..1000.0,
                Just(0.0),
                Just(f64::NAN),
            ], 1..8),
            num_layers in 0usize..64,
        ) {
            let counts = partition_proportional(&weights, num_layers);
            prop_assert_eq!(counts.len(), weights.len());
            prop_assert_eq!(counts.iter().sum::<usize>(), num_layers);
            if weights.len() <= num_layers {
                prop_assert!(counts.iter().all(|&c| c >= 1));
            }
        }
    }
}
