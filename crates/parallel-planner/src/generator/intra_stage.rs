// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-stage parallelism enumeration for one inter-stage plan.

use super::divisors;
use crate::{InterStagePlan, IntraStagePlan, LayerLoadBalancer, StagePerformance, StageStrategy};
use std::iter::FusedIterator;

/// Pull-based generator of [`IntraStagePlan`]s.
///
/// Every stage picks a tensor-parallel degree among the divisors of its
/// device count (up to `max_tp`), with `dp = devices / tp`. Stage choices
/// are combined as an odometer: stage 0 is the most significant digit,
/// the last stage turns fastest. The micro-batch size is the plan's; if
/// it exceeds `max_bs` the generator is empty.
///
/// Single-pass and single-consumer. Callers that prefer the explicit
/// protocol use [`has_next`](Self::has_next) before [`Iterator::next`];
/// `next` returns `None` once exhausted.
pub struct IntraStagePlanGenerator<'a> {
    stages: &'a StagePerformance<'a>,
    balancer: &'a LayerLoadBalancer<'a>,
    candidates: Vec<Vec<StageStrategy>>,
    cursor: Option<Vec<usize>>,
    next_index: usize,
}

impl<'a> IntraStagePlanGenerator<'a> {
    pub fn new(
        plan: &InterStagePlan,
        stages: &'a StagePerformance<'a>,
        balancer: &'a LayerLoadBalancer<'a>,
        max_tp: usize,
        max_bs: usize,
    ) -> Self {
        let candidates: Vec<Vec<StageStrategy>> = plan
            .device_groups
            .iter()
            .map(|group| {
                divisors(group.num_devices)
                    .into_iter()
                    .take_while(|&tp| tp <= max_tp)
                    .map(|tp| StageStrategy {
                        tp,
                        dp: group.num_devices / tp,
                    })
                    .collect()
            })
            .collect();

        let batch_fits = plan.batches.micro_batch_size <= max_bs;
        let cursor = (batch_fits && !candidates.is_empty() && candidates.iter().all(|c| !c.is_empty()))
            .then(|| vec![0; candidates.len()]);
        if cursor.is_none() {
            tracing::trace!(
                "plan #{}: no intra-stage candidates (micro-batch {}, max tp {max_tp}, max bs {max_bs})",
                plan.index,
                plan.batches.micro_batch_size,
            );
        }

        Self {
            stages,
            balancer,
            candidates,
            cursor,
            next_index: 0,
        }
    }

    /// Returns `true` if another candidate is available.
    pub fn has_next(&self) -> bool {
        self.cursor.is_some()
    }

    /// Candidate strategies of every stage.
    pub fn stage_candidates(&self) -> &[Vec<StageStrategy>] {
        &self.candidates
    }

    /// Turns the odometer by one; clears the cursor after the last digit.
    fn advance(&mut self) {
        let Some(cursor) = self.cursor.as_mut() else {
            return;
        };
        for stage in (0..cursor.len()).rev() {
            cursor[stage] += 1;
            if cursor[stage] < self.candidates[stage].len() {
                return;
            }
            cursor[stage] = 0;
        }
        self.cursor = None;
    }
}

impl Iterator for IntraStagePlanGenerator<'_> {
    type Item = IntraStagePlan;

    fn next(&mut self) -> Option<IntraStagePlan> {
        let cursor = self.cursor.as_ref()?;
        let strategies: Vec<StageStrategy> = cursor
            .iter()
            .zip(&self.candidates)
            .map(|(&choice, options)| options[choice])
            .collect();

        let layer_partition = self.balancer.partition(self.stages, &strategies);
        let num_repartition = IntraStagePlan::count_repartitions(&strategies);
        let plan = IntraStagePlan {
            index: self.next_index,
            strategies,
            layer_partition,
            num_repartition,
        };

        self.next_index += 1;
        self.advance();
        Some(plan)
    }
}

impl FusedIterator for IntraStagePlanGenerator<'_> {}
