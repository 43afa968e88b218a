// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline-shape enumeration.
//!
//! Plans come out ordered by stage count, then node sequence, then group
//! sizes (lexicographic), then batch split (ascending micro-batch count).
//! Group sizes may deviate from the mean group size by at most the
//! variance bound; node sequences are capped at `max_permute_len` and
//! permuted in place as the cursor moves.

use super::{divisors, next_permutation};
use crate::{BatchSplit, InterStagePlan};
use cluster_topology::DeviceType;
use std::collections::BTreeSet;
use std::iter::FusedIterator;

/// Lazily enumerates [`InterStagePlan`]s. Single pass, not restartable.
///
/// # Example
/// ```
/// use parallel_planner::InterStagePlanGenerator;
/// use cluster_topology::DeviceType;
///
/// let types = [DeviceType::new("A100")].into_iter().collect();
/// let plans: Vec<_> = InterStagePlanGenerator::new(types, 4, 16, 4, 0, 1).collect();
/// assert!(plans.iter().any(|p| p.num_stages() == 1));
/// ```
#[derive(Debug, Clone)]
pub struct InterStagePlanGenerator {
    device_types: Vec<DeviceType>,
    max_permute_len: usize,
    num_devices: usize,
    max_stages: usize,
    variance: usize,
    splits: Vec<BatchSplit>,
    cursor: Option<Cursor>,
    next_index: usize,
}

/// Position of the next plan to emit.
#[derive(Debug, Clone)]
struct Cursor {
    num_stages: usize,
    sequence: NodeSequence,
    sizes: Vec<usize>,
    split: usize,
}

/// One permutation of the device types and its position in the cap.
#[derive(Debug, Clone)]
struct NodeSequence {
    types: Vec<DeviceType>,
    rank: usize,
}

impl InterStagePlanGenerator {
    pub fn new(
        device_types: BTreeSet<DeviceType>,
        num_devices: usize,
        global_batch_size: usize,
        num_layers: usize,
        variance: usize,
        max_permute_len: usize,
    ) -> Self {
        let splits = divisors(global_batch_size)
            .into_iter()
            .map(|num_micro_batches| BatchSplit {
                num_micro_batches,
                micro_batch_size: global_batch_size / num_micro_batches,
            })
            .collect::<Vec<_>>();

        let mut generator = Self {
            device_types: device_types.into_iter().collect(),
            max_permute_len,
            num_devices,
            max_stages: num_devices.min(num_layers),
            variance,
            splits,
            cursor: None,
            next_index: 0,
        };
        if !generator.splits.is_empty() {
            generator.cursor = generator.grouping_from(1, generator.first_sequence());
        }

        tracing::debug!(
            "inter-stage space: {} devices, up to {} stages, {} device types (up to {} orders), {} batch splits",
            num_devices,
            generator.max_stages,
            generator.device_types.len(),
            max_permute_len,
            generator.splits.len(),
        );
        generator
    }

    /// Node sequences visited for every stage count, in order.
    ///
    /// Permutations are produced on demand; nothing is materialized.
    pub fn node_sequences(&self) -> impl Iterator<Item = Vec<DeviceType>> + '_ {
        std::iter::successors(self.first_sequence(), |s| self.next_sequence(s)).map(|s| s.types)
    }

    /// Batch splits tried for every grouping, in order.
    pub fn batch_splits(&self) -> &[BatchSplit] {
        &self.splits
    }

    /// Returns `true` once every plan has been emitted.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }

    fn compositions(&self, num_stages: usize) -> Compositions {
        Compositions::new(self.num_devices, num_stages, self.variance)
    }

    /// Sorted type order, or `None` when there is nothing to permute.
    fn first_sequence(&self) -> Option<NodeSequence> {
        if self.device_types.is_empty() || self.max_permute_len == 0 {
            return None;
        }
        Some(NodeSequence {
            types: self.device_types.clone(),
            rank: 0,
        })
    }

    /// Next lexicographic permutation within the cap.
    fn next_sequence(&self, current: &NodeSequence) -> Option<NodeSequence> {
        if current.rank + 1 >= self.max_permute_len {
            return None;
        }
        let mut types = current.types.clone();
        next_permutation(&mut types).then_some(NodeSequence {
            types,
            rank: current.rank + 1,
        })
    }

    /// First grouping at or after `(num_stages, sequence)`.
    fn grouping_from(&self, mut num_stages: usize, mut sequence: Option<NodeSequence>) -> Option<Cursor> {
        while num_stages <= self.max_stages {
            if let Some(sequence) = sequence.take() {
                if let Some(sizes) = self.compositions(num_stages).first() {
                    return Some(Cursor {
                        num_stages,
                        sequence,
                        sizes,
                        split: 0,
                    });
                }
            }
            // Composition existence does not depend on the sequence.
            num_stages += 1;
            sequence = self.first_sequence();
        }
        None
    }

    fn advance(&self, mut cursor: Cursor) -> Option<Cursor> {
        cursor.split += 1;
        if cursor.split < self.splits.len() {
            return Some(cursor);
        }
        cursor.split = 0;
        if self.compositions(cursor.num_stages).advance(&mut cursor.sizes) {
            return Some(cursor);
        }
        self.grouping_from(cursor.num_stages, self.next_sequence(&cursor.sequence))
    }
}

impl Iterator for InterStagePlanGenerator {
    type Item = InterStagePlan;

    fn next(&mut self) -> Option<InterStagePlan> {
        let cursor = self.cursor.take()?;
        let plan = InterStagePlan::from_group_sizes(
            self.next_index,
            cursor.sequence.types.clone(),
            &cursor.sizes,
            self.splits[cursor.split],
        );
        self.next_index += 1;
        self.cursor = self.advance(cursor);
        Some(plan)
    }
}

impl FusedIterator for InterStagePlanGenerator {}

/// Ordered compositions of `total` into parts within `[lo, hi]`.
#[derive(Debug, Clone, Copy)]
struct Compositions {
    total: usize,
    parts: usize,
    lo: usize,
    hi: usize,
}

impl Compositions {
    /// Bounds keep `|size · parts − total| ≤ variance · parts`.
    fn new(total: usize, parts: usize, variance: usize) -> Self {
        let slack = variance.saturating_mul(parts);
        let lo = if slack >= total {
            1
        } else {
            (total - slack).div_ceil(parts).max(1)
        };
        let hi = (total.saturating_add(slack) / parts).min(total);
        Self {
            total,
            parts,
            lo,
            hi,
        }
    }

    fn feasible(&self, count: usize, remaining: usize) -> bool {
        count * self.lo <= remaining && remaining <= count * self.hi
    }

    fn first(&self) -> Option<Vec<usize>> {
        if self.parts == 0 || self.lo > self.hi || !self.feasible(self.parts, self.total) {
            return None;
        }
        let mut sizes = vec![0; self.parts];
        self.fill(&mut sizes, self.total);
        Some(sizes)
    }

    /// Writes the smallest composition of `remaining` into `slots`.
    fn fill(&self, slots: &mut [usize], mut remaining: usize) {
        let count = slots.len();
        for (i, slot) in slots.iter_mut().enumerate() {
            let after = count - i - 1;
            let size = self.lo.max(remaining.saturating_sub(after * self.hi));
            *slot = size;
            remaining -= size;
        }
    }

    /// Moves `sizes` to the next composition; `false` when exhausted.
    fn advance(&self, sizes: &mut [usize]) -> bool {
        let count = sizes.len();
        for i in (0..count.saturating_sub(1)).rev() {
            let prefix: usize = sizes[..i].iter().sum();
            let tail = count - i - 1;
            let size = (sizes[i] + 1).max((self.total - prefix).saturating_sub(tail * self.hi));
            if size > self.hi || prefix + size > self.total {
                continue;
            }
            let rest = self.total - prefix - size;
            if !self.feasible(tail, rest) {
                continue;
            }
            sizes[i] = size;
            self.fill(&mut sizes[i + 1..], rest);
            return true;
        }
        false
    }
}
