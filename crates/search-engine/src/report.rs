// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Ranked search results and run statistics.

use crate::SearchError;
use parallel_planner::{CostBreakdown, InterStagePlan, IntraStagePlan};
use std::path::Path;
use std::time::Duration;

/// A costed candidate before ranking.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub inter: InterStagePlan,
    pub intra: IntraStagePlan,
    pub cost: CostBreakdown,
}

/// One entry of the ranked output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedCandidate {
    /// Position in the ranking, starting at 1.
    pub rank: usize,
    /// Estimated iteration time (ms).
    pub cost_ms: f64,
    pub inter: InterStagePlan,
    pub intra: IntraStagePlan,
    pub breakdown: CostBreakdown,
}

impl RankedCandidate {
    /// Returns a one-line description of the candidate.
    pub fn summary(&self) -> String {
        let sequence: Vec<&str> = self.inter.node_sequence.iter().map(|t| t.name()).collect();
        let groups: Vec<String> = self.inter.device_groups.iter().map(|g| g.to_string()).collect();
        let strategies: Vec<String> = self.intra.strategies.iter().map(|s| s.to_string()).collect();
        format!(
            "#{} {:.3} ms | sequence [{}] | groups {} | (dp, tp) {} | batches {} | layers {:?} | repartitions {}",
            self.rank,
            self.cost_ms,
            sequence.join(", "),
            groups.join(" "),
            strategies.join(" "),
            self.inter.batches,
            self.intra.layer_partition,
            self.intra.num_repartition,
        )
    }
}

/// Counters of one search run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SearchStats {
    /// Inter-stage plans visited.
    pub inter_plans: usize,
    /// Intra-stage candidates generated.
    pub intra_candidates: usize,
    /// Candidates dropped for an unprofiled point.
    pub lookup_failures: usize,
    /// Candidates dropped because a stage does not fit in memory.
    pub infeasible: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl SearchStats {
    /// Adds another worker's counters into this one.
    pub fn merge(&mut self, other: &SearchStats) {
        self.inter_plans += other.inter_plans;
        self.intra_candidates += other.intra_candidates;
        self.lookup_failures += other.lookup_failures;
        self.infeasible += other.infeasible;
    }

    /// Candidates that produced a cost.
    pub fn costed(&self) -> usize {
        self.intra_candidates - self.lookup_failures - self.infeasible
    }
}

/// The outcome of a search: candidates ascending by cost.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchReport {
    pub candidates: Vec<RankedCandidate>,
    pub stats: SearchStats,
    /// `true` if the run was stopped before visiting every plan.
    pub cancelled: bool,
}

impl SearchReport {
    /// Sorts and ranks evaluated candidates.
    ///
    /// Order is `(cost, inter-stage index, intra-stage index)`, so equal
    /// costs keep generation order and the ranking is reproducible
    /// regardless of how the work was scheduled.
    pub fn rank(mut evaluated: Vec<Evaluated>, stats: SearchStats, cancelled: bool) -> Self {
        evaluated.sort_by(|a, b| {
            a.cost
                .total_ms
                .total_cmp(&b.cost.total_ms)
                .then(a.inter.index.cmp(&b.inter.index))
                .then(a.intra.index.cmp(&b.intra.index))
        });

        let candidates = evaluated
            .into_iter()
            .enumerate()
            .map(|(i, e)| RankedCandidate {
                rank: i + 1,
                cost_ms: e.cost.total_ms,
                inter: e.inter,
                intra: e.intra,
                breakdown: e.cost,
            })
            .collect();

        Self {
            candidates,
            stats,
            cancelled,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns the cheapest candidate.
    pub fn best(&self) -> Option<&RankedCandidate> {
        self.candidates.first()
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let best = match self.best() {
            Some(c) => format!("best {:.3} ms", c.cost_ms),
            None => "no feasible candidates".to_string(),
        };
        format!(
            "Search{}: {} inter-stage plans, {} candidates, {} ranked, \
             {} lookup failures, {} out of memory, {} in {:.2}s",
            if self.cancelled { " (cancelled)" } else { "" },
            self.stats.inter_plans,
            self.stats.intra_candidates,
            self.len(),
            self.stats.lookup_failures,
            self.stats.infeasible,
            best,
            self.stats.elapsed.as_secs_f64(),
        )
    }

    /// Serialises the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, SearchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report as JSON.
    pub fn write_json(&self, path: &Path) -> Result<(), SearchError> {
        std::fs::write(path, self.to_json()?).map_err(|source| SearchError::OutputError {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_topology::DeviceType;
    use parallel_planner::{BatchSplit, StageStrategy};

    fn evaluated(inter_index: usize, intra_index: usize, total_ms: f64) -> Evaluated {
        let inter = InterStagePlan::from_group_sizes(
            inter_index,
            vec![DeviceType::new("A100")],
            &[2],
            BatchSplit {
                num_micro_batches: 2,
                micro_batch_size: 4,
            },
        );
        let intra = IntraStagePlan {
            index: intra_index,
            strategies: vec![StageStrategy { tp: 1, dp: 2 }],
            layer_partition: vec![4],
            num_repartition: 0,
        };
        let cost = CostBreakdown {
            stages: Vec::new(),
            slowest_stage: 0,
            pipeline_ms: total_ms,
            bubble_ms: 0.0,
            p2p_ms: 0.0,
            allreduce_ms: 0.0,
            repartition_ms: 0.0,
            fixed_ms: 0.0,
            total_ms,
        };
        Evaluated { inter, intra, cost }
    }

    #[test]
    fn test_rank_orders_by_cost_then_generation() {
        let report = SearchReport::rank(
            vec![
                evaluated(3, 0, 5.0),
                evaluated(1, 1, 2.0),
                evaluated(1, 0, 2.0),
                evaluated(0, 0, 9.0),
            ],
            SearchStats::default(),
            false,
        );
        let order: Vec<(usize, usize, usize)> = report
            .candidates
            .iter()
            .map(|c| (c.rank, c.inter.index, c.intra.index))
            .collect();
        assert_eq!(order, vec![(1, 1, 0), (2, 1, 1), (3, 3, 0), (4, 0, 0)]);
        assert_eq!(report.best().unwrap().cost_ms, 2.0);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = SearchStats::default();
        let part = SearchStats {
            inter_plans: 1,
            intra_candidates: 6,
            lookup_failures: 2,
            infeasible: 1,
            elapsed: Duration::ZERO,
        };
        total.merge(&part);
        total.merge(&part);
        assert_eq!(total.inter_plans, 2);
        assert_eq!(total.costed(), 6);
    }

    #[test]
    fn test_empty_report_summary() {
        let report = SearchReport::rank(Vec::new(), SearchStats::default(), false);
        assert!(report.is_empty());
        assert!(report.summary().contains("no feasible candidates"));
    }

    #[test]
    fn test_summary_and_json() {
        let report = SearchReport::rank(vec![evaluated(0, 0, 1.5)], SearchStats::default(), true);
        assert!(report.summary().contains("(cancelled)"));
        assert!(report.candidates[0].summary().starts_with("#1 1.500 ms"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["candidates"][0]["rank"], 1);
        assert_eq!(json["cancelled"], true);
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = SearchReport::rank(vec![evaluated(0, 0, 1.0)], SearchStats::default(), false);
        report.write_json(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"rank\": 1"));
    }
}
