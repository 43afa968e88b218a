// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The search driver with a type-state–enforced lifecycle.
//!
//! ```text
//! SearchSession<Unloaded>
//!     │  .load()          (or SearchSession::from_parts)
//!     ▼
//! SearchSession<Loaded>
//!     │  .run(&cancel)
//!     ▼
//!   SearchReport
//! ```
//!
//! Each transition consumes the old value, so a search cannot run before
//! its inputs are loaded.

use crate::report::Evaluated;
use crate::{CancelToken, SearchConfig, SearchError, SearchReport, SearchStats};
use cluster_topology::{ClusterTopology, TopologyLoader};
use parallel_planner::{
    HeteroCostEstimator, InterStagePlan, InterStagePlanGenerator, IntraStagePlanGenerator,
    LayerLoadBalancer, ModelConfig, ModelVolume, StagePerformance,
};
use profile_store::{ProfileLoader, ProfileStore};
use rayon::prelude::*;
use std::time::Instant;

// ── Type-state markers ─────────────────────────────────────────

/// Configured, nothing loaded yet.
#[derive(Debug)]
pub struct Unloaded;

/// Cluster, profiles and model are loaded and cross-checked.
#[derive(Debug)]
pub struct Loaded {
    topology: ClusterTopology,
    profiles: ProfileStore,
    model: ModelConfig,
}

/// Sealed trait for session states.
pub trait SessionState: std::fmt::Debug + sealed::Sealed {}
impl SessionState for Unloaded {}
impl SessionState for Loaded {}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Unloaded {}
    impl Sealed for super::Loaded {}
}

// ── Session ────────────────────────────────────────────────────

/// One search run over a fixed configuration.
///
/// # Example
/// ```no_run
/// use search_engine::{CancelToken, SearchConfig, SearchSession};
/// use std::path::Path;
///
/// # fn example() -> Result<(), search_engine::SearchError> {
/// let config = SearchConfig::from_file(Path::new("hetspeed.toml"))?;
/// let report = SearchSession::new(config).load()?.run(&CancelToken::new())?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub struct SearchSession<S: SessionState = Unloaded> {
    config: SearchConfig,
    state: S,
}

// ── Unloaded → Loaded ──────────────────────────────────────────

impl SearchSession<Unloaded> {
    pub fn new(config: SearchConfig) -> Self {
        tracing::info!(
            "search session for {}-{} ({} layers, gbs {})",
            config.model.model_name,
            config.model.model_size,
            config.model.num_layers,
            config.model.global_batch_size,
        );
        Self {
            config,
            state: Unloaded,
        }
    }

    /// Loads the cluster descriptors and the profiling directory.
    ///
    /// Every failure here is a configuration error: nothing is searched.
    pub fn load(self) -> Result<SearchSession<Loaded>, SearchError> {
        self.config.validate()?;
        let topology =
            TopologyLoader::load(&self.config.hostfile(), &self.config.clusterfile())?;
        let profiles = ProfileLoader::load_dir(&self.config.profile_dir())?;
        Self::from_parts(self.config, topology, profiles)
    }

    /// Builds a loaded session from in-memory inputs (for testing and
    /// embedding).
    pub fn from_parts(
        config: SearchConfig,
        topology: ClusterTopology,
        profiles: ProfileStore,
    ) -> Result<SearchSession<Loaded>, SearchError> {
        config.validate()?;
        let model = config.model_config();
        model.validate()?;

        if profiles.num_layers() != model.num_layers {
            return Err(SearchError::ConfigError(format!(
                "model has {} layers, profiles cover {}",
                model.num_layers,
                profiles.num_layers()
            )));
        }
        let profiled = profiles.device_types();
        for device_type in topology.device_types() {
            if !profiled.contains(&device_type) {
                tracing::warn!("no profiling data for {device_type}; its candidates will be dropped");
            }
        }

        Ok(SearchSession {
            config,
            state: Loaded {
                topology,
                profiles,
                model,
            },
        })
    }
}

// ── Loaded: run the search ─────────────────────────────────────

impl SearchSession<Loaded> {
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn topology(&self) -> &ClusterTopology {
        &self.state.topology
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.state.profiles
    }

    pub fn model(&self) -> &ModelConfig {
        &self.state.model
    }

    /// The inter-stage plans this session visits, in generation order.
    pub fn inter_plans(&self) -> InterStagePlanGenerator {
        let topology = &self.state.topology;
        InterStagePlanGenerator::new(
            topology.device_types(),
            topology.total_devices(),
            self.config.model.global_batch_size,
            self.state.model.num_layers,
            self.config.search.min_group_scale_variance,
            self.config.search.max_permute_len,
        )
    }

    /// Runs the search to completion or until `cancel` trips.
    ///
    /// With one worker thread this is a single synchronous pass; otherwise
    /// inter-stage plans are spread over a rayon pool, each worker owning
    /// its own [`StagePerformance`] and [`IntraStagePlanGenerator`]. The
    /// ranking is identical either way.
    pub fn run(&self, cancel: &CancelToken) -> Result<SearchReport, SearchError> {
        self.run_with_progress(cancel, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_plan` with the index of every
    /// inter-stage plan once its candidates have been evaluated.
    ///
    /// The callback may trip `cancel`; plans already handed to workers
    /// still finish and are ranked.
    pub fn run_with_progress<F>(&self, cancel: &CancelToken, on_plan: F) -> Result<SearchReport, SearchError>
    where
        F: Fn(usize) + Sync,
    {
        let start = Instant::now();
        let threads = self.config.resolve_threads();
        let ctx = SearchContext::new(&self.config, &self.state);
        tracing::info!(
            "searching {} with {threads} worker thread(s)",
            self.state.topology.summary()
        );

        let evaluate = |inter: InterStagePlan| {
            let index = inter.index;
            let outcome = ctx.evaluate(inter);
            on_plan(index);
            outcome
        };
        let plans = self.inter_plans().take_while(|_| !cancel.is_cancelled());
        let outcomes: Vec<PlanOutcome> = if threads <= 1 {
            plans.map(&evaluate).collect::<Result<_, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(|| {
                plans
                    .par_bridge()
                    .map(&evaluate)
                    .collect::<Result<Vec<_>, _>>()
            })?
        };

        let mut stats = SearchStats::default();
        let mut evaluated = Vec::new();
        for outcome in outcomes {
            stats.merge(&outcome.stats);
            evaluated.extend(outcome.evaluated);
        }
        stats.elapsed = start.elapsed();

        let cancelled = cancel.is_cancelled();
        if cancelled {
            tracing::warn!(
                "search cancelled after {} inter-stage plans; ranking partial results",
                stats.inter_plans
            );
        }

        let report = SearchReport::rank(evaluated, stats, cancelled);
        tracing::info!("{}", report.summary());
        Ok(report)
    }
}

impl<S: SessionState> std::fmt::Debug for SearchSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSession")
            .field("state", &std::any::type_name::<S>())
            .field("model", &self.config.model.model_name)
            .field("num_layers", &self.config.model.num_layers)
            .field("threads", &self.config.search.num_threads)
            .finish()
    }
}

// ── Per-plan evaluation ────────────────────────────────────────

/// Candidates and counters of one inter-stage plan.
#[derive(Debug, Default)]
struct PlanOutcome {
    evaluated: Vec<Evaluated>,
    stats: SearchStats,
}

/// Read-only state shared by every worker.
struct SearchContext<'a> {
    inputs: &'a Loaded,
    estimator: HeteroCostEstimator<'a>,
    balancer: LayerLoadBalancer<'a>,
    max_tp: usize,
    max_bs: usize,
}

impl<'a> SearchContext<'a> {
    fn new(config: &SearchConfig, inputs: &'a Loaded) -> Self {
        let volume = ModelVolume::new(
            &inputs.model,
            &inputs.profiles.model().parameters_per_layer_bytes,
        );
        Self {
            inputs,
            estimator: HeteroCostEstimator::new(
                &inputs.profiles,
                &inputs.model,
                volume,
                &inputs.topology,
            ),
            balancer: LayerLoadBalancer::new(&inputs.model),
            max_tp: config.search.max_profiled_tp_degree,
            max_bs: config.search.max_profiled_batch_size,
        }
    }

    /// Drains the intra-stage candidates of one plan.
    ///
    /// Lookup failures and out-of-memory candidates are dropped and
    /// counted; any other planner error aborts the run.
    fn evaluate(&self, inter: InterStagePlan) -> Result<PlanOutcome, SearchError> {
        let stages = StagePerformance::new(
            &self.inputs.model,
            &self.inputs.profiles,
            &self.inputs.topology,
            &inter,
        )?;
        tracing::trace!("{}", stages.summary());
        let mut outcome = PlanOutcome::default();
        outcome.stats.inter_plans = 1;

        let candidates =
            IntraStagePlanGenerator::new(&inter, &stages, &self.balancer, self.max_tp, self.max_bs);
        for intra in candidates {
            outcome.stats.intra_candidates += 1;
            let result = self.estimator.estimate(
                &inter,
                &intra.strategies,
                &intra.layer_partition,
                stages.device_placement(),
            );
            match result {
                Ok(cost) => outcome.evaluated.push(Evaluated {
                    inter: inter.clone(),
                    intra,
                    cost,
                }),
                Err(e) if e.is_lookup_failure() => {
                    outcome.stats.lookup_failures += 1;
                    tracing::debug!("plan #{} candidate #{} dropped: {e}", inter.index, intra.index);
                }
                Err(e) if e.is_infeasible() => {
                    outcome.stats.infeasible += 1;
                    tracing::debug!("plan #{} candidate #{} infeasible: {e}", inter.index, intra.index);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::trace!(
            "plan #{} done: {} of {} candidates costed",
            inter.index,
            outcome.evaluated.len(),
            outcome.stats.intra_candidates,
        );
        Ok(outcome)
    }
}
