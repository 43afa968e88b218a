// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # search-engine
//!
//! Drives the strategy search for one model on one heterogeneous cluster.
//!
//! The engine takes:
//! - A [`SearchConfig`] naming the model, the cluster descriptors, the
//!   profiling directory and the search bounds.
//! - A `ClusterTopology` from `cluster-topology`.
//! - A `ProfileStore` from `profile-store`.
//!
//! It enumerates every inter-stage plan, drains the intra-stage candidates
//! of each, costs them with the heterogeneous estimator from
//! `parallel-planner` and returns a [`SearchReport`] ranked by estimated
//! iteration time.
//!
//! # Type-State Pipeline
//! ```text
//! SearchSession<Unloaded> → SearchSession<Loaded> → SearchReport
//! ```
//! Transitions are compile-time checked.
//!
//! # Parallel Search
//! Inter-stage plans are independent. With more than one worker thread
//! they are evaluated on a rayon pool; the ranking does not depend on the
//! thread count. A [`CancelToken`] stops the enumeration early and the
//! partial results are still ranked.

mod cancel;
mod config;
mod engine;
mod error;
mod report;

pub use cancel::CancelToken;
pub use config::{ClusterSection, EnvSection, ModelSection, SearchConfig, SearchSection};
pub use engine::{Loaded, SearchSession, SessionState, Unloaded};
pub use error::SearchError;
pub use report::{Evaluated, RankedCandidate, SearchReport, SearchStats};
