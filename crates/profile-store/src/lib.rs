// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # profile-store
//!
//! Empirical profiling data for one model on every device type of a
//! cluster, keyed by (device type, tensor-parallel degree, micro-batch
//! size).
//!
//! - [`ProfileKey`]: the key, and the file-name grammar that encodes it.
//! - [`RawProfile`]: the JSON record written by the profiler.
//! - [`ProfileRecord`]: validated per-configuration data: per-layer
//!   compute time, synchronisation residual, per-layer memory.
//! - [`ModelProfile`]: model-wide figures: optimizer and batch generator
//!   time, per-layer parameter bytes, layer count.
//! - [`ProfileStore`]: exact lookups. A configuration that was never
//!   profiled is a [`LookupFailure`], never a default.
//! - [`ProfileLoader`]: loads a profiling directory.
//!
//! Required fields that are absent or mistyped are rejected at load time,
//! so a loaded store only ever fails lookups for missing keys.

mod error;
mod key;
mod loader;
mod record;
mod store;

pub use error::{LookupFailure, ProfileError};
pub use key::ProfileKey;
pub use loader::ProfileLoader;
pub use record::{
    ModelProfile, ProfileRecord, RawExecutionMemory, RawExecutionTime, RawModelSection,
    RawParameters, RawProfile, OPTIMIZER_TIME_FACTOR,
};
pub use store::ProfileStore;
