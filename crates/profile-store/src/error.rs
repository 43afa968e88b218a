// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for profile loading and lookup.

use cluster_topology::DeviceType;

/// A requested profiling point was never measured.
///
/// Returned by [`crate::ProfileStore::get`]. The store never substitutes
/// a default or interpolates between neighbouring points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no profile for {device_type} at tp={tp}, bs={bs}")]
pub struct LookupFailure {
    pub device_type: DeviceType,
    pub tp: usize,
    pub bs: usize,
}

/// Errors that can occur while loading profiling data.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The profiling directory contains no `*.json` files.
    #[error("no profiling data found in '{path}'")]
    EmptyDirectory { path: String },

    /// A file or directory could not be read.
    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A profiling file is not valid JSON or lacks a required field.
    #[error("failed to parse '{file}': {source}")]
    ParseError {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// A file name does not follow the profiling file grammar.
    #[error("invalid profiling file name '{name}': {detail}")]
    InvalidFileName { name: String, detail: String },

    /// A record disagrees with itself or with previously loaded records.
    #[error("inconsistent profile '{file}': {detail}")]
    Inconsistent { file: String, detail: String },

    /// Two files map to the same (device type, tp, bs) key.
    #[error("duplicate profile for {key}: '{first}' and '{second}'")]
    DuplicateKey {
        key: String,
        first: String,
        second: String,
    },

    /// A lookup for an unprofiled point.
    #[error(transparent)]
    Lookup(#[from] LookupFailure),
}
