// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Profiling records: the raw JSON shape and the validated form.
//!
//! # Format
//! ```json
//! {
//!   "model": { "parameters": { "parameters_per_layer_bytes": [1024, 2048] } },
//!   "execution_time": {
//!     "optimizer_time_ms": 3.0,
//!     "batch_generator_time_ms": 0.5,
//!     "layer_compute_total_ms": [1.2, 2.4],
//!     "forward_backward_time_ms": 4.1
//!   },
//!   "execution_memory": { "layer_memory_total_mb": [120.0, 340.0] }
//! }
//! ```
//! Every field is required; a missing or mistyped field is a parse error.

use std::ops::Range;

/// Multiplier applied to the profiled optimizer step time.
///
/// Existing cost tables count the optimizer step twice. The reason was never
/// documented; the factor is kept so rankings stay comparable.
pub const OPTIMIZER_TIME_FACTOR: f64 = 2.0;

/// Raw profiling file, exactly as written by the profiler.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawProfile {
    pub model: RawModelSection,
    pub execution_time: RawExecutionTime,
    pub execution_memory: RawExecutionMemory,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawModelSection {
    pub parameters: RawParameters,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawParameters {
    pub parameters_per_layer_bytes: Vec<u64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawExecutionTime {
    pub optimizer_time_ms: f64,
    pub batch_generator_time_ms: f64,
    pub layer_compute_total_ms: Vec<f64>,
    pub forward_backward_time_ms: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RawExecutionMemory {
    pub layer_memory_total_mb: Vec<f64>,
}

impl RawProfile {
    /// Checks internal consistency of a single file.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self) -> Result<(), String> {
        let times = &self.execution_time;
        let num_layers = times.layer_compute_total_ms.len();

        if num_layers == 0 {
            return Err("profile describes zero layers".into());
        }
        if self.model.parameters.parameters_per_layer_bytes.len() != num_layers {
            return Err(format!(
                "{} parameter entries for {num_layers} layers",
                self.model.parameters.parameters_per_layer_bytes.len()
            ));
        }
        if self.execution_memory.layer_memory_total_mb.len() != num_layers {
            return Err(format!(
                "{} memory entries for {num_layers} layers",
                self.execution_memory.layer_memory_total_mb.len()
            ));
        }

        let scalars = [
            ("optimizer_time_ms", times.optimizer_time_ms),
            ("batch_generator_time_ms", times.batch_generator_time_ms),
            ("forward_backward_time_ms", times.forward_backward_time_ms),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        let mut per_layer = times
            .layer_compute_total_ms
            .iter()
            .chain(&self.execution_memory.layer_memory_total_mb);
        if per_layer.any(|v| !v.is_finite() || *v < 0.0) {
            return Err("per-layer values must be non-negative numbers".into());
        }

        Ok(())
    }
}

/// Measurements for one (device type, tp, bs) configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProfileRecord {
    /// Forward + backward compute time of each layer (ms).
    pub layer_compute_ms: Vec<f64>,
    /// Synchronisation residual: forward-backward time not attributed to
    /// any layer (ms).
    pub sync_ms: f64,
    /// Peak memory of each layer (MB).
    pub layer_memory_mb: Vec<f64>,
}

impl ProfileRecord {
    /// Builds a record from a checked raw profile.
    pub fn from_raw(raw: &RawProfile) -> Self {
        let times = &raw.execution_time;
        let layer_total: f64 = times.layer_compute_total_ms.iter().sum();
        let mut sync_ms = times.forward_backward_time_ms - layer_total;
        if sync_ms < 0.0 {
            tracing::warn!(
                "forward-backward time {:.3} ms is below the layer sum {:.3} ms; sync clamped to 0",
                times.forward_backward_time_ms,
                layer_total,
            );
            sync_ms = 0.0;
        }

        Self {
            layer_compute_ms: times.layer_compute_total_ms.clone(),
            sync_ms,
            layer_memory_mb: raw.execution_memory.layer_memory_total_mb.clone(),
        }
    }

    /// Returns the number of layers covered by this record.
    pub fn num_layers(&self) -> usize {
        self.layer_compute_ms.len()
    }

    /// Returns the total compute time of a contiguous range of layers (ms).
    pub fn compute_ms(&self, layers: Range<usize>) -> f64 {
        self.layer_compute_ms[layers].iter().sum()
    }

    /// Returns the total compute time of all layers (ms).
    pub fn total_compute_ms(&self) -> f64 {
        self.layer_compute_ms.iter().sum()
    }

    /// Returns the summed memory of a contiguous range of layers (MB).
    pub fn memory_mb(&self, layers: Range<usize>) -> f64 {
        self.layer_memory_mb[layers].iter().sum()
    }
}

/// Model-wide figures shared by every profiled configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ModelProfile {
    /// Optimizer step time (ms), already scaled by [`OPTIMIZER_TIME_FACTOR`].
    pub optimizer_time_ms: f64,
    /// Batch generator time (ms).
    pub batch_generator_time_ms: f64,
    /// Parameter bytes of each layer.
    pub parameters_per_layer_bytes: Vec<u64>,
}

impl ModelProfile {
    /// Builds the model-level record from a checked raw profile.
    pub fn from_raw(raw: &RawProfile) -> Self {
        Self {
            optimizer_time_ms: raw.execution_time.optimizer_time_ms * OPTIMIZER_TIME_FACTOR,
            batch_generator_time_ms: raw.execution_time.batch_generator_time_ms,
            parameters_per_layer_bytes: raw.model.parameters.parameters_per_layer_bytes.clone(),
        }
    }

    /// Returns the number of model layers.
    pub fn num_layers(&self) -> usize {
        self.parameters_per_layer_bytes.len()
    }

    /// Returns the parameter bytes of a contiguous range of layers.
    pub fn parameter_bytes(&self, layers: Range<usize>) -> u64 {
        self.parameters_per_layer_bytes[layers].iter().sum()
    }
}
