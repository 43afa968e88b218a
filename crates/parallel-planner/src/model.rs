// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model description and the activation/parameter volume model.

use crate::PlannerError;
use std::ops::Range;

/// Bytes per activation element (fp16 training).
pub const ACTIVATION_BYTES_PER_ELEMENT: u64 = 2;

/// Shape of the transformer being trained.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    /// Model family, e.g. `"GPT"`.
    pub model_name: String,
    /// Size label, e.g. `"1.5B"`.
    pub model_size: String,
    pub num_layers: usize,
    pub hidden_size: usize,
    pub sequence_length: usize,
    pub vocab_size: usize,
    pub attention_head_size: usize,
}

impl ModelConfig {
    /// Rejects shapes no plan can be built for.
    pub fn validate(&self) -> Result<(), PlannerError> {
        let fields = [
            ("num_layers", self.num_layers),
            ("hidden_size", self.hidden_size),
            ("sequence_length", self.sequence_length),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(PlannerError::InvalidModel(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Returns a one-line description.
    pub fn summary(&self) -> String {
        format!(
            "Model {}-{}: {} layers, hidden {}, seq {}, vocab {}, head {}",
            self.model_name,
            self.model_size,
            self.num_layers,
            self.hidden_size,
            self.sequence_length,
            self.vocab_size,
            self.attention_head_size,
        )
    }
}

/// Bytes moved between and within stages.
///
/// Activations crossing a stage boundary are `mbs · seq · hidden` elements;
/// parameter volume comes from the profiled per-layer byte counts.
#[derive(Debug, Clone)]
pub struct ModelVolume {
    hidden_size: u64,
    sequence_length: u64,
    parameters_per_layer_bytes: Vec<u64>,
}

impl ModelVolume {
    pub fn new(model: &ModelConfig, parameters_per_layer_bytes: &[u64]) -> Self {
        Self {
            hidden_size: model.hidden_size as u64,
            sequence_length: model.sequence_length as u64,
            parameters_per_layer_bytes: parameters_per_layer_bytes.to_vec(),
        }
    }

    /// Number of layers the volume model covers.
    pub fn num_layers(&self) -> usize {
        self.parameters_per_layer_bytes.len()
    }

    /// Activation bytes of one micro-batch at a stage boundary.
    pub fn activation_bytes(&self, micro_batch_size: usize) -> u64 {
        micro_batch_size as u64
            * self.sequence_length
            * self.hidden_size
            * ACTIVATION_BYTES_PER_ELEMENT
    }

    /// Parameter bytes of a contiguous layer range.
    pub fn parameter_bytes(&self, layers: Range<usize>) -> u64 {
        self.parameters_per_layer_bytes[layers].iter().sum()
    }
}
