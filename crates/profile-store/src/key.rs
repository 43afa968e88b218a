// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Profiling file names and the key they encode.
//!
//! # Grammar
//! ```text
//! file  := "DeviceType." type "_" field ( "_" field )* ".json"
//! type  := [A-Za-z0-9-]+
//! field := "tp" digits | "bs" digits | token
//! ```
//! Exactly one `tp` field and one `bs` field must be present, both
//! positive. Other tokens (model name, date, ...) are ignored.
//!
//! Example: `DeviceType.A100_tp2_bs8.json` → `(A100, tp=2, bs=8)`.

use crate::ProfileError;
use cluster_topology::DeviceType;
use std::fmt;

const FILE_PREFIX: &str = "DeviceType.";
const FILE_SUFFIX: &str = ".json";

/// Identifies one profiled configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct ProfileKey {
    /// Accelerator class the measurement was taken on.
    pub device_type: DeviceType,
    /// Tensor-parallel degree.
    pub tp: usize,
    /// Micro-batch size.
    pub bs: usize,
}

impl ProfileKey {
    pub fn new(device_type: DeviceType, tp: usize, bs: usize) -> Self {
        Self { device_type, tp, bs }
    }

    /// Parses a profiling file name (without directory components).
    pub fn from_file_name(name: &str) -> Result<Self, ProfileError> {
        let invalid = |detail: &str| ProfileError::InvalidFileName {
            name: name.to_string(),
            detail: detail.to_string(),
        };

        let stem = name
            .strip_suffix(FILE_SUFFIX)
            .ok_or_else(|| invalid("missing '.json' extension"))?;
        let rest = stem
            .strip_prefix(FILE_PREFIX)
            .ok_or_else(|| invalid("missing 'DeviceType.' prefix"))?;

        let mut tokens = rest.split('_');
        let type_name = tokens.next().unwrap_or_default();
        let device_type: DeviceType = type_name
            .parse()
            .map_err(|_| invalid(&format!("bad device type '{type_name}'")))?;

        let mut tp = None;
        let mut bs = None;
        for token in tokens {
            if let Some(value) = numeric_field(token, "tp") {
                if tp.replace(value).is_some() {
                    return Err(invalid("more than one 'tp' field"));
                }
            } else if let Some(value) = numeric_field(token, "bs") {
                if bs.replace(value).is_some() {
                    return Err(invalid("more than one 'bs' field"));
                }
            }
        }

        let tp = tp.ok_or_else(|| invalid("missing 'tp<N>' field"))?;
        let bs = bs.ok_or_else(|| invalid("missing 'bs<N>' field"))?;
        if tp == 0 || bs == 0 {
            return Err(invalid("tp and bs must be positive"));
        }

        Ok(Self { device_type, tp, bs })
    }

    /// Returns the canonical file name for this key.
    pub fn file_name(&self) -> String {
        format!(
            "{FILE_PREFIX}{}_tp{}_bs{}{FILE_SUFFIX}",
            self.device_type, self.tp, self.bs
        )
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/tp{}/bs{}", self.device_type, self.tp, self.bs)
    }
}

/// Returns the number after `prefix` if the whole remainder is digits.
fn numeric_field(token: &str, prefix: &str) -> Option<usize> {
    let digits = token.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
