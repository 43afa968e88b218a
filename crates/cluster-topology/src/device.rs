// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device identity: accelerator classes and physical device slots.

use crate::TopologyError;
use std::fmt;
use std::str::FromStr;

/// Prefix used by profiling tools when naming device types
/// (e.g., `"DeviceType.A100"`).
const DEVICE_TYPE_PREFIX: &str = "DeviceType.";

/// An accelerator class, such as `A100` or `V100`.
///
/// Equality, ordering and hashing are by name only. A `DeviceType` carries
/// no behaviour; it is the key used for topology and profile lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DeviceType(String);

impl DeviceType {
    /// Creates a device type from a bare name without validation.
    ///
    /// Prefer [`str::parse`] for untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the bare type name (without the `DeviceType.` prefix).
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceType {
    type Err = TopologyError;

    /// Accepts either `"A100"` or `"DeviceType.A100"`.
    ///
    /// Names must be non-empty and consist of ASCII letters, digits or `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = name.strip_prefix(DEVICE_TYPE_PREFIX).unwrap_or(name);

        if name.is_empty() {
            return Err(TopologyError::InvalidTopology(format!(
                "empty device type in '{s}'"
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(TopologyError::InvalidTopology(format!(
                "device type '{name}' contains characters outside [A-Za-z0-9-]"
            )));
        }

        Ok(Self(name.to_string()))
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One physical accelerator: a device slot on a specific node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Device {
    /// Node hosting this device.
    pub node_id: usize,
    /// Index of the device within its node.
    pub local_index: usize,
    /// Accelerator class of the hosting node.
    pub device_type: DeviceType,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@n{}:{}", self.device_type, self.node_id, self.local_index)
    }
}
