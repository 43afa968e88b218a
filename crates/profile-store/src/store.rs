// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The in-memory profile store: exact lookups, no interpolation.

use crate::{LookupFailure, ModelProfile, ProfileError, ProfileKey, ProfileRecord};
use cluster_topology::DeviceType;
use std::collections::{BTreeMap, BTreeSet};

/// All profiling data for one model.
///
/// Immutable once built; shared read-only by every search iteration.
/// Keys are kept ordered so iteration (and therefore logging and
/// summaries) is deterministic.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileStore {
    model: ModelProfile,
    records: BTreeMap<ProfileKey, ProfileRecord>,
}

impl ProfileStore {
    /// Creates an empty store around a model-level record.
    pub fn new(model: ModelProfile) -> Self {
        Self {
            model,
            records: BTreeMap::new(),
        }
    }

    /// Adds a record.
    ///
    /// The record must cover the same number of layers as the model and
    /// the key must not already be present.
    pub fn insert(&mut self, key: ProfileKey, record: ProfileRecord) -> Result<(), ProfileError> {
        let expected = self.model.num_layers();
        if record.num_layers() != expected || record.layer_memory_mb.len() != expected {
            return Err(ProfileError::Inconsistent {
                file: key.file_name(),
                detail: format!(
                    "record covers {} layers, model has {expected}",
                    record.num_layers()
                ),
            });
        }
        if self.records.contains_key(&key) {
            return Err(ProfileError::Inconsistent {
                file: key.file_name(),
                detail: format!("{key} is already loaded"),
            });
        }
        self.records.insert(key, record);
        Ok(())
    }

    /// Looks up the exact record for a configuration.
    pub fn get(
        &self,
        device_type: &DeviceType,
        tp: usize,
        bs: usize,
    ) -> Result<&ProfileRecord, LookupFailure> {
        let key = ProfileKey::new(device_type.clone(), tp, bs);
        self.records.get(&key).ok_or(LookupFailure {
            device_type: key.device_type,
            tp,
            bs,
        })
    }

    /// Returns `true` if the configuration was profiled.
    pub fn contains(&self, device_type: &DeviceType, tp: usize, bs: usize) -> bool {
        self.get(device_type, tp, bs).is_ok()
    }

    /// Returns the model-level record.
    pub fn model(&self) -> &ModelProfile {
        &self.model
    }

    /// Returns the number of model layers.
    pub fn num_layers(&self) -> usize {
        self.model.num_layers()
    }

    /// Returns the number of profiled configurations.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no configuration has been profiled.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all profiled keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &ProfileKey> {
        self.records.keys()
    }

    /// Returns the device types with at least one record.
    pub fn device_types(&self) -> BTreeSet<DeviceType> {
        self.records.keys().map(|k| k.device_type.clone()).collect()
    }

    /// Returns a human-readable summary of the store.
    pub fn summary(&self) -> String {
        let per_type: Vec<String> = self
            .device_types()
            .iter()
            .map(|t| {
                let points = self.keys().filter(|k| &k.device_type == t).count();
                format!("{t}: {points}")
            })
            .collect();
        format!(
            "Profiles: {} configurations over {} layers ({}), optimizer {:.2} ms, batch generator {:.2} ms",
            self.len(),
            self.num_layers(),
            per_type.join(", "),
            self.model.optimizer_time_ms,
            self.model.batch_generator_time_ms,
        )
    }
}
