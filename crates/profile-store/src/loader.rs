// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loading a profiling directory into a [`ProfileStore`].
//!
//! The directory holds one JSON file per profiled configuration, named
//! after the grammar in [`crate::ProfileKey`]. Files without a `.json`
//! extension are ignored.

use crate::{ModelProfile, ProfileError, ProfileKey, ProfileRecord, ProfileStore, RawProfile};
use std::collections::BTreeMap;
use std::path::Path;

/// Builds a [`ProfileStore`] from profiling files.
///
/// # Example
/// ```no_run
/// use profile_store::ProfileLoader;
/// use std::path::Path;
///
/// let store = ProfileLoader::load_dir(Path::new("./profile_data")).unwrap();
/// println!("{}", store.summary());
/// ```
pub struct ProfileLoader;

impl ProfileLoader {
    /// Loads and validates every profiling file in a directory.
    ///
    /// Files are processed in name order, so the model-level record (taken
    /// from the first file) does not depend on directory iteration order.
    pub fn load_dir(dir: &Path) -> Result<ProfileStore, ProfileError> {
        let read_err = |source| ProfileError::ReadError {
            path: dir.display().to_string(),
            source,
        };

        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && entry.path().is_file() {
                names.push(name);
            }
        }
        names.sort();

        if names.is_empty() {
            return Err(ProfileError::EmptyDirectory {
                path: dir.display().to_string(),
            });
        }

        let mut raws = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            let content =
                std::fs::read_to_string(&path).map_err(|source| ProfileError::ReadError {
                    path: path.display().to_string(),
                    source,
                })?;
            let raw: RawProfile =
                serde_json::from_str(&content).map_err(|source| ProfileError::ParseError {
                    file: name.clone(),
                    source,
                })?;
            raws.push((name, raw));
        }

        let store = Self::from_raw(raws)?;
        tracing::info!("{}", store.summary());
        Ok(store)
    }

    /// Builds a store from already-parsed `(file name, record)` pairs.
    ///
    /// The first pair supplies the model-level record. Useful for testing
    /// without touching the filesystem.
    pub fn from_raw(entries: Vec<(String, RawProfile)>) -> Result<ProfileStore, ProfileError> {
        let Some((first_name, first)) = entries.first() else {
            return Err(ProfileError::EmptyDirectory {
                path: "<memory>".into(),
            });
        };
        first.check().map_err(|detail| ProfileError::Inconsistent {
            file: first_name.clone(),
            detail,
        })?;

        let mut store = ProfileStore::new(ModelProfile::from_raw(first));
        let mut origins: BTreeMap<ProfileKey, String> = BTreeMap::new();

        for (name, raw) in &entries {
            let key = ProfileKey::from_file_name(name)?;
            raw.check().map_err(|detail| ProfileError::Inconsistent {
                file: name.clone(),
                detail,
            })?;

            if raw.execution_time.layer_compute_total_ms.len() != store.num_layers() {
                return Err(ProfileError::Inconsistent {
                    file: name.clone(),
                    detail: format!(
                        "{} layers, but '{first_name}' has {}",
                        raw.execution_time.layer_compute_total_ms.len(),
                        store.num_layers(),
                    ),
                });
            }
            if let Some(previous) = origins.get(&key) {
                return Err(ProfileError::DuplicateKey {
                    key: key.to_string(),
                    first: previous.clone(),
                    second: name.clone(),
                });
            }

            tracing::debug!("loaded profile {key} from '{name}'");
            origins.insert(key.clone(), name.clone());
            store.insert(key, ProfileRecord::from_raw(raw))?;
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_topology::DeviceType;

    fn raw_json(layers: &[f64], fb: f64) -> String {
        let params: Vec<u64> = layers.iter().map(|_| 4096).collect();
        let memory: Vec<f64> = layers.iter().map(|_| 64.0).collect();
        serde_json::json!({
            "model": { "parameters": { "parameters_per_layer_bytes": params } },
            "execution_time": {
                "optimizer_time_ms": 2.0,
                "batch_generator_time_ms": 0.5,
                "layer_compute_total_ms": layers,
                "forward_backward_time_ms": fb
            },
            "execution_memory": { "layer_memory_total_mb": memory }
        })
        .to_string()
    }

    fn raw(layers: &[f64], fb: f64) -> RawProfile {
        serde_json::from_str(&raw_json(layers, fb)).unwrap()
    }

    #[test]
    fn test_from_raw() {
        let store = ProfileLoader::from_raw(vec![
            ("DeviceType.A100_tp1_bs8.json".into(), raw(&[1.0, 1.0], 2.5)),
            ("DeviceType.A100_tp2_bs8.json".into(), raw(&[0.6, 0.6], 1.5)),
        ])
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.num_layers(), 2);
        assert_eq!(store.model().optimizer_time_ms, 4.0);
        let rec = store.get(&DeviceType::new("A100"), 2, 8).unwrap();
        assert!((rec.sync_ms - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_layer_count_disagreement() {
        let result = ProfileLoader::from_raw(vec![
            ("DeviceType.A100_tp1_bs8.json".into(), raw(&[1.0, 1.0], 2.0)),
            ("DeviceType.V100_tp1_bs8.json".into(), raw(&[1.0, 1.0, 1.0], 3.0)),
        ]);
        assert!(matches!(result, Err(ProfileError::Inconsistent { .. })));
    }

    #[test]
    fn test_duplicate_key_names_both_files() {
        let result = ProfileLoader::from_raw(vec![
            ("DeviceType.A100_tp1_bs8.json".into(), raw(&[1.0], 1.0)),
            ("DeviceType.A100_bs8_tp1.json".into(), raw(&[1.0], 1.0)),
        ]);
        match result {
            Err(ProfileError::DuplicateKey { first, second, .. }) => {
                assert_eq!(first, "DeviceType.A100_tp1_bs8.json");
                assert_eq!(second, "DeviceType.A100_bs8_tp1.json");
            }
            other => panic!("expected DuplicateKey, got {other:?}"),
        }
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("DeviceType.A100_tp1_bs4.json"),
            raw_json(&[1.0, 2.0, 3.0], 6.5),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("DeviceType.V100_tp1_bs4.json"),
            raw_json(&[2.0, 4.0, 6.0], 12.0),
        )
        .unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let store = ProfileLoader::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.device_types().len(), 2);
    }

    #[test]
    fn test_load_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "no profiles").unwrap();
        let result = ProfileLoader::load_dir(dir.path());
        assert!(matches!(result, Err(ProfileError::EmptyDirectory { .. })));
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("DeviceType.A100_tp1_bs4.json"), "{ not json").unwrap();
        let result = ProfileLoader::load_dir(dir.path());
        assert!(matches!(result, Err(ProfileError::ParseError { .. })));
    }

    #[test]
    fn test_load_bad_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("A100_tp1_bs4.json"), raw_json(&[1.0], 1.0)).unwrap();
        let result = ProfileLoader::load_dir(dir.path());
        assert!(matches!(result, Err(ProfileError::InvalidFileName { .. })));
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = ProfileLoader::load_dir(&dir.path().join("absent"));
        assert!(matches!(result, Err(ProfileError::ReadError { .. })));
    }
}
