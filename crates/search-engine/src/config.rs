// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Search configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! [model]
//! model_name = "GPT"
//! model_size = "1.5B"
//! num_layers = 10
//! global_batch_size = 128
//! hidden_size = 1024
//! sequence_length = 1024
//! vocab_size = 51200
//! attention_head_size = 32
//!
//! [cluster]
//! hostfile_path = "hostfile"
//! clusterfile_path = "clusterfile.json"
//!
//! [search]
//! max_profiled_tp_degree = 4
//! max_profiled_batch_size = 8
//! min_group_scale_variance = 1
//! max_permute_len = 4
//! num_threads = 8
//!
//! [env]
//! home_dir = "/data/hetspeed"
//! profile_data_path = "profile_data"
//! log_path = "logs"
//! output_path = "results.json"
//! ```
//! Relative paths are resolved against `env.home_dir`.

use crate::SearchError;
use parallel_planner::ModelConfig;
use std::path::{Path, PathBuf};

/// The model being trained and its global batch size.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSection {
    pub model_name: String,
    pub model_size: String,
    pub num_layers: usize,
    pub global_batch_size: usize,
    pub hidden_size: usize,
    pub sequence_length: usize,
    pub vocab_size: usize,
    pub attention_head_size: usize,
}

/// Cluster descriptor files.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterSection {
    pub hostfile_path: PathBuf,
    pub clusterfile_path: PathBuf,
}

/// Bounds of the search space.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchSection {
    /// Largest tensor-parallel degree present in the profiles.
    pub max_profiled_tp_degree: usize,
    /// Largest micro-batch size present in the profiles.
    pub max_profiled_batch_size: usize,
    /// Allowed deviation of a stage's device count from the mean.
    pub min_group_scale_variance: usize,
    /// Node sequences explored per stage count.
    pub max_permute_len: usize,
    /// Worker threads (defaults to the number of online CPU cores; 1 is
    /// the sequential pass).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
}

/// Working directories and outputs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnvSection {
    #[serde(default = "default_home_dir")]
    pub home_dir: PathBuf,
    pub profile_data_path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Optional JSON dump of the ranked report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

fn default_home_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs")
}

/// Configuration of one search run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchConfig {
    pub model: ModelSection,
    pub cluster: ClusterSection,
    pub search: SearchSection,
    pub env: EnvSection,
}

impl SearchConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SearchError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SearchError> {
        toml::from_str(toml_str)
            .map_err(|e| SearchError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, SearchError> {
        toml::to_string_pretty(self)
            .map_err(|e| SearchError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Rejects values that make the search meaningless.
    pub fn validate(&self) -> Result<(), SearchError> {
        let required = [
            ("model.num_layers", self.model.num_layers),
            ("model.global_batch_size", self.model.global_batch_size),
            ("model.hidden_size", self.model.hidden_size),
            ("model.sequence_length", self.model.sequence_length),
            ("search.max_profiled_tp_degree", self.search.max_profiled_tp_degree),
            ("search.max_profiled_batch_size", self.search.max_profiled_batch_size),
            ("search.max_permute_len", self.search.max_permute_len),
        ];
        for (name, value) in required {
            if value == 0 {
                return Err(SearchError::ConfigError(format!("{name} must be positive")));
            }
        }
        if self.search.num_threads == Some(0) {
            return Err(SearchError::ConfigError(
                "search.num_threads must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Returns the model shape used by the planner.
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            model_name: self.model.model_name.clone(),
            model_size: self.model.model_size.clone(),
            num_layers: self.model.num_layers,
            hidden_size: self.model.hidden_size,
            sequence_length: self.model.sequence_length,
            vocab_size: self.model.vocab_size,
            attention_head_size: self.model.attention_head_size,
        }
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.search.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Resolves a path against `env.home_dir` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.env.home_dir.join(path)
        }
    }

    pub fn hostfile(&self) -> PathBuf {
        self.resolve(&self.cluster.hostfile_path)
    }

    pub fn clusterfile(&self) -> PathBuf {
        self.resolve(&self.cluster.clusterfile_path)
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.resolve(&self.env.profile_data_path)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.resolve(&self.env.log_path)
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.env.output_path.as_deref().map(|p| self.resolve(p))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: ModelSection {
                model_name: "GPT".to_string(),
                model_size: "1.5B".to_string(),
                num_layers: 10,
                global_batch_size: 128,
                hidden_size: 1024,
                sequence_length: 1024,
                vocab_size: 51200,
                attention_head_size: 32,
            },
            cluster: ClusterSection {
                hostfile_path: PathBuf::from("hostfile"),
                clusterfile_path: PathBuf::from("clusterfile.json"),
            },
            search: SearchSection {
                max_profiled_tp_degree: 4,
                max_profiled_batch_size: 8,
                min_group_scale_variance: 1,
                max_permute_len: 4,
                num_threads: None,
            },
            env: EnvSection {
                home_dir: default_home_dir(),
                profile_data_path: PathBuf::from("profile_data"),
                log_path: default_log_path(),
                output_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let c = SearchConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.model.num_layers, 10);
        assert_eq!(c.search.num_threads, None);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
[model]
model_name = "GPT"
model_size = "350M"
num_layers = 24
global_batch_size = 64
hidden_size = 1024
sequence_length = 1024
vocab_size = 50257
attention_head_size = 64

[cluster]
hostfile_path = "/etc/hetspeed/hostfile"
clusterfile_path = "clusterfile.json"

[search]
max_profiled_tp_degree = 8
max_profiled_batch_size = 16
min_group_scale_variance = 2
max_permute_len = 6
num_threads = 2

[env]
home_dir = "/data"
profile_data_path = "profiles"
"#;
        let c = SearchConfig::from_toml(toml).unwrap();
        assert_eq!(c.model.num_layers, 24);
        assert_eq!(c.search.num_threads, Some(2));
        assert_eq!(c.hostfile(), PathBuf::from("/etc/hetspeed/hostfile"));
        assert_eq!(c.clusterfile(), PathBuf::from("/data/clusterfile.json"));
        assert_eq!(c.profile_dir(), PathBuf::from("/data/profiles"));
        assert_eq!(c.log_dir(), PathBuf::from("/data/logs"));
        assert_eq!(c.output_path(), None);
        assert_eq!(c.model_config().hidden_size, 1024);
    }

    #[test]
    fn test_missing_section() {
        let result = SearchConfig::from_toml("[model]\nnum_layers = 4\n");
        assert!(matches!(result, Err(SearchError::ConfigError(_))));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let mut c = SearchConfig::default();
        c.env.output_path = Some(PathBuf::from("out.json"));
        let toml = c.to_toml().unwrap();
        let back = SearchConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut c = SearchConfig::default();
        c.model.num_layers = 0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("num_layers"));

        let mut c = SearchConfig::default();
        c.search.max_permute_len = 0;
        assert!(c.validate().is_err());

        let mut c = SearchConfig::default();
        c.search.num_threads = Some(0);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_resolve_threads() {
        let mut c = SearchConfig::default();
        c.search.num_threads = Some(8);
        assert_eq!(c.resolve_threads(), 8);

        c.search.num_threads = None;
        assert!(c.resolve_threads() >= 1);
    }
}
