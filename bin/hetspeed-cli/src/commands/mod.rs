// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the pieces they share: logging setup and the
//! flag-to-config overlay.

pub mod inspect;
pub mod plans;
pub mod search;

use search_engine::SearchConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` count picks the level.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Search configuration flags. Each one overrides the matching field of
/// the config file (or of the defaults when no file is given).
///
/// Underscore spellings (`--num_layers`) are accepted as aliases.
#[derive(clap::Args, Debug, Default)]
pub struct ConfigArgs {
    // ── Model ──────────────────────────────────────────────────
    #[arg(long, alias = "model_name", help_heading = "Model")]
    pub model_name: Option<String>,
    #[arg(long, alias = "model_size", help_heading = "Model")]
    pub model_size: Option<String>,
    #[arg(long, alias = "num_layers", help_heading = "Model")]
    pub num_layers: Option<usize>,
    /// Global batch size.
    #[arg(long, help_heading = "Model")]
    pub gbs: Option<usize>,
    #[arg(long, alias = "hidden_size", help_heading = "Model")]
    pub hidden_size: Option<usize>,
    #[arg(long, alias = "sequence_length", help_heading = "Model")]
    pub sequence_length: Option<usize>,
    #[arg(long, alias = "vocab_size", help_heading = "Model")]
    pub vocab_size: Option<usize>,
    #[arg(long, alias = "attention_head_size", help_heading = "Model")]
    pub attention_head_size: Option<usize>,

    // ── Cluster ────────────────────────────────────────────────
    /// Hostfile: one `ip slots=n` line per node.
    #[arg(long, alias = "hostfile_path", help_heading = "Cluster")]
    pub hostfile_path: Option<PathBuf>,
    /// Clusterfile: per-host device type, memory and bandwidth (JSON).
    #[arg(long, alias = "clusterfile_path", help_heading = "Cluster")]
    pub clusterfile_path: Option<PathBuf>,

    // ── Environment ────────────────────────────────────────────
    /// Base directory for every relative path.
    #[arg(long, alias = "home_dir", help_heading = "Environment")]
    pub home_dir: Option<PathBuf>,
    #[arg(long, alias = "profile_data_path", help_heading = "Environment")]
    pub profile_data_path: Option<PathBuf>,
    #[arg(long, alias = "log_path", help_heading = "Environment")]
    pub log_path: Option<PathBuf>,

    // ── Search ─────────────────────────────────────────────────
    #[arg(long, alias = "max_profiled_tp_degree", help_heading = "Search")]
    pub max_profiled_tp_degree: Option<usize>,
    #[arg(long, alias = "max_profiled_batch_size", help_heading = "Search")]
    pub max_profiled_batch_size: Option<usize>,
    /// Allowed spread of device-group sizes around an even split.
    #[arg(long, alias = "min_group_scale_variance", help_heading = "Search")]
    pub min_group_scale_variance: Option<usize>,
    /// Maximum number of device-type orderings to try.
    #[arg(long, alias = "max_permute_len", help_heading = "Search")]
    pub max_permute_len: Option<usize>,
    /// Worker threads (1 runs a single sequential pass).
    #[arg(short = 'j', long, alias = "num_threads", help_heading = "Search")]
    pub num_threads: Option<usize>,
}

impl ConfigArgs {
    /// Builds the effective config: file (or defaults), then flags.
    pub fn resolve(self, config_path: Option<&Path>) -> anyhow::Result<SearchConfig> {
        let mut config = match config_path {
            Some(path) => SearchConfig::from_file(path)?,
            None => SearchConfig::default(),
        };

        set(&mut config.model.model_name, self.model_name);
        set(&mut config.model.model_size, self.model_size);
        set(&mut config.model.num_layers, self.num_layers);
        set(&mut config.model.global_batch_size, self.gbs);
        set(&mut config.model.hidden_size, self.hidden_size);
        set(&mut config.model.sequence_length, self.sequence_length);
        set(&mut config.model.vocab_size, self.vocab_size);
        set(&mut config.model.attention_head_size, self.attention_head_size);

        set(&mut config.cluster.hostfile_path, self.hostfile_path);
        set(&mut config.cluster.clusterfile_path, self.clusterfile_path);

        set(&mut config.env.home_dir, self.home_dir);
        set(&mut config.env.profile_data_path, self.profile_data_path);
        set(&mut config.env.log_path, self.log_path);

        set(&mut config.search.max_profiled_tp_degree, self.max_profiled_tp_degree);
        set(&mut config.search.max_profiled_batch_size, self.max_profiled_batch_size);
        set(&mut config.search.min_group_scale_variance, self.min_group_scale_variance);
        set(&mut config.search.max_permute_len, self.max_permute_len);
        set(&mut config.search.num_threads, self.num_threads.map(Some));

        config.validate()?;
        Ok(config)
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Prints the boxed header used by every subcommand.
pub fn banner(title: &str) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║  {:<52}║", format!("hetspeed · {title}"));
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
}
