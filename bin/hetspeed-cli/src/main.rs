// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # hetspeed
//!
//! Command-line interface for the heterogeneous training strategy search.
//!
//! ## Usage
//! ```bash
//! # Rank strategies for a config file, keep the top 10
//! hetspeed -c hetspeed.toml search --top 10 --output result.json
//!
//! # Same search from flags only
//! hetspeed search --model-name GPT --model-size 1.5B --num-layers 10 --gbs 128 \
//!     --home-dir ./cluster --hostfile-path hostfile --clusterfile-path clusterfile.json \
//!     --profile-data-path profile_data
//!
//! # Cluster and profile inventory
//! hetspeed -c hetspeed.toml inspect
//!
//! # Pipeline shapes the search would visit
//! hetspeed -c hetspeed.toml plans --limit 50
//! ```

mod commands;

use clap::{Parser, Subcommand};
use commands::ConfigArgs;

#[derive(Parser)]
#[command(
    name = "hetspeed",
    about = "Parallelization strategy search for heterogeneous GPU training clusters",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (flags override its values).
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the strategy space and print the ranked candidates.
    Search {
        #[command(flatten)]
        args: ConfigArgs,

        /// Number of ranked candidates to print (0 prints all).
        #[arg(short = 'n', long, default_value_t = 20)]
        top: usize,

        /// Write the full report as JSON (overrides `env.output_path`).
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Print the cluster, model and profiling inventory.
    Inspect {
        #[command(flatten)]
        args: ConfigArgs,
    },

    /// List the inter-stage plans a search would visit.
    Plans {
        #[command(flatten)]
        args: ConfigArgs,

        /// Stop after this many plans.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Search { args, top, output } => {
            commands::search::execute(args.resolve(cli.config.as_deref())?, top, output).await
        }
        Commands::Inspect { args } => {
            commands::inspect::execute(args.resolve(cli.config.as_deref())?).await
        }
        Commands::Plans { args, limit } => {
            commands::plans::execute(args.resolve(cli.config.as_deref())?, limit).await
        }
    }
}
