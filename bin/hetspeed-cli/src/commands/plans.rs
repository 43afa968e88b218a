// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `hetspeed plans` command: list the inter-stage plans a search visits.

use search_engine::{SearchConfig, SearchSession};

pub async fn execute(config: SearchConfig, limit: Option<usize>) -> anyhow::Result<()> {
    super::banner("Inter-Stage Plans");

    let session = SearchSession::new(config).load()?;
    let plans = session.inter_plans();

    let sequences: Vec<String> = plans
        .node_sequences()
        .map(|seq| {
            let names: Vec<&str> = seq.iter().map(|t| t.name()).collect();
            format!("[{}]", names.join(", "))
        })
        .collect();
    let splits: Vec<String> = plans.batch_splits().iter().map(|s| s.to_string()).collect();
    println!("  Node sequences: {}", sequences.join(" "));
    println!("  Batch splits:   {}", splits.join(" "));
    println!();

    let limit = limit.unwrap_or(usize::MAX);
    let mut listed = 0;
    let mut total = 0;
    for plan in plans {
        if listed < limit {
            println!("  {}", plan.summary());
            listed += 1;
        }
        total += 1;
    }
    println!();

    if listed < total {
        println!("  {listed} of {total} plans listed");
    } else {
        println!("  {total} plans");
    }
    println!();

    Ok(())
}
