// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `hetspeed inspect` command: cluster, model and profiling inventory.
//!
//! Shows which (tp, bs) points are profiled for each device type, so a
//! search that comes back empty can be traced to missing measurements.

use search_engine::{SearchConfig, SearchSession};

pub async fn execute(config: SearchConfig) -> anyhow::Result<()> {
    super::banner("Inventory");

    let session = SearchSession::new(config).load()?;
    let topology = session.topology();
    let profiles = session.profiles();

    // ── Cluster ────────────────────────────────────────────────
    println!("  {}", topology.summary());
    for node in topology.nodes() {
        println!("   {}", node.summary());
    }
    println!();

    // ── Model ──────────────────────────────────────────────────
    println!("  {}", session.model().summary());
    let model = profiles.model();
    println!(
        "   Parameters: {:.2} MB over {} layers, optimizer {:.2} ms, batch generator {:.2} ms",
        model.parameter_bytes(0..model.num_layers()) as f64 / (1024.0 * 1024.0),
        model.num_layers(),
        model.optimizer_time_ms,
        model.batch_generator_time_ms,
    );
    println!();

    // ── Profiling Coverage ─────────────────────────────────────
    let max_tp = session.config().search.max_profiled_tp_degree;
    let max_bs = session.config().search.max_profiled_batch_size;
    let degrees: Vec<usize> = (1..=max_tp).collect();
    let batches: Vec<usize> = std::iter::successors(Some(1usize), |bs| bs.checked_mul(2))
        .take_while(|&bs| bs <= max_bs)
        .collect();

    println!("  {}", profiles.summary());
    println!();
    print!("  {:<12}", "type / tp");
    for bs in &batches {
        print!(" {:>6}", format!("bs{bs}"));
    }
    println!();
    println!("  {}", "-".repeat(12 + 7 * batches.len()));

    for device_type in topology.device_types() {
        for &tp in &degrees {
            print!("  {:<12}", format!("{device_type} tp{tp}"));
            for &bs in &batches {
                let mark = if profiles.contains(&device_type, tp, bs) { "yes" } else { "-" };
                print!(" {mark:>6}");
            }
            println!();
        }
    }
    println!();

    let profiled = profiles.device_types();
    let missing: Vec<String> = topology
        .device_types()
        .into_iter()
        .filter(|t| !profiled.contains(t))
        .map(|t| t.to_string())
        .collect();
    if !missing.is_empty() {
        println!("  WARNING: no profiling data for {}", missing.join(", "));
        println!();
    }

    Ok(())
}
