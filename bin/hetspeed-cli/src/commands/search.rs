// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `hetspeed search` command: run the search and print the ranking.
//!
//! Walks the session type-state:
//! ```text
//! SearchSession<Unloaded> → load → <Loaded> → run → SearchReport
//! ```
//! The search itself is CPU-bound and runs on a blocking task; Ctrl-C
//! trips the cancel token and the partial ranking is still printed.

use search_engine::{CancelToken, SearchReport, SearchSession};
use std::path::PathBuf;

pub async fn execute(
    config: search_engine::SearchConfig,
    top: usize,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    super::banner("Strategy Search");

    // ── Configuration ──────────────────────────────────────────
    println!("  Config:");
    println!(
        "   Model:      {}-{} ({} layers, hidden {}, seq {})",
        config.model.model_name,
        config.model.model_size,
        config.model.num_layers,
        config.model.hidden_size,
        config.model.sequence_length,
    );
    println!("   Batch:      {}", config.model.global_batch_size);
    println!(
        "   Bounds:     tp ≤ {}, bs ≤ {}, variance {}, permutations ≤ {}",
        config.search.max_profiled_tp_degree,
        config.search.max_profiled_batch_size,
        config.search.min_group_scale_variance,
        config.search.max_permute_len,
    );
    println!("   Threads:    {}", config.resolve_threads());
    println!();

    // ── Load ───────────────────────────────────────────────────
    println!("  [1/2] Loading cluster and profiles...");
    let session = SearchSession::new(config).load()?;
    println!("        {}", session.topology().summary());
    println!("        {}", session.profiles().summary());
    println!();

    // ── Search ─────────────────────────────────────────────────
    println!("  [2/2] Searching (Ctrl-C stops early and keeps partial results)...");
    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, finishing in-flight plans");
                cancel.cancel();
            }
        })
    };

    let (session, report) = tokio::task::spawn_blocking(move || {
        let report = session.run(&cancel);
        (session, report)
    })
    .await?;
    watcher.abort();
    let report = report?;
    println!();

    print_ranking(&report, top);

    let output = output.or_else(|| session.config().output_path());
    if let Some(path) = output {
        report.write_json(&path)?;
        println!("  Report written to {}", path.display());
        println!();
    }

    Ok(())
}

fn print_ranking(report: &SearchReport, top: usize) {
    println!("  {}", report.summary());
    println!();

    if report.is_empty() {
        println!("  No feasible candidates: every strategy needed an unprofiled");
        println!("  configuration or exceeded device memory.");
        println!();
        return;
    }

    let shown = if top == 0 { report.len() } else { top.min(report.len()) };
    println!("  Ranked candidates ({shown} of {}):", report.len());
    println!("  {}", "-".repeat(80));
    for candidate in report.candidates.iter().take(shown) {
        println!("  {}", candidate.summary());
    }
    println!();

    if let Some(best) = report.best() {
        let b = &best.breakdown;
        println!("  Best candidate breakdown:");
        println!("   Pipeline:     {:>10.3} ms (slowest stage {})", b.pipeline_ms, b.slowest_stage);
        println!("   Bubble:       {:>10.3} ms", b.bubble_ms);
        println!("   P2P:          {:>10.3} ms", b.p2p_ms);
        println!("   All-reduce:   {:>10.3} ms", b.allreduce_ms);
        println!("   Repartition:  {:>10.3} ms", b.repartition_ms);
        println!("   Fixed:        {:>10.3} ms", b.fixed_ms);
        println!("   Total:        {:>10.3} ms", b.total_ms);
        println!();
    }
}
