// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `stageplan inspect` command: summarise a metrics feed.

use std::path::PathBuf;

pub async fn execute(metrics: PathBuf) -> anyhow::Result<()> {
    let collector = super::load_metrics(&metrics)?;
    let latest = collector.latest_metrics();

    println!("  Metrics: {}", metrics.display());
    println!();
    println!(
        "  {:<5} {:<28} {:<18} {:>6} {:>10} {:>10} {:>10} {:>12}",
        "idx", "layer", "type", "runs", "ms", "p95 ms", "MB", "params",
    );

    for m in &latest {
        println!(
            "  {:<5} {:<28} {:<18} {:>6} {:>10.2} {:>10.2} {:>10.1} {:>12}",
            m.layer_index,
            truncate(&m.layer_name, 28),
            truncate(&m.layer_type, 18),
            collector.run_count(&m.layer_name),
            m.forward_latency_ms,
            m.p95_latency_ms,
            m.memory_mb(),
            m.num_parameters,
        );
    }

    let total_latency: f64 = latest.iter().map(|m| m.forward_latency_ms).sum();
    let total_memory: f64 = latest.iter().map(|m| m.memory_mb()).sum();
    let total_params: u64 = latest.iter().map(|m| m.num_parameters).sum();

    println!();
    println!(
        "  Totals: {} layers, {:.2} ms, {:.1} MB, {} params",
        latest.len(),
        total_latency,
        total_memory,
        total_params,
    );

    Ok(())
}

/// Truncates a string with an ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}…", &s[..max_len - 1])
    }
}
