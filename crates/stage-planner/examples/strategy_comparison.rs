// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compares all four strategies on a synthetic GPT-2-like profile.
//!
//! Run with:
//! ```bash
//! cargo run --example strategy_comparison -p stage-planner
//! ```

use profile_metrics::LayerMetrics;
use stage_planner::{
    DeviceType, ExecutionPlanner, PlanningConstraints, StrategyKind, VirtualNode,
};

fn main() {
    // A 24-block profile: later blocks slightly slower, embedding and
    // head cheap, one pathological block.
    let mut metrics = Vec::new();
    let mut push = |name: &str, kind: &str, latency: f64, memory_mb: f64| {
        let index = metrics.len();
        metrics.push(LayerMetrics {
            layer_name: name.to_string(),
            layer_type: kind.to_string(),
            layer_index: index,
            forward_latency_ms: latency,
            p50_latency_ms: latency,
            p95_latency_ms: latency * 1.15,
            p99_latency_ms: latency * 1.3,
            num_parameters: if kind == "transformer_block" { 7_000_000 } else { 500_000 },
            peak_vram_after: (memory_mb * 1024.0 * 1024.0) as u64,
            device: "cuda:0".to_string(),
        });
    };

    push("wte", "embedding", 25.0, 300.0);
    for b in 0..24 {
        let latency = if b == 17 { 480.0 } else { 30.0 + b as f64 * 2.0 };
        push(&format!("h.{b}"), "transformer_block", latency, 500.0);
    }
    push("lm_head", "linear", 15.0, 200.0);

    let nodes = vec![
        VirtualNode::new("tower-rtx", DeviceType::Gpu, 320.0, 24.0, 64.0),
        VirtualNode::new("mini-rtx", DeviceType::Gpu, 150.0, 8.0, 32.0),
        VirtualNode::new("igpu-nuc", DeviceType::Igpu, 80.0, 2.0, 16.0),
        VirtualNode::new("cpu-box", DeviceType::Cpu, 55.0, 0.0, 32.0),
    ];

    println!("Comparing strategies over {} layers on {} nodes\n", metrics.len(), nodes.len());
    println!(
        "{:<20} {:>7} {:>12} {:>9} {:>20}",
        "strategy", "stages", "total (ms)", "balance", "bottleneck",
    );

    for kind in StrategyKind::all() {
        let planner = ExecutionPlanner::new(
            metrics.clone(),
            kind.create(),
            PlanningConstraints::default(),
        )
        .expect("constraints are valid");
        let plan = planner
            .generate_plan(&nodes, "gpt2-synthetic")
            .expect("planning succeeds");

        println!(
            "{:<20} {:>7} {:>12.1} {:>9.2} {:>20}",
            kind.as_str(),
            plan.num_stages(),
            plan.total_expected_latency_ms,
            plan.load_balance_score,
            match plan.bottleneck_stage_id {
                Some(id) => format!("stage {id} ({:.0} ms)", plan.bottleneck_latency_ms),
                None => "none".into(),
            },
        );
    }

    // Full report for the bottleneck-first plan.
    let plan = ExecutionPlanner::new(
        metrics,
        StrategyKind::BottleneckFirst.create(),
        PlanningConstraints::default(),
    )
    .expect("constraints are valid")
    .generate_plan(&nodes, "gpt2-synthetic")
    .expect("planning succeeds");

    println!("\n{}", plan.render());
}
