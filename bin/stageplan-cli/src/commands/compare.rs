// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `stageplan compare` command: all strategies over one metrics feed.

use stage_planner::{ExecutionPlanner, PlannerConfig, StrategyKind};
use std::path::PathBuf;

pub async fn execute(metrics: PathBuf, config: PathBuf) -> anyhow::Result<()> {
    let cfg = PlannerConfig::from_file(&config)?;
    cfg.validate()?;
    let collector = super::load_metrics(&metrics)?;

    println!("  {}", collector.summary());
    println!("  Nodes: {}", cfg.nodes.len());
    for node in &cfg.nodes {
        println!("   - {}", node.summary());
    }
    println!();
    println!(
        "  {:<20} {:>7} {:>12} {:>9} {:>11} {:>22}",
        "strategy", "stages", "total (ms)", "balance", "nodes used", "bottleneck",
    );

    for kind in StrategyKind::all() {
        let planner = ExecutionPlanner::from_collector(
            &collector,
            kind.create(),
            cfg.constraints.clone(),
        )?;
        match planner.generate_plan(&cfg.nodes, &cfg.model_name) {
            Ok(plan) => println!(
                "  {:<20} {:>7} {:>12.1} {:>9.2} {:>11} {:>22}",
                kind.as_str(),
                plan.num_stages(),
                plan.total_expected_latency_ms,
                plan.load_balance_score,
                plan.nodes_used(),
                match plan.bottleneck_stage_id {
                    Some(id) => format!("stage {id} ({:.0} ms)", plan.bottleneck_latency_ms),
                    None => "none".to_string(),
                },
            ),
            Err(e) => println!("  {:<20} failed: {e}", kind.as_str()),
        }
    }

    Ok(())
}
