// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `stageplan plan` command: metrics + config → partition plan.

use stage_planner::{ExecutionPlanner, PlannerConfig, PlannerError, StrategyKind};
use std::path::PathBuf;

pub async fn execute(
    metrics: PathBuf,
    config: PathBuf,
    strategy: Option<String>,
    output: Option<PathBuf>,
    pretty: bool,
) -> anyhow::Result<()> {
    let cfg = PlannerConfig::from_file(&config)?;
    cfg.validate()?;

    let collector = super::load_metrics(&metrics)?;
    println!("  {}", collector.summary());

    let strategy_name = strategy.unwrap_or_else(|| cfg.strategy.clone());
    let kind = StrategyKind::from_str_loose(&strategy_name)
        .ok_or(PlannerError::UnknownStrategy(strategy_name))?;

    let planner =
        ExecutionPlanner::from_collector(&collector, kind.create(), cfg.constraints.clone())?;
    let plan = planner.generate_plan(&cfg.nodes, &cfg.model_name)?;

    println!();
    println!("{}", plan.render());

    if let Some(path) = output {
        let json = if pretty {
            serde_json::to_string_pretty(&plan)?
        } else {
            serde_json::to_string(&plan)?
        };
        std::fs::write(&path, json)?;
        println!();
        println!("  Plan written to {}", path.display());
    }

    Ok(())
}
