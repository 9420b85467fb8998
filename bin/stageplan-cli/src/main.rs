// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stageplan
//!
//! Command-line interface for the stage-planner pipeline.
//!
//! ## Usage
//! ```bash
//! # Plan from an exported metrics feed and a node inventory
//! stageplan plan --metrics profile.jsonl --config nodes.toml --output plan.json
//!
//! # Inspect a metrics feed
//! stageplan inspect --metrics profile.jsonl
//!
//! # Compare all four strategies side by side
//! stageplan compare --metrics profile.jsonl --config nodes.toml
//!
//! # Profile a synthetic model through the real hooks, then plan
//! stageplan demo --layers 12 --strategy bottleneck_first
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stageplan",
    about = "Profile layered models and plan their partitioning across nodes",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a partition plan from profiled metrics.
    Plan {
        /// Path to a JSONL metrics export.
        #[arg(short, long)]
        metrics: std::path::PathBuf,

        /// Path to a TOML planner config (nodes, constraints, strategy).
        #[arg(short, long)]
        config: std::path::PathBuf,

        /// Override the config's strategy:
        /// balanced, bottleneck_first, memory_aware, latency_optimized.
        #[arg(short, long)]
        strategy: Option<String>,

        /// Write the plan as JSON to this path.
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Summarise a metrics feed: per-layer latency, memory, parameters.
    Inspect {
        /// Path to a JSONL metrics export.
        #[arg(short, long)]
        metrics: std::path::PathBuf,
    },

    /// Run every strategy over the same metrics and compare the plans.
    Compare {
        /// Path to a JSONL metrics export.
        #[arg(short, long)]
        metrics: std::path::PathBuf,

        /// Path to a TOML planner config (nodes, constraints).
        #[arg(short, long)]
        config: std::path::PathBuf,
    },

    /// Profile a synthetic model through the instrumentation hooks,
    /// then plan it against a built-in node inventory.
    Demo {
        /// Number of transformer blocks in the synthetic model.
        #[arg(long, default_value_t = 12)]
        layers: usize,

        /// Strategy for the demo plan.
        #[arg(short, long, default_value = "balanced")]
        strategy: String,

        /// Write the demo profile as JSONL to this path.
        #[arg(long)]
        export: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Plan {
            metrics,
            config,
            strategy,
            output,
            pretty,
        } => commands::plan::execute(metrics, config, strategy, output, pretty).await,
        Commands::Inspect { metrics } => commands::inspect::execute(metrics).await,
        Commands::Compare { metrics, config } => commands::compare::execute(metrics, config).await,
        Commands::Demo {
            layers,
            strategy,
            export,
        } => commands::demo::execute(layers, strategy, export).await,
    }
}
