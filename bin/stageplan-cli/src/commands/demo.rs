// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `stageplan demo` command: profile a synthetic model end to end.
//!
//! Builds a GPT-2-shaped stand-in model, attaches the real
//! instrumentation hooks, runs a few forward passes, and plans the
//! resulting profile against a built-in node inventory. This is the
//! file-less showcase path: no model files or cluster required.

use graph_instrument::{GraphUnit, HostProbe, Instrumentor, InvokeObserver, LayeredGraph};
use profile_metrics::MetricsCollector;
use stage_planner::{
    DeviceType, ExecutionPlanner, PlannerError, PlanningConstraints, StrategyKind, VirtualNode,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Forward passes profiled before planning.
const PROFILE_RUNS: usize = 3;

pub async fn execute(
    layers: usize,
    strategy: String,
    export: Option<PathBuf>,
) -> anyhow::Result<()> {
    let kind = StrategyKind::from_str_loose(&strategy)
        .ok_or(PlannerError::UnknownStrategy(strategy))?;

    println!("  Synthetic model: {layers} transformer blocks (+ embedding, head)");
    println!("  Strategy:        {kind}");
    println!();

    // ── Profile ────────────────────────────────────────────────
    let mut model = SyntheticModel::new(layers);
    let collector = Arc::new(MetricsCollector::new());
    let mut instrumentor = Instrumentor::new(collector.clone(), Arc::new(HostProbe::new()));

    let hooked = instrumentor.attach(&mut model);
    println!("  [1/3] Profiling {hooked} units over {PROFILE_RUNS} forward passes...");
    for _ in 0..PROFILE_RUNS {
        model.forward();
    }
    instrumentor.detach(&mut model);
    println!("        {}", collector.summary());
    println!();

    if let Some(path) = &export {
        let mut file = std::fs::File::create(path)?;
        collector.export_jsonl(&mut file)?;
        println!("        Profile exported to {}", path.display());
        println!();
    }

    // ── Plan ───────────────────────────────────────────────────
    println!("  [2/3] Planning against the built-in node inventory...");
    let nodes = demo_nodes();
    for node in &nodes {
        println!("         - {}", node.summary());
    }

    let planner = ExecutionPlanner::from_collector(
        &collector,
        kind.create(),
        PlanningConstraints::default(),
    )?;
    let plan = planner.generate_plan(&nodes, "gpt2-synthetic")?;

    // ── Report ─────────────────────────────────────────────────
    println!();
    println!("  [3/3] Plan ready.");
    println!();
    println!("{}", plan.render());

    Ok(())
}

fn demo_nodes() -> Vec<VirtualNode> {
    vec![
        VirtualNode::new("tower-rtx", DeviceType::Gpu, 320.0, 24.0, 64.0),
        VirtualNode::new("mini-rtx", DeviceType::Gpu, 150.0, 8.0, 32.0),
        VirtualNode::new("igpu-nuc", DeviceType::Igpu, 80.0, 2.0, 16.0),
        VirtualNode::new("cpu-box", DeviceType::Cpu, 55.0, 0.0, 32.0),
    ]
}

// ── Synthetic model ────────────────────────────────────────────

/// One synthetic unit; `work` simulates the layer's compute cost.
struct SyntheticUnit {
    name: String,
    kind: String,
    params: u64,
    work: Duration,
    observer: Option<Arc<dyn InvokeObserver>>,
}

impl SyntheticUnit {
    fn invoke(&mut self) {
        if let Some(obs) = &self.observer {
            obs.before_invoke();
        }
        std::thread::sleep(self.work);
        if let Some(obs) = &self.observer {
            obs.after_invoke();
        }
    }
}

impl GraphUnit for SyntheticUnit {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> &str {
        &self.kind
    }
    fn num_parameters(&self) -> u64 {
        self.params
    }
    fn set_observer(&mut self, observer: Option<Arc<dyn InvokeObserver>>) {
        self.observer = observer;
    }
}

struct SyntheticModel {
    units: Vec<SyntheticUnit>,
}

impl SyntheticModel {
    fn new(blocks: usize) -> Self {
        let mut units = vec![SyntheticUnit {
            name: "wte".into(),
            kind: "embedding".into(),
            params: 38_597_376,
            work: Duration::from_micros(400),
            observer: None,
        }];
        for b in 0..blocks {
            units.push(SyntheticUnit {
                name: format!("h.{b}"),
                kind: "transformer_block".into(),
                params: 7_087_872,
                // Later blocks slightly slower, like a real profile.
                work: Duration::from_micros(800 + b as u64 * 150),
                observer: None,
            });
        }
        units.push(SyntheticUnit {
            name: "lm_head".into(),
            kind: "linear".into(),
            params: 38_597_376,
            work: Duration::from_micros(300),
            observer: None,
        });
        Self { units }
    }

    fn forward(&mut self) {
        for unit in &mut self.units {
            unit.invoke();
        }
    }
}

impl LayeredGraph for SyntheticModel {
    fn visit_units(&mut self, visit: &mut dyn FnMut(&mut dyn GraphUnit)) {
        for unit in &mut self.units {
            visit(unit);
        }
    }
}
