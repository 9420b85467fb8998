// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stage-planner
//!
//! Turns per-layer profiling metrics into a validated partition of a
//! layered model onto a pipeline of heterogeneous nodes.
//!
//! # Strategies
//!
//! | Strategy | Cut criterion | Node assignment |
//! |---|---|---|
//! | [`Balanced`] | latency window around an even target | round-robin over ranked nodes |
//! | [`BottleneckFirst`] | solo stages for the slowest 20% | fastest nodes to slowest layers |
//! | [`MemoryAware`] | 90% of the node's memory ceiling | memory-rich nodes first |
//! | [`LatencyOptimized`] | hard per-stage latency cap | pure compute-score ranking |
//!
//! Whatever the criterion, layers are always walked in execution order:
//! metrics choose where to *cut*, never how to *order*. Every generated
//! plan is re-verified for full coverage and layer-index monotonicity
//! before it is returned.
//!
//! # Trait-Based Extensibility
//!
//! Strategies implement [`PlanStrategy`], so new heuristics plug in
//! without touching the planner:
//!
//! ```ignore
//! struct MyStrategy;
//! impl PlanStrategy for MyStrategy {
//!     fn kind(&self) -> StrategyKind { StrategyKind::Balanced }
//!     fn partition(&self, layers: &[LayerMetrics], nodes: &[VirtualNode],
//!                  constraints: &PlanningConstraints)
//!         -> Result<PlanDraft, PlannerError> { /* ... */ }
//! }
//! ```
//!
//! # Example
//! ```
//! use stage_planner::{
//!     DeviceType, ExecutionPlanner, PlanningConstraints, StrategyKind, VirtualNode,
//! };
//! use profile_metrics::MetricsCollector;
//!
//! let collector = MetricsCollector::new();
//! for (i, name) in ["wte", "h.0", "lm_head"].iter().enumerate() {
//!     let token = collector.start_layer_monitoring(name, "linear", i);
//!     collector.stop_layer_monitoring(token, 10.0 * (i + 1) as f64).unwrap();
//! }
//!
//! let nodes = vec![
//!     VirtualNode::new("gpu0", DeviceType::Gpu, 300.0, 24.0, 64.0),
//!     VirtualNode::new("cpu0", DeviceType::Cpu, 80.0, 0.0, 32.0),
//! ];
//! let planner = ExecutionPlanner::from_collector(
//!     &collector,
//!     StrategyKind::Balanced.create(),
//!     PlanningConstraints::default(),
//! ).unwrap();
//! let plan = planner.generate_plan(&nodes, "demo").unwrap();
//! assert_eq!(plan.num_layers(), 3);
//! println!("{}", plan.summary());
//! ```

mod config;
mod constraints;
mod error;
pub mod node;
pub(crate) mod plan;
mod planner;
mod stage;
pub mod strategy;

pub use config::PlannerConfig;
pub use constraints::PlanningConstraints;
pub use error::PlannerError;
pub use node::{rank_nodes, DeviceType, VirtualNode};
pub use plan::PartitionPlan;
pub use planner::ExecutionPlanner;
pub use stage::Stage;
pub use strategy::{
    Balanced, BottleneckFirst, LatencyOptimized, MemoryAware, PlanDraft, PlanStrategy,
    StrategyKind,
};

/// Generates a plan straight from a collector snapshot.
///
/// Convenience wrapper for the common profile-then-plan flow; use
/// [`ExecutionPlanner`] directly to reuse one snapshot across several
/// strategies or node sets.
pub fn generate_plan(
    collector: &profile_metrics::MetricsCollector,
    kind: StrategyKind,
    constraints: PlanningConstraints,
    nodes: &[VirtualNode],
    model_name: &str,
) -> Result<PartitionPlan, PlannerError> {
    ExecutionPlanner::from_collector(collector, kind.create(), constraints)?
        .generate_plan(nodes, model_name)
}
