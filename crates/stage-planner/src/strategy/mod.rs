// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`PlanStrategy`] trait, strategy implementations, and the shared
//! packing primitives.
//!
//! # Ordering contract
//!
//! Every strategy receives layers sorted ascending by `layer_index` and
//! must keep that order: latency and memory figures choose *where to
//! cut* and *which node gets a stage*, never how layers are ordered.
//! Reordering would break data dependencies and make the plan
//! unexecutable; the planner re-verifies the invariant on every plan.
//!
//! Strategies are purely algorithmic — no I/O or system calls — making
//! them trivially unit-testable.

pub mod balanced;
pub mod bottleneck_first;
pub mod latency_optimized;
pub mod memory_aware;

use crate::{PlannerError, PlanningConstraints, Stage, VirtualNode};
use profile_metrics::LayerMetrics;

pub use balanced::Balanced;
pub use bottleneck_first::BottleneckFirst;
pub use latency_optimized::LatencyOptimized;
pub use memory_aware::MemoryAware;

/// The four shipped partitioning heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Distribute latency evenly across stages.
    Balanced,
    /// Give the slowest layers solo stages on the fastest nodes.
    BottleneckFirst,
    /// Cut stages at node memory ceilings, memory-rich nodes first.
    MemoryAware,
    /// Cap per-stage latency and rank nodes purely by speed.
    LatencyOptimized,
}

impl StrategyKind {
    /// Parses a strategy name from config or CLI input.
    ///
    /// Accepts snake_case, kebab-case, and common short aliases.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "balanced" | "balance" => Some(Self::Balanced),
            "bottleneck_first" | "bottleneck" => Some(Self::BottleneckFirst),
            "memory_aware" | "memory" => Some(Self::MemoryAware),
            "latency_optimized" | "latency" => Some(Self::LatencyOptimized),
            _ => None,
        }
    }

    /// Returns the canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::BottleneckFirst => "bottleneck_first",
            Self::MemoryAware => "memory_aware",
            Self::LatencyOptimized => "latency_optimized",
        }
    }

    /// All strategies, in documentation order.
    pub fn all() -> [StrategyKind; 4] {
        [
            Self::Balanced,
            Self::BottleneckFirst,
            Self::MemoryAware,
            Self::LatencyOptimized,
        ]
    }

    /// Instantiates the strategy this kind names.
    pub fn create(&self) -> Box<dyn PlanStrategy> {
        match self {
            Self::Balanced => Box::new(Balanced::new()),
            Self::BottleneckFirst => Box::new(BottleneckFirst::new()),
            Self::MemoryAware => Box::new(MemoryAware::new()),
            Self::LatencyOptimized => Box::new(LatencyOptimized::new()),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stages and notes produced by one strategy run.
///
/// Stage ids are provisional; the planner renumbers them 0..n after
/// verification.
#[derive(Debug, Default)]
pub struct PlanDraft {
    /// Stages in execution order.
    pub stages: Vec<Stage>,
    /// Infeasibility and advisory notes raised while packing.
    pub notes: Vec<String>,
}

/// Trait for partition strategies.
///
/// Layers arrive sorted by `layer_index`; nodes arrive pre-ranked by the
/// planner (device priority, compute score, id).
pub trait PlanStrategy: Send + Sync {
    /// Which of the shipped strategies this is.
    fn kind(&self) -> StrategyKind;

    /// Produces stage cuts and node assignments for the given layers.
    fn partition(
        &self,
        layers: &[LayerMetrics],
        nodes: &[VirtualNode],
        constraints: &PlanningConstraints,
    ) -> Result<PlanDraft, PlannerError>;
}

/// Builds a stage from member layers, deriving the aggregates.
pub(crate) fn stage_from(
    node: &VirtualNode,
    members: &[&LayerMetrics],
    rationale: String,
    tags: Vec<String>,
) -> Stage {
    Stage {
        stage_id: 0, // renumbered by the planner
        node: node.clone(),
        layers: members.iter().map(|m| m.layer_name.clone()).collect(),
        expected_latency_ms: members.iter().map(|m| m.forward_latency_ms).sum(),
        memory_required_mb: members.iter().map(|m| m.memory_mb()).sum(),
        num_parameters: members.iter().map(|m| m.num_parameters).sum(),
        rationale,
        tags,
    }
}

/// Soft close: a stage at 70% of target may close early to leave room
/// for the remaining stages.
pub(crate) const SOFT_TARGET_RATIO: f64 = 0.7;
/// Hard close: never grow a stage past 130% of target.
pub(crate) const HARD_TARGET_RATIO: f64 = 1.3;

/// The balanced greedy walk shared by [`Balanced`] and
/// [`BottleneckFirst`].
///
/// Layers are fed in execution order; the packer closes the open stage
/// when the next layer would overshoot the latency window or the memory
/// ceiling, and assigns closed stages round-robin over the ranked nodes.
pub(crate) struct BalancedPacker<'a> {
    nodes: &'a [VirtualNode],
    constraints: &'a PlanningConstraints,
    target_ms: f64,
    num_stages: usize,
    rationale_suffix: &'static str,
    node_idx: usize,
    closed: Vec<Stage>,
    current: Vec<&'a LayerMetrics>,
    current_latency_ms: f64,
    current_memory_mb: f64,
}

impl<'a> BalancedPacker<'a> {
    pub(crate) fn new(
        nodes: &'a [VirtualNode],
        constraints: &'a PlanningConstraints,
        target_ms: f64,
        num_stages: usize,
        rationale_suffix: &'static str,
    ) -> Self {
        Self {
            nodes,
            constraints,
            target_ms,
            num_stages,
            rationale_suffix,
            node_idx: 0,
            closed: Vec::new(),
            current: Vec::new(),
            current_latency_ms: 0.0,
            current_memory_mb: 0.0,
        }
    }

    /// Feeds the next layer, closing the open stage first if adding the
    /// layer would violate the packing rules.
    pub(crate) fn push(&mut self, layer: &'a LayerMetrics) {
        let latency = layer.forward_latency_ms;
        let memory = layer.memory_mb();

        if !self.current.is_empty() {
            let over_latency =
                self.current_latency_ms + latency > self.target_ms * HARD_TARGET_RATIO;
            let over_memory = self.current_memory_mb + memory
                > self.constraints.max_vram_per_stage_gb * 1024.0;
            let soft_ready = self.closed.len() + 1 < self.num_stages
                && self.current_latency_ms >= self.target_ms * SOFT_TARGET_RATIO;
            if over_latency || over_memory || soft_ready {
                self.close();
            }
        }

        self.current.push(layer);
        self.current_latency_ms += latency;
        self.current_memory_mb += memory;
    }

    /// Closes the open stage, if any. Used at segment boundaries.
    pub(crate) fn break_stage(&mut self) {
        if !self.current.is_empty() {
            self.close();
        }
    }

    /// Takes the stages closed so far.
    pub(crate) fn drain(&mut self) -> Vec<Stage> {
        std::mem::take(&mut self.closed)
    }

    fn close(&mut self) {
        let node = &self.nodes[self.node_idx % self.nodes.len()];
        let rationale = format!(
            "balanced stage targeting {:.0} ms{}",
            self.target_ms, self.rationale_suffix,
        );
        self.closed
            .push(stage_from(node, &self.current, rationale, Vec::new()));
        self.node_idx += 1;
        self.current.clear();
        self.current_latency_ms = 0.0;
        self.current_memory_mb = 0.0;
    }
}
