// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Latency-optimized partitioning strategy.
//!
//! Caps every stage at `max_stage_latency_ms` and hands stages to the
//! fastest nodes first, ranked purely by compute score — device class
//! is ignored here, unlike the planner's default ranking.
//!
//! # When to use
//! - A hard per-stage latency budget exists (e.g., pipeline tick
//!   deadlines) and node speed differences dwarf class differences.

use crate::node::rank_by_speed;
use crate::strategy::{stage_from, PlanDraft, PlanStrategy, StrategyKind};
use crate::{PlannerError, PlanningConstraints, Stage, VirtualNode};
use profile_metrics::LayerMetrics;

/// Latency-capped stages on speed-ranked nodes.
#[derive(Debug, Clone, Default)]
pub struct LatencyOptimized;

impl LatencyOptimized {
    pub fn new() -> Self {
        Self
    }
}

impl PlanStrategy for LatencyOptimized {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LatencyOptimized
    }

    fn partition(
        &self,
        layers: &[LayerMetrics],
        nodes: &[VirtualNode],
        constraints: &PlanningConstraints,
    ) -> Result<PlanDraft, PlannerError> {
        let fast_nodes = rank_by_speed(nodes);
        let cap_ms = constraints.max_stage_latency_ms;

        let mut stages: Vec<Stage> = Vec::new();
        let mut current: Vec<&LayerMetrics> = Vec::new();
        let mut current_latency_ms = 0.0;

        let close = |current: &mut Vec<&LayerMetrics>,
                     current_latency_ms: &mut f64,
                     stages: &mut Vec<Stage>| {
            let node = &fast_nodes[stages.len().min(fast_nodes.len() - 1)];
            stages.push(stage_from(
                node,
                current,
                format!("latency-capped stage at {cap_ms:.0} ms on '{}'", node.node_id),
                Vec::new(),
            ));
            current.clear();
            *current_latency_ms = 0.0;
        };

        for layer in layers {
            let latency = layer.forward_latency_ms;
            if !current.is_empty() && current_latency_ms + latency > cap_ms {
                close(&mut current, &mut current_latency_ms, &mut stages);
            }
            current.push(layer);
            current_latency_ms += latency;
        }
        if !current.is_empty() {
            close(&mut current, &mut current_latency_ms, &mut stages);
        }

        Ok(PlanDraft {
            stages,
            notes: Vec::new(),
        })
    }
}
