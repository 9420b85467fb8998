// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Memory-aware partitioning strategy.
//!
//! Walks layers in execution order, cutting a stage whenever the next
//! layer would push the accumulated footprint past 90% of the current
//! node's memory ceiling, then advances to the next node. Memory-rich
//! nodes (≥16 GB VRAM or ≥32 GB RAM) are tried first.
//!
//! A layer that does not fit *any* node still gets a stage: the plan is
//! emitted with the over-capacity stage and an infeasibility note, so
//! the caller can react instead of receiving an error.
//!
//! # When to use
//! - The model's footprint, not its latency, is what forces the split.

use crate::strategy::{stage_from, PlanDraft, PlanStrategy, StrategyKind};
use crate::{PlannerError, PlanningConstraints, Stage, VirtualNode};
use profile_metrics::LayerMetrics;

/// Fraction of a node's memory ceiling a stage may fill.
const MEMORY_HEADROOM: f64 = 0.9;

/// Stage cuts at node memory ceilings, memory-rich nodes first.
#[derive(Debug, Clone, Default)]
pub struct MemoryAware;

impl MemoryAware {
    pub fn new() -> Self {
        Self
    }

    /// Memory-rich nodes first, preserving the planner's ranking inside
    /// each group.
    fn order_by_memory(nodes: &[VirtualNode]) -> Vec<VirtualNode> {
        let mut ordered: Vec<VirtualNode> =
            nodes.iter().filter(|n| n.is_memory_rich()).cloned().collect();
        ordered.extend(nodes.iter().filter(|n| !n.is_memory_rich()).cloned());
        ordered
    }
}

impl PlanStrategy for MemoryAware {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MemoryAware
    }

    fn partition(
        &self,
        layers: &[LayerMetrics],
        nodes: &[VirtualNode],
        _constraints: &PlanningConstraints,
    ) -> Result<PlanDraft, PlannerError> {
        let ordered = Self::order_by_memory(nodes);
        let max_ceiling_mb = ordered
            .iter()
            .map(|n| n.memory_ceiling_mb())
            .fold(0.0, f64::max);

        let mut stages: Vec<Stage> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut node_idx = 0usize;
        let mut current: Vec<&LayerMetrics> = Vec::new();
        let mut current_memory_mb = 0.0;

        let close = |current: &mut Vec<&LayerMetrics>,
                     current_memory_mb: &mut f64,
                     node_idx: &mut usize,
                     stages: &mut Vec<Stage>| {
            let node = &ordered[*node_idx % ordered.len()];
            stages.push(stage_from(
                node,
                current,
                format!(
                    "memory-aware stage within the {:.0} MB ceiling of '{}'",
                    node.memory_ceiling_mb(),
                    node.node_id,
                ),
                Vec::new(),
            ));
            *node_idx += 1;
            current.clear();
            *current_memory_mb = 0.0;
        };

        for layer in layers {
            let memory = layer.memory_mb();
            let ceiling = ordered[node_idx % ordered.len()].memory_ceiling_mb();

            if !current.is_empty() && current_memory_mb + memory > ceiling * MEMORY_HEADROOM {
                close(&mut current, &mut current_memory_mb, &mut node_idx, &mut stages);
            }

            if current.is_empty() && memory > max_ceiling_mb * MEMORY_HEADROOM {
                notes.push(format!(
                    "layer '{}' needs {:.1} MB, more than any node's usable ceiling ({:.1} MB); \
                     emitting an over-capacity stage",
                    layer.layer_name,
                    memory,
                    max_ceiling_mb * MEMORY_HEADROOM,
                ));
            }

            current.push(layer);
            current_memory_mb += memory;
        }
        if !current.is_empty() {
            close(&mut current, &mut current_memory_mb, &mut node_idx, &mut stages);
        }

        Ok(PlanDraft { stages, notes })
    }
}
