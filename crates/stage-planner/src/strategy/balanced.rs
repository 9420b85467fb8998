// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Balanced partitioning strategy.
//!
//! Aims for evenly loaded stages: the target is
//! `total_latency / min(num_nodes, max_stages)`, and the walk closes a
//! stage once it reaches 70% of target (when later stages still need
//! layers), before it would pass 130% of target, or at the per-stage
//! memory ceiling — whichever comes first. Stages go round-robin over
//! the ranked nodes.
//!
//! # When to use
//! - Default strategy: good latency spread without special-casing any
//!   layer.

use crate::strategy::{BalancedPacker, PlanDraft, PlanStrategy, StrategyKind};
use crate::{PlannerError, PlanningConstraints, VirtualNode};
use profile_metrics::LayerMetrics;

/// Evenly loaded stages, round-robin node assignment.
#[derive(Debug, Clone, Default)]
pub struct Balanced;

impl Balanced {
    pub fn new() -> Self {
        Self
    }
}

impl PlanStrategy for Balanced {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Balanced
    }

    fn partition(
        &self,
        layers: &[LayerMetrics],
        nodes: &[VirtualNode],
        constraints: &PlanningConstraints,
    ) -> Result<PlanDraft, PlannerError> {
        let total_latency: f64 = layers.iter().map(|m| m.forward_latency_ms).sum();
        let num_stages = nodes.len().min(constraints.max_stages);
        let target_ms = total_latency / num_stages as f64;

        let mut packer = BalancedPacker::new(nodes, constraints, target_ms, num_stages, "");
        for layer in layers {
            packer.push(layer);
        }
        packer.break_stage();

        Ok(PlanDraft {
            stages: packer.drain(),
            notes: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::{flat_layers, layers};
    use crate::DeviceType;

    fn nodes(n: usize) -> Vec<VirtualNode> {
        (0..n)
            .map(|i| VirtualNode::new(&format!("node-{i}"), DeviceType::Gpu, 100.0, 24.0, 64.0))
            .collect()
    }

    #[test]
    fn test_even_layers_split_evenly() {
        // 4 equal layers over 2 equal nodes: two stages of two layers.
        let layers = layers(&[
            ("l0", 10.0, 10.0),
            ("l1", 10.0, 10.0),
            ("l2", 10.0, 10.0),
            ("l3", 10.0, 10.0),
        ]);
        let draft = Balanced::new()
            .partition(&layers, &nodes(2), &PlanningConstraints::default())
            .unwrap();

        assert_eq!(draft.stages.len(), 2);
        assert_eq!(draft.stages[0].layers, vec!["l0", "l1"]);
        assert_eq!(draft.stages[1].layers, vec!["l2", "l3"]);
        assert_eq!(draft.stages[0].expected_latency_ms, 20.0);
        assert_eq!(draft.stages[1].expected_latency_ms, 20.0);
    }

    #[test]
    fn test_round_robin_node_assignment() {
        let layers = layers(&[
            ("l0", 10.0, 10.0),
            ("l1", 10.0, 10.0),
            ("l2", 10.0, 10.0),
            ("l3", 10.0, 10.0),
        ]);
        let draft = Balanced::new()
            .partition(&layers, &nodes(2), &PlanningConstraints::default())
            .unwrap();
        assert_eq!(draft.stages[0].node.node_id, "node-0");
        assert_eq!(draft.stages[1].node.node_id, "node-1");
    }

    #[test]
    fn test_order_preserved() {
        let layers = layers(&[
            ("l0", 5.0, 1.0),
            ("l1", 80.0, 1.0),
            ("l2", 5.0, 1.0),
            ("l3", 40.0, 1.0),
            ("l4", 5.0, 1.0),
        ]);
        let draft = Balanced::new()
            .partition(&layers, &nodes(3), &PlanningConstraints::default())
            .unwrap();
        assert_eq!(flat_layers(&draft.stages), vec!["l0", "l1", "l2", "l3", "l4"]);
    }

    #[test]
    fn test_memory_ceiling_forces_cut() {
        // Two layers of 600 MB against a 1 GB per-stage ceiling.
        let layers = layers(&[("l0", 10.0, 600.0), ("l1", 10.0, 600.0)]);
        let constraints = PlanningConstraints {
            max_vram_per_stage_gb: 1.0,
            ..Default::default()
        };
        let draft = Balanced::new()
            .partition(&layers, &nodes(1), &constraints)
            .unwrap();
        assert_eq!(draft.stages.len(), 2);
    }

    #[test]
    fn test_max_stages_bounds_target() {
        // One node but max_stages 8: everything lands in a single stage.
        let layers = layers(&[("l0", 10.0, 1.0), ("l1", 10.0, 1.0), ("l2", 10.0, 1.0)]);
        let draft = Balanced::new()
            .partition(&layers, &nodes(1), &PlanningConstraints::default())
            .unwrap();
        assert_eq!(draft.stages.len(), 1);
        assert_eq!(draft.stages[0].num_layers(), 3);
    }

    #[test]
    fn test_single_layer() {
        let layers = layers(&[("only", 42.0, 8.0)]);
        let draft = Balanced::new()
            .partition(&layers, &nodes(4), &PlanningConstraints::default())
            .unwrap();
        assert_eq!(draft.stages.len(), 1);
        assert_eq!(draft.stages[0].layers, vec!["only"]);
    }
}
