// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bottleneck-first partitioning strategy.
//!
//! The slowest 20% of layers get solo stages on the fastest nodes; the
//! fastest node goes to the single slowest layer. Everything between
//! bottlenecks is packed with the balanced walk over the same node
//! list.
//!
//! Bottleneck placement is a *node-assignment* preference, not a
//! reordering license: bottleneck layers act as hard segment boundaries
//! in the walk, so the emitted stage sequence stays monotone in layer
//! index end to end.
//!
//! # When to use
//! - One or a few layers dominate total latency and deserve the fastest
//!   hardware to themselves.

use crate::node::rank_by_speed;
use crate::strategy::{stage_from, BalancedPacker, PlanDraft, PlanStrategy, StrategyKind};
use crate::{PlannerError, PlanningConstraints, VirtualNode};
use profile_metrics::LayerMetrics;
use std::collections::HashMap;

/// Fraction of layers (by latency rank) treated as bottlenecks.
const BOTTLENECK_FRACTION: f64 = 0.2;

/// Solo stages for the slowest layers, balanced fill in between.
#[derive(Debug, Clone, Default)]
pub struct BottleneckFirst;

impl BottleneckFirst {
    pub fn new() -> Self {
        Self
    }
}

impl PlanStrategy for BottleneckFirst {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BottleneckFirst
    }

    fn partition(
        &self,
        layers: &[LayerMetrics],
        nodes: &[VirtualNode],
        constraints: &PlanningConstraints,
    ) -> Result<PlanDraft, PlannerError> {
        let count = (layers.len() as f64 * BOTTLENECK_FRACTION) as usize;

        // Slowest first; ties resolved by execution order for determinism.
        let mut by_latency: Vec<&LayerMetrics> = layers.iter().collect();
        by_latency.sort_by(|a, b| {
            b.forward_latency_ms
                .total_cmp(&a.forward_latency_ms)
                .then_with(|| a.layer_index.cmp(&b.layer_index))
        });

        // The i-th slowest bottleneck gets the i-th fastest node.
        let fast_nodes = rank_by_speed(nodes);
        let assigned: HashMap<usize, VirtualNode> = by_latency[..count]
            .iter()
            .enumerate()
            .map(|(i, m)| (m.layer_index, fast_nodes[i.min(fast_nodes.len() - 1)].clone()))
            .collect();

        let remaining_latency: f64 = layers
            .iter()
            .filter(|m| !assigned.contains_key(&m.layer_index))
            .map(|m| m.forward_latency_ms)
            .sum();
        let num_stages = nodes.len().min(constraints.max_stages);
        let target_ms = remaining_latency / num_stages as f64;

        let mut stages = Vec::new();
        let mut packer = BalancedPacker::new(
            nodes,
            constraints,
            target_ms,
            num_stages,
            " (packed around bottlenecks)",
        );

        for layer in layers {
            match assigned.get(&layer.layer_index) {
                Some(node) => {
                    // Bottlenecks are hard segment boundaries.
                    packer.break_stage();
                    stages.append(&mut packer.drain());
                    stages.push(stage_from(
                        node,
                        &[layer],
                        format!(
                            "bottleneck layer on fastest available device (score {:.0})",
                            node.compute_score,
                        ),
                        vec!["bottleneck".to_string()],
                    ));
                }
                None => packer.push(layer),
            }
        }
        packer.break_stage();
        stages.append(&mut packer.drain());

        Ok(PlanDraft {
            stages,
            notes: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::{flat_layers, layers};
    use crate::DeviceType;

    fn nodes_with_scores(scores: &[f64]) -> Vec<VirtualNode> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| VirtualNode::new(&format!("node-{i}"), DeviceType::Gpu, s, 24.0, 64.0))
            .collect()
    }

    #[test]
    fn test_slow_layer_gets_solo_stage_on_fastest_node() {
        // 5 layers: floor(0.2 * 5) = 1 bottleneck, the 1000 ms layer.
        let layers = layers(&[
            ("l0", 10.0, 1.0),
            ("l1", 10.0, 1.0),
            ("l2", 1000.0, 1.0),
            ("l3", 10.0, 1.0),
            ("l4", 10.0, 1.0),
        ]);
        let nodes = nodes_with_scores(&[100.0, 500.0, 50.0]);
        let draft = BottleneckFirst::new()
            .partition(&layers, &nodes, &PlanningConstraints::default())
            .unwrap();

        let solo: Vec<&crate::Stage> = draft
            .stages
            .iter()
            .filter(|s| s.tags.contains(&"bottleneck".to_string()))
            .collect();
        assert_eq!(solo.len(), 1);
        assert_eq!(solo[0].layers, vec!["l2"]);
        assert_eq!(solo[0].node.node_id, "node-1"); // score 500
        assert!(solo[0].is_single_layer());
    }

    #[test]
    fn test_plan_stays_monotonic_in_layer_index() {
        let layers = layers(&[
            ("l0", 10.0, 1.0),
            ("l1", 10.0, 1.0),
            ("l2", 1000.0, 1.0),
            ("l3", 10.0, 1.0),
            ("l4", 10.0, 1.0),
        ]);
        let nodes = nodes_with_scores(&[100.0, 500.0, 50.0]);
        let draft = BottleneckFirst::new()
            .partition(&layers, &nodes, &PlanningConstraints::default())
            .unwrap();
        assert_eq!(flat_layers(&draft.stages), vec!["l0", "l1", "l2", "l3", "l4"]);
    }

    #[test]
    fn test_multiple_bottlenecks_by_latency_rank() {
        // 10 layers: 2 bottlenecks. The slowest (l7) gets the fastest
        // node, the second slowest (l2) the second fastest.
        let specs: Vec<(String, f64, f64)> = (0..10)
            .map(|i| {
                let latency = match i {
                    2 => 500.0,
                    7 => 900.0,
                    _ => 10.0,
                };
                (format!("l{i}"), latency, 1.0)
            })
            .collect();
        let spec_refs: Vec<(&str, f64, f64)> =
            specs.iter().map(|(n, l, m)| (n.as_str(), *l, *m)).collect();
        let layers = layers(&spec_refs);
        let nodes = nodes_with_scores(&[300.0, 800.0, 100.0]);

        let draft = BottleneckFirst::new()
            .partition(&layers, &nodes, &PlanningConstraints::default())
            .unwrap();

        let find = |name: &str| {
            draft
                .stages
                .iter()
                .find(|s| s.layers == vec![name.to_string()])
                .unwrap()
        };
        assert_eq!(find("l7").node.node_id, "node-1"); // 800, fastest
        assert_eq!(find("l2").node.node_id, "node-0"); // 300, second

        // Whole plan still in execution order.
        let expected: Vec<String> = (0..10).map(|i| format!("l{i}")).collect();
        assert_eq!(flat_layers(&draft.stages), expected);
    }

    #[test]
    fn test_few_layers_degrade_to_balanced() {
        // floor(0.2 * 4) = 0 bottlenecks.
        let layers = layers(&[
            ("l0", 10.0, 1.0),
            ("l1", 10.0, 1.0),
            ("l2", 10.0, 1.0),
            ("l3", 10.0, 1.0),
        ]);
        let nodes = nodes_with_scores(&[100.0, 100.0]);
        let draft = BottleneckFirst::new()
            .partition(&layers, &nodes, &PlanningConstraints::default())
            .unwrap();
        assert!(draft.stages.iter().all(|s| !s.tags.contains(&"bottleneck".to_string())));
        assert_eq!(flat_layers(&draft.stages), vec!["l0", "l1", "l2", "l3"]);
    }

    #[test]
    fn test_more_bottlenecks_than_nodes_reuse_slowest() {
        // 15 layers → 3 bottlenecks, but only 2 nodes: the third
        // bottleneck lands on the last-ranked node.
        let specs: Vec<(String, f64, f64)> = (0..15)
            .map(|i| {
                let latency = match i {
                    1 => 700.0,
                    8 => 900.0,
                    12 => 800.0,
                    _ => 5.0,
                };
                (format!("l{i:02}"), latency, 1.0)
            })
            .collect();
        let spec_refs: Vec<(&str, f64, f64)> =
            specs.iter().map(|(n, l, m)| (n.as_str(), *l, *m)).collect();
        let layers = layers(&spec_refs);
        let nodes = nodes_with_scores(&[400.0, 200.0]);

        let draft = BottleneckFirst::new()
            .partition(&layers, &nodes, &PlanningConstraints::default())
            .unwrap();

        let solo: Vec<&crate::Stage> = draft
            .stages
            .iter()
            .filter(|s| s.tags.contains(&"bottleneck".to_string()))
            .collect();
        assert_eq!(solo.len(), 3);
        // l08 (900) → node-0, l12 (800) → node-1, l01 (700) → node-1.
        let node_of = |name: &str| {
            solo.iter()
                .find(|s| s.layers == vec![name.to_string()])
                .unwrap()
                .node
                .node_id
                .clone()
        };
        assert_eq!(node_of("l08"), "node-0");
        assert_eq!(node_of("l12"), "node-1");
        assert_eq!(node_of("l01"), "node-1");
    }
}
