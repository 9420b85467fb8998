// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The execution planner: metrics + nodes + constraints → partition plan.
//!
//! Planning is a pure, synchronous computation over an immutable metrics
//! snapshot. [`ExecutionPlanner::generate_plan`] takes `&self`, shares
//! no mutable state, and may run concurrently with other plan
//! generations over the same snapshot. Re-planning means calling it
//! again — plans are never mutated.
//!
//! Every plan is verified before it is returned: each profiled layer
//! appears exactly once, and the concatenated stage layers are strictly
//! ascending in layer index. A strategy that breaks either rule yields
//! [`PlannerError::StrategyFailed`], never a silently broken plan.

use crate::node::rank_nodes;
use crate::plan::stdev;
use crate::strategy::PlanStrategy;
use crate::{PartitionPlan, PlannerError, PlanningConstraints, VirtualNode};
use profile_metrics::{LayerMetrics, MetricsCollector};
use std::collections::{HashMap, HashSet};

/// Share of total latency above which the bottleneck note suggests
/// retrying with the bottleneck-first strategy.
const BOTTLENECK_SHARE_HINT: f64 = 0.3;
/// Load-balance score below which the imbalance warning fires.
const IMBALANCE_WARN_SCORE: f64 = 0.7;

/// Plans the partitioning of one profiled model.
pub struct ExecutionPlanner {
    /// Latest record per layer, ascending by layer index.
    layers: Vec<LayerMetrics>,
    strategy: Box<dyn PlanStrategy>,
    constraints: PlanningConstraints,
    timestamp: String,
}

impl ExecutionPlanner {
    /// Creates a planner over a metrics snapshot.
    ///
    /// Constraints are validated here, once. If `metrics` contains
    /// several records for one layer name, the last one wins (matching
    /// the collector's "latest per layer" reads).
    pub fn new(
        metrics: Vec<LayerMetrics>,
        strategy: Box<dyn PlanStrategy>,
        constraints: PlanningConstraints,
    ) -> Result<Self, PlannerError> {
        constraints.validate()?;

        let mut latest: HashMap<String, LayerMetrics> = HashMap::new();
        for record in metrics {
            latest.insert(record.layer_name.clone(), record);
        }
        let mut layers: Vec<LayerMetrics> = latest.into_values().collect();
        layers.sort_by(|a, b| {
            a.layer_index
                .cmp(&b.layer_index)
                .then_with(|| a.layer_name.cmp(&b.layer_name))
        });

        Ok(Self {
            layers,
            strategy,
            constraints,
            timestamp: chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string(),
        })
    }

    /// Creates a planner from a collector's latest-per-layer snapshot.
    pub fn from_collector(
        collector: &MetricsCollector,
        strategy: Box<dyn PlanStrategy>,
        constraints: PlanningConstraints,
    ) -> Result<Self, PlannerError> {
        Self::new(collector.latest_metrics(), strategy, constraints)
    }

    /// Pins the plan's creation timestamp.
    ///
    /// With a pinned timestamp, identical inputs produce byte-identical
    /// serialized plans.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Number of layers available for partitioning.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Generates a partition plan for the given nodes.
    ///
    /// # Errors
    /// - [`PlannerError::NoAvailableNodes`] if `nodes` is empty.
    /// - [`PlannerError::NoMetrics`] if no layer was profiled.
    /// - [`PlannerError::StrategyFailed`] if the strategy violated the
    ///   coverage or ordering contract.
    pub fn generate_plan(
        &self,
        nodes: &[VirtualNode],
        model_name: &str,
    ) -> Result<PartitionPlan, PlannerError> {
        if nodes.is_empty() {
            return Err(PlannerError::NoAvailableNodes);
        }
        if self.layers.is_empty() {
            return Err(PlannerError::NoMetrics);
        }

        let kind = self.strategy.kind();
        tracing::info!(
            strategy = %kind,
            layers = self.layers.len(),
            nodes = nodes.len(),
            "generating partition plan for '{model_name}'",
        );

        let ranked = rank_nodes(nodes);
        let draft = self
            .strategy
            .partition(&self.layers, &ranked, &self.constraints)?;

        let mut stages = draft.stages;
        for (i, stage) in stages.iter_mut().enumerate() {
            stage.stage_id = i;
        }

        let mut plan = PartitionPlan {
            plan_name: format!("{model_name}_{kind}_plan"),
            creation_timestamp: self.timestamp.clone(),
            strategy: kind,
            stages,
            total_expected_latency_ms: 0.0,
            load_balance_score: 0.0,
            bottleneck_stage_id: None,
            bottleneck_latency_ms: 0.0,
            bottleneck_memory_mb: 0.0,
            bottleneck_reason: String::new(),
            optimization_notes: draft.notes,
        };
        plan.recalculate();
        self.append_notes(&mut plan);
        self.verify_execution_order(&plan)?;

        tracing::info!("{}", plan.summary());
        Ok(plan)
    }

    /// Appends the evaluator's human-readable notes.
    fn append_notes(&self, plan: &mut PartitionPlan) {
        plan.optimization_notes
            .push(format!("strategy: {}", plan.strategy));
        plan.optimization_notes
            .push(format!("total layers processed: {}", self.layers.len()));

        let total_memory: f64 = plan.stages.iter().map(|s| s.memory_required_mb).sum();
        let mean_memory = total_memory / plan.stages.len().max(1) as f64;
        plan.optimization_notes
            .push(format!("average memory per stage: {mean_memory:.1} MB"));

        let latencies: Vec<f64> = plan.stages.iter().map(|s| s.expected_latency_ms).collect();
        plan.optimization_notes
            .push(format!("latency std dev: {:.1} ms", stdev(&latencies)));

        if plan.load_balance_score < IMBALANCE_WARN_SCORE {
            plan.optimization_notes.push(
                "load imbalance detected; consider a different strategy".to_string(),
            );
        } else {
            plan.optimization_notes
                .push("good load balance achieved".to_string());
        }

        plan.optimization_notes
            .push(format!("nodes utilized: {}", plan.nodes_used()));

        if let Some(id) = plan.bottleneck_stage_id {
            let node_id = plan
                .stage(id)
                .map(|s| s.node.node_id.clone())
                .unwrap_or_default();
            plan.optimization_notes.push(format!(
                "bottleneck: stage {id} on '{node_id}' ({:.1} ms)",
                plan.bottleneck_latency_ms,
            ));
            if plan.bottleneck_latency_ms
                > plan.total_expected_latency_ms * BOTTLENECK_SHARE_HINT
            {
                plan.optimization_notes.push(
                    "bottleneck exceeds 30% of total latency; consider the bottleneck-first strategy"
                        .to_string(),
                );
            }
        }
    }

    /// Checks coverage and execution-order monotonicity.
    fn verify_execution_order(&self, plan: &PartitionPlan) -> Result<(), PlannerError> {
        let strategy = plan.strategy.to_string();
        let fail = |detail: String| PlannerError::StrategyFailed { strategy: strategy.clone(), detail };

        let index_of: HashMap<&str, usize> = self
            .layers
            .iter()
            .map(|m| (m.layer_name.as_str(), m.layer_index))
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut previous: Option<usize> = None;
        for stage in &plan.stages {
            if stage.layers.is_empty() {
                return Err(fail(format!("stage {} is empty", stage.stage_id)));
            }
            for name in &stage.layers {
                let Some(&index) = index_of.get(name.as_str()) else {
                    return Err(fail(format!("stage {} names unprofiled layer '{name}'", stage.stage_id)));
                };
                if !seen.insert(name.as_str()) {
                    return Err(fail(format!("layer '{name}' assigned twice")));
                }
                if let Some(prev) = previous {
                    if index <= prev {
                        return Err(fail(format!(
                            "layer '{name}' (index {index}) breaks execution order after index {prev}",
                        )));
                    }
                }
                previous = Some(index);
            }
        }
        if seen.len() != self.layers.len() {
            return Err(fail(format!(
                "plan covers {} of {} profiled layers",
                seen.len(),
                self.layers.len(),
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExecutionPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlanner")
            .field("layers", &self.layers.len())
            .field("strategy", &self.strategy.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::layers;
    use crate::strategy::{PlanDraft, StrategyKind};
    use crate::{DeviceType, Stage};

    fn nodes(n: usize) -> Vec<VirtualNode> {
        (0..n)
            .map(|i| VirtualNode::new(&format!("node-{i}"), DeviceType::Gpu, 100.0, 24.0, 64.0))
            .collect()
    }

    fn planner(kind: StrategyKind, specs: &[(&str, f64, f64)]) -> ExecutionPlanner {
        ExecutionPlanner::new(layers(specs), kind.create(), PlanningConstraints::default())
            .unwrap()
            .with_timestamp("20250101_120000")
    }

    #[test]
    fn test_empty_nodes_is_a_precondition_error() {
        let p = planner(StrategyKind::Balanced, &[("l0", 10.0, 1.0)]);
        let err = p.generate_plan(&[], "m").unwrap_err();
        assert!(matches!(err, PlannerError::NoAvailableNodes));
    }

    #[test]
    fn test_no_metrics_is_a_precondition_error() {
        let p = planner(StrategyKind::Balanced, &[]);
        let err = p.generate_plan(&nodes(2), "m").unwrap_err();
        assert!(matches!(err, PlannerError::NoMetrics));
    }

    #[test]
    fn test_invalid_constraints_rejected_at_construction() {
        let bad = PlanningConstraints {
            min_stages: 3,
            max_stages: 1,
            ..Default::default()
        };
        let err = ExecutionPlanner::new(
            layers(&[("l0", 10.0, 1.0)]),
            StrategyKind::Balanced.create(),
            bad,
        )
        .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidConstraints(_)));
    }

    #[test]
    fn test_plan_metadata() {
        let p = planner(StrategyKind::Balanced, &[("l0", 10.0, 1.0), ("l1", 10.0, 1.0)]);
        let plan = p.generate_plan(&nodes(2), "gpt2").unwrap();
        assert_eq!(plan.plan_name, "gpt2_balanced_plan");
        assert_eq!(plan.creation_timestamp, "20250101_120000");
        assert_eq!(plan.strategy, StrategyKind::Balanced);
        plan.validate().unwrap();
    }

    #[test]
    fn test_duplicate_metrics_latest_wins() {
        let mut metrics = layers(&[("l0", 10.0, 1.0)]);
        let mut newer = metrics[0].clone();
        newer.forward_latency_ms = 99.0;
        metrics.push(newer);

        let p = ExecutionPlanner::new(
            metrics,
            StrategyKind::Balanced.create(),
            PlanningConstraints::default(),
        )
        .unwrap();
        let plan = p.generate_plan(&nodes(1), "m").unwrap();
        assert_eq!(plan.total_expected_latency_ms, 99.0);
    }

    #[test]
    fn test_notes_content_and_order() {
        let p = planner(
            StrategyKind::Balanced,
            &[("l0", 10.0, 100.0), ("l1", 10.0, 100.0), ("l2", 10.0, 100.0), ("l3", 10.0, 100.0)],
        );
        let plan = p.generate_plan(&nodes(2), "m").unwrap();
        let notes = &plan.optimization_notes;

        assert_eq!(notes[0], "strategy: balanced");
        assert_eq!(notes[1], "total layers processed: 4");
        assert!(notes[2].starts_with("average memory per stage:"));
        assert!(notes[3].starts_with("latency std dev:"));
        assert_eq!(notes[4], "good load balance achieved");
        assert!(notes[5].starts_with("nodes utilized: 2"));
        assert!(notes[6].starts_with("bottleneck: stage"));
    }

    #[test]
    fn test_imbalance_warning_and_bottleneck_hint() {
        // One dominant layer → poor balance and a >30% bottleneck.
        let p = planner(
            StrategyKind::LatencyOptimized,
            &[("l0", 2000.0, 1.0), ("l1", 10.0, 1.0)],
        );
        let plan = p.generate_plan(&nodes(2), "m").unwrap();
        assert!(plan
            .optimization_notes
            .iter()
            .any(|n| n.contains("load imbalance detected")));
        assert!(plan
            .optimization_notes
            .iter()
            .any(|n| n.contains("consider the bottleneck-first strategy")));
    }

    #[test]
    fn test_strategy_notes_precede_evaluator_notes() {
        // MemoryAware emits an infeasibility note before the evaluator's.
        let metrics = layers(&[("huge", 10.0, 64.0 * 1024.0), ("tiny", 10.0, 1.0)]);
        let p = ExecutionPlanner::new(
            metrics,
            StrategyKind::MemoryAware.create(),
            PlanningConstraints::default(),
        )
        .unwrap();
        let plan = p.generate_plan(&nodes(2), "m").unwrap();
        assert!(plan.optimization_notes[0].contains("over-capacity"));
        assert_eq!(plan.optimization_notes[1], "strategy: memory_aware");
    }

    /// A strategy that reorders layers, for contract verification.
    struct Reversing;
    impl PlanStrategy for Reversing {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Balanced
        }
        fn partition(
            &self,
            layers: &[LayerMetrics],
            nodes: &[VirtualNode],
            _constraints: &PlanningConstraints,
        ) -> Result<PlanDraft, PlannerError> {
            let stages: Vec<Stage> = layers
                .iter()
                .rev()
                .map(|m| crate::strategy::stage_from(&nodes[0], &[m], "reversed".into(), vec![]))
                .collect();
            Ok(PlanDraft { stages, notes: vec![] })
        }
    }

    #[test]
    fn test_reordering_strategy_is_rejected() {
        let p = ExecutionPlanner::new(
            layers(&[("l0", 10.0, 1.0), ("l1", 10.0, 1.0)]),
            Box::new(Reversing),
            PlanningConstraints::default(),
        )
        .unwrap();
        let err = p.generate_plan(&nodes(1), "m").unwrap_err();
        assert!(matches!(err, PlannerError::StrategyFailed { .. }));
    }

    /// A strategy that drops a layer, for coverage verification.
    struct Dropping;
    impl PlanStrategy for Dropping {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Balanced
        }
        fn partition(
            &self,
            layers: &[LayerMetrics],
            nodes: &[VirtualNode],
            _constraints: &PlanningConstraints,
        ) -> Result<PlanDraft, PlannerError> {
            let member = &layers[0];
            Ok(PlanDraft {
                stages: vec![crate::strategy::stage_from(&nodes[0], &[member], "partial".into(), vec![])],
                notes: vec![],
            })
        }
    }

    #[test]
    fn test_incomplete_coverage_is_rejected() {
        let p = ExecutionPlanner::new(
            layers(&[("l0", 10.0, 1.0), ("l1", 10.0, 1.0)]),
            Box::new(Dropping),
            PlanningConstraints::default(),
        )
        .unwrap();
        let err = p.generate_plan(&nodes(1), "m").unwrap_err();
        assert!(matches!(err, PlannerError::StrategyFailed { .. }));
    }

    #[test]
    fn test_deterministic_with_pinned_timestamp() {
        let specs = [
            ("l0", 12.0, 64.0),
            ("l1", 48.0, 128.0),
            ("l2", 7.0, 32.0),
            ("l3", 33.0, 256.0),
            ("l4", 21.0, 64.0),
        ];
        for kind in StrategyKind::all() {
            let a = planner(kind, &specs).generate_plan(&nodes(3), "m").unwrap();
            let b = planner(kind, &specs).generate_plan(&nodes(3), "m").unwrap();
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap(),
                "strategy {kind} not deterministic",
            );
        }
    }
}
