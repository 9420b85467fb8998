// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The partition plan: the planner's output and the contract with the
//! deployment and dashboard collaborators.
//!
//! A plan is an ordered stage sequence plus derived quality figures:
//! total pipeline latency, a load-balance score, and the identified
//! bottleneck stage. Plans are immutable once generated — re-planning
//! produces a new plan.

use crate::strategy::StrategyKind;
use crate::{PlannerError, Stage};

/// A complete, validated partition of a model onto a node pipeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PartitionPlan {
    /// Plan identifier, `"{model}_{strategy}_plan"`.
    pub plan_name: String,
    /// When the plan was generated (`YYYYmmdd_HHMMSS`, UTC).
    pub creation_timestamp: String,
    /// The strategy that produced this plan.
    pub strategy: StrategyKind,
    /// Ordered stages; concatenating their layers yields every profiled
    /// layer exactly once, in execution order.
    pub stages: Vec<Stage>,
    /// Sum of all stage latencies, in milliseconds.
    pub total_expected_latency_ms: f64,
    /// Cross-stage balance in `[0, 1]`; 1 means perfectly even stages.
    pub load_balance_score: f64,
    /// Stage with the highest expected latency, if any.
    pub bottleneck_stage_id: Option<usize>,
    /// Latency of the bottleneck stage, in milliseconds.
    pub bottleneck_latency_ms: f64,
    /// Memory footprint of the bottleneck stage, in megabytes.
    pub bottleneck_memory_mb: f64,
    /// Human-readable explanation of the bottleneck.
    pub bottleneck_reason: String,
    /// Ordered notes recorded while the plan was generated.
    pub optimization_notes: Vec<String>,
}

impl PartitionPlan {
    /// Number of stages.
    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Total number of layers across all stages.
    pub fn num_layers(&self) -> usize {
        self.stages.iter().map(|s| s.num_layers()).sum()
    }

    /// Returns the stage with the given id.
    pub fn stage(&self, stage_id: usize) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage_id == stage_id)
    }

    /// Returns every stage placed on the given node.
    pub fn stages_on_node(&self, node_id: &str) -> Vec<&Stage> {
        self.stages
            .iter()
            .filter(|s| s.node.node_id == node_id)
            .collect()
    }

    /// Number of distinct nodes the plan uses.
    pub fn nodes_used(&self) -> usize {
        let mut ids: Vec<&str> = self.stages.iter().map(|s| s.node.node_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Recomputes the derived quality figures from the stages.
    ///
    /// Load balance is `clamp(1 − stdev/mean, 0, 1)` over stage
    /// latencies; with fewer than two stages (or a zero mean) the ratio
    /// is undefined and the score reports 0.
    pub(crate) fn recalculate(&mut self) {
        self.total_expected_latency_ms =
            self.stages.iter().map(|s| s.expected_latency_ms).sum();

        let latencies: Vec<f64> = self.stages.iter().map(|s| s.expected_latency_ms).collect();
        let mean = mean(&latencies);
        self.load_balance_score = if latencies.len() < 2 || mean <= 0.0 {
            0.0
        } else {
            (1.0 - stdev(&latencies) / mean).clamp(0.0, 1.0)
        };

        // First stage wins latency ties.
        let mut bottleneck: Option<&Stage> = None;
        for stage in &self.stages {
            let slower = bottleneck
                .map(|b| stage.expected_latency_ms > b.expected_latency_ms)
                .unwrap_or(true);
            if slower {
                bottleneck = Some(stage);
            }
        }
        match bottleneck {
            Some(stage) => {
                self.bottleneck_stage_id = Some(stage.stage_id);
                self.bottleneck_latency_ms = stage.expected_latency_ms;
                self.bottleneck_memory_mb = stage.memory_required_mb;
                self.bottleneck_reason = format!(
                    "stage {} on '{}' contributes {:.0}% of total latency",
                    stage.stage_id,
                    stage.node.node_id,
                    stage.latency_share(self.total_expected_latency_ms) * 100.0,
                );
            }
            None => {
                self.bottleneck_stage_id = None;
                self.bottleneck_latency_ms = 0.0;
                self.bottleneck_memory_mb = 0.0;
                self.bottleneck_reason = String::new();
            }
        }
    }

    /// Structural validation of the plan.
    ///
    /// Checks: at least one stage, consecutive stage ids from 0, no
    /// empty stages, and no layer appearing twice.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.stages.is_empty() {
            return Err(PlannerError::InvalidPlan("plan has no stages".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for (expected_id, stage) in self.stages.iter().enumerate() {
            if stage.stage_id != expected_id {
                return Err(PlannerError::InvalidPlan(format!(
                    "expected stage id {expected_id}, got {}",
                    stage.stage_id,
                )));
            }
            if stage.layers.is_empty() {
                return Err(PlannerError::InvalidPlan(format!(
                    "stage {} has no layers",
                    stage.stage_id,
                )));
            }
            for layer in &stage.layers {
                if !seen.insert(layer.as_str()) {
                    return Err(PlannerError::InvalidPlan(format!(
                        "layer '{layer}' appears in more than one stage",
                    )));
                }
            }
        }
        Ok(())
    }

    /// Returns a one-line summary suitable for logs.
    pub fn summary(&self) -> String {
        format!(
            "Plan '{}' ({}): {} stages, {} layers, {:.1} ms total, balance {:.2}, bottleneck {}",
            self.plan_name,
            self.strategy,
            self.num_stages(),
            self.num_layers(),
            self.total_expected_latency_ms,
            self.load_balance_score,
            match self.bottleneck_stage_id {
                Some(id) => format!("stage {id} ({:.1} ms)", self.bottleneck_latency_ms),
                None => "none".to_string(),
            },
        )
    }

    /// Renders a multi-line report of the plan for CLI display.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push("=".repeat(72));
        lines.push(format!("PARTITION PLAN: {}", self.plan_name));
        lines.push("=".repeat(72));
        lines.push(format!("Strategy:     {}", self.strategy));
        lines.push(format!("Created:      {}", self.creation_timestamp));
        lines.push(format!("Stages:       {}", self.num_stages()));
        lines.push(format!(
            "Total:        {:.1} ms, balance {:.2}",
            self.total_expected_latency_ms, self.load_balance_score,
        ));
        if let Some(id) = self.bottleneck_stage_id {
            lines.push(format!(
                "Bottleneck:   stage {id} at {:.1} ms — {}",
                self.bottleneck_latency_ms, self.bottleneck_reason,
            ));
        }
        lines.push(String::new());

        for stage in &self.stages {
            lines.push(format!("Stage {}:", stage.stage_id));
            lines.push(format!(
                "  Node:       {} ({}, score {:.0})",
                stage.node.node_id, stage.node.device_type, stage.node.compute_score,
            ));
            lines.push(format!("  Latency:    {:.1} ms", stage.expected_latency_ms));
            lines.push(format!("  Memory:     {:.1} MB", stage.memory_required_mb));
            lines.push(format!("  Parameters: {}", stage.num_parameters));
            let shown = stage.layers.len().min(5);
            let mut layer_list = stage.layers[..shown].join(", ");
            if stage.layers.len() > shown {
                layer_list.push_str(&format!(" … (+{} more)", stage.layers.len() - shown));
            }
            lines.push(format!("  Layers ({}): {layer_list}", stage.layers.len()));
            if !stage.tags.is_empty() {
                lines.push(format!("  Tags:       {}", stage.tags.join(", ")));
            }
            lines.push(format!("  Rationale:  {}", stage.rationale));
            lines.push(String::new());
        }

        if !self.optimization_notes.is_empty() {
            lines.push("Notes:".to_string());
            for note in &self.optimization_notes {
                lines.push(format!("  - {note}"));
            }
        }
        lines.join("\n")
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
