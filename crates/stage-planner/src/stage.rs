// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A single pipeline stage: a contiguous span of layers bound to a node.
//!
//! Stages execute strictly in `stage_id` order; within a stage, `layers`
//! are listed in layer-index order. Aggregates are derived from the
//! member layers' metrics when the stage is built and never change
//! afterwards.

use crate::VirtualNode;

/// One stage of a partition plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stage {
    /// Position in the pipeline; stage `i` runs strictly before `i + 1`.
    pub stage_id: usize,
    /// The node this stage is placed on.
    pub node: VirtualNode,
    /// Member layer names, in execution order.
    pub layers: Vec<String>,
    /// Sum of the members' forward latencies, in milliseconds.
    pub expected_latency_ms: f64,
    /// Sum of the members' memory footprints, in megabytes.
    pub memory_required_mb: f64,
    /// Sum of the members' parameter counts.
    pub num_parameters: u64,
    /// Why the cut points and node assignment were chosen.
    pub rationale: String,
    /// Free-form markers (e.g., `"bottleneck"`).
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Stage {
    /// Number of layers in this stage.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Whether this stage holds exactly one layer.
    pub fn is_single_layer(&self) -> bool {
        self.layers.len() == 1
    }

    /// This stage's share of the given total latency, in `[0, 1]`.
    pub fn latency_share(&self, total_latency_ms: f64) -> f64 {
        if total_latency_ms <= 0.0 {
            return 0.0;
        }
        self.expected_latency_ms / total_latency_ms
    }

    /// Whether the stage's memory footprint exceeds its node's ceiling.
    pub fn exceeds_node_memory(&self) -> bool {
        self.memory_required_mb > self.node.memory_ceiling_mb()
    }

    /// Returns a concise one-line description.
    pub fn summary(&self) -> String {
        format!(
            "stage {} on '{}': {} layers, {:.1} ms, {:.1} MB, {} params",
            self.stage_id,
            self.node.node_id,
            self.num_layers(),
            self.expected_latency_ms,
            self.memory_required_mb,
            self.num_parameters,
        )
    }
}
