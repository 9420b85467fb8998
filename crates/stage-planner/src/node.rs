// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Static hardware description of the nodes a plan can target.
//!
//! A [`VirtualNode`] is an externally supplied, immutable capability
//! record: device class, relative compute speed, and memory capacity.
//! The planner never mutates nodes; it only ranks and assigns them.

/// The class of compute device a node provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Discrete GPU.
    Gpu,
    /// Integrated GPU.
    Igpu,
    /// CPU-only node.
    Cpu,
}

impl DeviceType {
    /// Scheduling priority: discrete GPUs first, CPUs last.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Gpu => 3,
            Self::Igpu => 2,
            Self::Cpu => 1,
        }
    }

    /// Returns a lowercase label matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Igpu => "igpu",
            Self::Cpu => "cpu",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hardware node available for stage placement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VirtualNode {
    /// Unique node identifier (e.g., `"workstation-gpu0"`).
    pub node_id: String,
    /// Device class of this node.
    pub device_type: DeviceType,
    /// Relative compute speed; higher is faster. Must be positive.
    #[serde(default = "default_compute_score")]
    pub compute_score: f64,
    /// Dedicated device memory in gigabytes (0 for CPU-only nodes).
    #[serde(default)]
    pub vram_gb: f64,
    /// System memory in gigabytes.
    #[serde(default)]
    pub ram_gb: f64,
}

fn default_compute_score() -> f64 {
    100.0
}

/// VRAM threshold (GB) above which a node counts as memory-rich.
const MEMORY_RICH_VRAM_GB: f64 = 16.0;
/// RAM threshold (GB) above which a node counts as memory-rich.
const MEMORY_RICH_RAM_GB: f64 = 32.0;

impl VirtualNode {
    /// Creates a node with the given capabilities.
    pub fn new(node_id: &str, device_type: DeviceType, compute_score: f64, vram_gb: f64, ram_gb: f64) -> Self {
        Self {
            node_id: node_id.to_string(),
            device_type,
            compute_score,
            vram_gb,
            ram_gb,
        }
    }

    /// The memory ceiling a stage on this node must respect, in MB.
    ///
    /// Dedicated device memory when present, system memory otherwise.
    pub fn memory_ceiling_mb(&self) -> f64 {
        if self.vram_gb > 0.0 {
            self.vram_gb * 1024.0
        } else {
            self.ram_gb * 1024.0
        }
    }

    /// Whether this node should be tried first by memory-driven placement.
    pub fn is_memory_rich(&self) -> bool {
        self.vram_gb >= MEMORY_RICH_VRAM_GB || self.ram_gb >= MEMORY_RICH_RAM_GB
    }

    /// Returns a concise one-line description.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}, score {:.0}, {:.0} GB vram, {:.0} GB ram)",
            self.node_id, self.device_type, self.compute_score, self.vram_gb, self.ram_gb,
        )
    }
}

/// Ranks nodes for assignment: device priority, then compute score
/// descending, then node id — a total, deterministic order.
pub fn rank_nodes(nodes: &[VirtualNode]) -> Vec<VirtualNode> {
    let mut ranked = nodes.to_vec();
    ranked.sort_by(|a, b| {
        b.device_type
            .priority()
            .cmp(&a.device_type.priority())
            .then_with(|| b.compute_score.total_cmp(&a.compute_score))
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    ranked
}

/// Ranks nodes purely by compute speed (score descending, id ascending).
pub fn rank_by_speed(nodes: &[VirtualNode]) -> Vec<VirtualNode> {
    let mut ranked = nodes.to_vec();
    ranked.sort_by(|a, b| {
        b.compute_score
            .total_cmp(&a.compute_score)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    ranked
}
