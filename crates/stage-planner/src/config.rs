// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Planner configuration loaded from TOML files or constructed
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! model_name = "gpt2-small"
//! strategy = "balanced"
//!
//! [constraints]
//! max_vram_per_stage_gb = 16.0
//! max_stages = 4
//!
//! [[nodes]]
//! node_id = "workstation-gpu0"
//! device_type = "gpu"
//! compute_score = 320.0
//! vram_gb = 24.0
//! ram_gb = 64.0
//!
//! [[nodes]]
//! node_id = "laptop-cpu"
//! device_type = "cpu"
//! compute_score = 60.0
//! ram_gb = 32.0
//! ```

use crate::strategy::{PlanStrategy, StrategyKind};
use crate::{PlannerError, PlanningConstraints, VirtualNode};
use std::path::Path;

/// Configuration for one planning run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlannerConfig {
    /// Name of the profiled model, used in the plan name.
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Strategy name: `"balanced"`, `"bottleneck_first"`,
    /// `"memory_aware"`, or `"latency_optimized"` (aliases accepted).
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Planning constraints; missing fields take their defaults.
    #[serde(default)]
    pub constraints: PlanningConstraints,
    /// The node inventory available for placement.
    pub nodes: Vec<VirtualNode>,
}

fn default_model_name() -> String {
    "unknown_model".to_string()
}

fn default_strategy() -> String {
    "balanced".to_string()
}

impl PlannerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PlannerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlannerError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PlannerError> {
        toml::from_str(toml_str)
            .map_err(|e| PlannerError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PlannerError> {
        toml::to_string_pretty(self)
            .map_err(|e| PlannerError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Resolves the strategy name to a [`StrategyKind`].
    pub fn strategy_kind(&self) -> Result<StrategyKind, PlannerError> {
        StrategyKind::from_str_loose(&self.strategy)
            .ok_or_else(|| PlannerError::UnknownStrategy(self.strategy.clone()))
    }

    /// Instantiates the configured strategy.
    pub fn create_strategy(&self) -> Result<Box<dyn PlanStrategy>, PlannerError> {
        Ok(self.strategy_kind()?.create())
    }

    /// Checks the node inventory for obvious mistakes.
    pub fn validate(&self) -> Result<(), PlannerError> {
        self.constraints.validate()?;
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if node.node_id.is_empty() {
                return Err(PlannerError::ConfigError("a node has an empty node_id".into()));
            }
            if !seen.insert(node.node_id.as_str()) {
                return Err(PlannerError::ConfigError(format!(
                    "duplicate node_id '{}'",
                    node.node_id,
                )));
            }
            if node.compute_score <= 0.0 {
                return Err(PlannerError::ConfigError(format!(
                    "node '{}' has non-positive compute_score",
                    node.node_id,
                )));
            }
            if node.vram_gb < 0.0 || node.ram_gb < 0.0 {
                return Err(PlannerError::ConfigError(format!(
                    "node '{}' has negative memory capacity",
                    node.node_id,
                )));
            }
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            strategy: default_strategy(),
            constraints: PlanningConstraints::default(),
            nodes: Vec::new(),
        }
    }
}
