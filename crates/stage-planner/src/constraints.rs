// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Caller-supplied planning constraints and preferences.
//!
//! Constraints are validated once when the planner is constructed and
//! read-only afterwards. Every field has a serde default so TOML
//! configurations may specify only what they care about.

use crate::PlannerError;

/// Constraints and preferences for partition planning.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanningConstraints {
    /// Device-memory ceiling per stage, in gigabytes.
    #[serde(default = "default_max_vram_gb")]
    pub max_vram_per_stage_gb: f64,
    /// System-memory ceiling per stage, in gigabytes.
    #[serde(default = "default_max_ram_gb")]
    pub max_ram_per_stage_gb: f64,
    /// Hard latency cap per stage, in milliseconds.
    #[serde(default = "default_max_stage_latency")]
    pub max_stage_latency_ms: f64,
    /// Preferred latency per stage, in milliseconds.
    #[serde(default = "default_target_stage_latency")]
    pub target_stage_latency_ms: f64,
    /// Tolerated latency spread between stages, in percent.
    #[serde(default = "default_max_imbalance_pct")]
    pub max_latency_imbalance_pct: f64,
    /// Prefer faster devices when several nodes qualify.
    #[serde(default = "default_true")]
    pub prefer_fast_devices: bool,
    /// Minimum number of stages. At least 1.
    #[serde(default = "default_min_stages")]
    pub min_stages: usize,
    /// Maximum number of stages. At least `min_stages`.
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,
    /// Allow a layer span to be duplicated across nodes.
    ///
    /// No shipped strategy duplicates stages; the flag is carried for
    /// callers that post-process plans.
    #[serde(default)]
    pub allow_cross_node_duplicates: bool,
}

fn default_max_vram_gb() -> f64 {
    24.0
}
fn default_max_ram_gb() -> f64 {
    64.0
}
fn default_max_stage_latency() -> f64 {
    1000.0
}
fn default_target_stage_latency() -> f64 {
    500.0
}
fn default_max_imbalance_pct() -> f64 {
    30.0
}
fn default_true() -> bool {
    true
}
fn default_min_stages() -> usize {
    1
}
fn default_max_stages() -> usize {
    8
}

impl Default for PlanningConstraints {
    fn default() -> Self {
        Self {
            max_vram_per_stage_gb: default_max_vram_gb(),
            max_ram_per_stage_gb: default_max_ram_gb(),
            max_stage_latency_ms: default_max_stage_latency(),
            target_stage_latency_ms: default_target_stage_latency(),
            max_latency_imbalance_pct: default_max_imbalance_pct(),
            prefer_fast_devices: default_true(),
            min_stages: default_min_stages(),
            max_stages: default_max_stages(),
            allow_cross_node_duplicates: false,
        }
    }
}

impl PlanningConstraints {
    /// Checks internal consistency. Run once by the planner.
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.min_stages < 1 {
            return Err(PlannerError::InvalidConstraints(
                "min_stages must be at least 1".into(),
            ));
        }
        if self.max_stages < self.min_stages {
            return Err(PlannerError::InvalidConstraints(format!(
                "max_stages ({}) is below min_stages ({})",
                self.max_stages, self.min_stages,
            )));
        }
        if self.max_vram_per_stage_gb <= 0.0 || self.max_ram_per_stage_gb <= 0.0 {
            return Err(PlannerError::InvalidConstraints(
                "per-stage memory ceilings must be positive".into(),
            ));
        }
        if self.max_stage_latency_ms <= 0.0 || self.target_stage_latency_ms <= 0.0 {
            return Err(PlannerError::InvalidConstraints(
                "stage latency bounds must be positive".into(),
            ));
        }
        if self.target_stage_latency_ms > self.max_stage_latency_ms {
            return Err(PlannerError::InvalidConstraints(format!(
                "target_stage_latency_ms ({}) exceeds max_stage_latency_ms ({})",
                self.target_stage_latency_ms, self.max_stage_latency_ms,
            )));
        }
        if self.max_latency_imbalance_pct < 0.0 {
            return Err(PlannerError::InvalidConstraints(
                "max_latency_imbalance_pct must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        PlanningConstraints::default().validate().unwrap();
    }

    #[test]
    fn test_default_values() {
        let c = PlanningConstraints::default();
        assert_eq!(c.max_vram_per_stage_gb, 24.0);
        assert_eq!(c.max_stage_latency_ms, 1000.0);
        assert_eq!(c.min_stages, 1);
        assert_eq!(c.max_stages, 8);
        assert!(c.prefer_fast_devices);
        assert!(!c.allow_cross_node_duplicates);
    }

    #[test]
    fn test_min_stages_zero_rejected() {
        let c = PlanningConstraints {
            min_stages: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(PlannerError::InvalidConstraints(_))));
    }

    #[test]
    fn test_max_below_min_rejected() {
        let c = PlanningConstraints {
            min_stages: 4,
            max_stages: 2,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_non_positive_ceiling_rejected() {
        let c = PlanningConstraints {
            max_vram_per_stage_gb: 0.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_target_above_cap_rejected() {
        let c = PlanningConstraints {
            target_stage_latency_ms: 2000.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_sparse_toml() {
        let c: PlanningConstraints = toml::from_str("max_stages = 4\n").unwrap();
        assert_eq!(c.max_stages, 4);
        assert_eq!(c.max_vram_per_stage_gb, 24.0);
        c.validate().unwrap();
    }
}
