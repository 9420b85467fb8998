// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the execution planner.

/// Errors that can occur during partition planning.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// The node list handed to the planner is empty.
    #[error("no nodes available for planning")]
    NoAvailableNodes,

    /// No layer has a finalized measurement to plan from.
    #[error("no layer metrics available for planning")]
    NoMetrics,

    /// The caller-supplied constraints are inconsistent.
    #[error("invalid planning constraints: {0}")]
    InvalidConstraints(String),

    /// The strategy name does not match any known strategy.
    #[error("unknown strategy '{0}'; expected 'balanced', 'bottleneck_first', 'memory_aware', or 'latency_optimized'")]
    UnknownStrategy(String),

    /// A strategy produced stages that violate the planning contract.
    #[error("strategy '{strategy}' failed: {detail}")]
    StrategyFailed { strategy: String, detail: String },

    /// A partition plan is structurally inconsistent.
    #[error("invalid partition plan: {0}")]
    InvalidPlan(String),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
