// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # profile-metrics
//!
//! Collects per-layer execution measurements during profiling runs and
//! exposes them as planning input.
//!
//! A profiling session owns one [`MetricsCollector`]. Instrumentation
//! opens a measurement window per layer invocation
//! ([`MetricsCollector::start_layer_monitoring`]), enriches it with
//! parameter and memory data, and finalizes it with the observed latency
//! ([`MetricsCollector::stop_layer_monitoring`]). Finalized records are
//! immutable and accumulate in an append-only per-layer history; the
//! planner consumes the latest record per layer.
//!
//! # Export
//!
//! [`MetricsCollector::export_jsonl`] writes one JSON record per
//! measurement for external report tooling;
//! [`MetricsCollector::import_jsonl`] reconstructs a collector from such
//! an export so plans can be generated offline.
//!
//! # Example
//! ```
//! use profile_metrics::MetricsCollector;
//!
//! let collector = MetricsCollector::new();
//! let token = collector.start_layer_monitoring("h.0.attn", "self_attention", 0);
//! collector.record_parameter_info(token, 7_087_872);
//! collector.record_memory(token, 512 * 1024 * 1024, "cuda:0");
//! collector.stop_layer_monitoring(token, 42.5).unwrap();
//!
//! let latest = collector.latest("h.0.attn").unwrap();
//! assert_eq!(latest.forward_latency_ms, 42.5);
//! ```

mod collector;
mod error;
mod record;

pub use collector::{MetricsCollector, MonitorToken};
pub use error::MetricsError;
pub use record::LayerMetrics;
