// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-measurement record emitted by instrumentation.
//!
//! One [`LayerMetrics`] describes exactly one execution of one layer.
//! Records are created by the collector when a measurement window opens,
//! enriched while the window is live, and frozen on finalization —
//! nothing mutates a record once it has been appended to the history.

/// Metrics for a single layer execution.
///
/// `layer_index` is the authoritative execution order: unique per layer
/// name and monotone with the true dependency order of the graph. The
/// planner orders layers by this field, never by latency or memory.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerMetrics {
    /// Stable layer identifier (e.g., `"transformer.h.0.attn"`).
    pub layer_name: String,
    /// Layer kind label (e.g., `"self_attention"`).
    pub layer_type: String,
    /// Position in the graph's execution order, fixed at attach time.
    pub layer_index: usize,
    /// Wall-clock forward latency for this execution in milliseconds.
    pub forward_latency_ms: f64,
    /// Median latency across this layer's history at finalization time.
    pub p50_latency_ms: f64,
    /// 95th-percentile latency across this layer's history.
    pub p95_latency_ms: f64,
    /// 99th-percentile latency across this layer's history.
    pub p99_latency_ms: f64,
    /// Trainable parameters owned by this layer.
    pub num_parameters: u64,
    /// Device memory in use after this layer executed, in bytes.
    pub peak_vram_after: u64,
    /// Device the layer executed on (e.g., `"cuda:0"`, `"cpu"`).
    pub device: String,
}

impl LayerMetrics {
    /// Creates an open (not yet finalized) record with zeroed measurements.
    pub(crate) fn open(layer_name: &str, layer_type: &str, layer_index: usize) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            layer_type: layer_type.to_string(),
            layer_index,
            forward_latency_ms: 0.0,
            p50_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            num_parameters: 0,
            peak_vram_after: 0,
            device: String::new(),
        }
    }

    /// Returns this layer's memory footprint in megabytes.
    pub fn memory_mb(&self) -> f64 {
        self.peak_vram_after as f64 / (1024.0 * 1024.0)
    }

    /// Returns a concise one-line summary for logs and CLI tables.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} ({}) — {:.2} ms, {:.1} MB, {} params",
            self.layer_index,
            self.layer_name,
            self.layer_type,
            self.forward_latency_ms,
            self.memory_mb(),
            self.num_parameters,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_record_is_zeroed() {
        let m = LayerMetrics::open("h.0.attn", "self_attention", 3);
        assert_eq!(m.layer_name, "h.0.attn");
        assert_eq!(m.layer_index, 3);
        assert_eq!(m.forward_latency_ms, 0.0);
        assert_eq!(m.num_parameters, 0);
        assert!(m.device.is_empty());
    }

    #[test]
    fn test_memory_mb() {
        let mut m = LayerMetrics::open("l", "linear", 0);
        m.peak_vram_after = 512 * 1024 * 1024;
        assert!((m.memory_mb() - 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary() {
        let mut m = LayerMetrics::open("lm_head", "linear", 25);
        m.forward_latency_ms = 15.0;
        m.num_parameters = 1_000_000;
        let s = m.summary();
        assert!(s.contains("[25]"));
        assert!(s.contains("lm_head"));
        assert!(s.contains("15.00 ms"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut m = LayerMetrics::open("h.1.mlp", "feed_forward", 7);
        m.forward_latency_ms = 31.25;
        m.peak_vram_after = 1024;
        m.device = "cuda:0".into();
        let json = serde_json::to_string(&m).unwrap();
        let back: LayerMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_export_field_names() {
        let m = LayerMetrics::open("wte", "embedding", 0);
        let value: serde_json::Value = serde_json::to_value(&m).unwrap();
        for field in [
            "layer_name",
            "layer_type",
            "layer_index",
            "forward_latency_ms",
            "p50_latency_ms",
            "p95_latency_ms",
            "p99_latency_ms",
            "num_parameters",
            "peak_vram_after",
            "device",
        ] {
            assert!(value.get(field).is_some(), "missing field '{field}'");
        }
    }
}
