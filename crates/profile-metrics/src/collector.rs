// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The session-scoped metrics store.
//!
//! A [`MetricsCollector`] owns one profiling session's measurements:
//! a map from layer name to the ordered list of finalized
//! [`LayerMetrics`] records, plus the set of currently open measurement
//! windows keyed by [`MonitorToken`].
//!
//! # Lifecycle
//!
//! ```text
//! start_layer_monitoring ──► (enrichment calls) ──► stop_layer_monitoring
//!        open window            record_* on the          finalize + append,
//!                               open window              percentiles filled
//! ```
//!
//! History is append-only and records are never mutated after the append.
//! Profiling writes from a single thread by contract; the internal mutex
//! hardens the store against processes that profile several graphs
//! concurrently.

use crate::{LayerMetrics, MetricsError};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::{Mutex, MutexGuard};

/// Identifies one open measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorToken(u64);

#[derive(Debug, Default)]
struct CollectorInner {
    /// Finalized records per layer, in finalization order.
    history: HashMap<String, Vec<LayerMetrics>>,
    /// Layer names in first-seen order, for stable iteration and export.
    order: Vec<String>,
    /// Open measurement windows.
    in_flight: HashMap<u64, LayerMetrics>,
    next_token: u64,
}

/// Accumulates [`LayerMetrics`] across repeated profiling runs.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<CollectorInner>,
}

impl MetricsCollector {
    /// Creates an empty collector for a new profiling session.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorInner> {
        // A panic inside a hook must not wedge the whole session.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Opens a measurement window for one layer execution.
    ///
    /// The returned token feeds the enrichment calls and
    /// [`stop_layer_monitoring`](Self::stop_layer_monitoring).
    pub fn start_layer_monitoring(
        &self,
        layer_name: &str,
        layer_type: &str,
        layer_index: usize,
    ) -> MonitorToken {
        let mut inner = self.lock();
        let token = inner.next_token;
        inner.next_token += 1;
        inner
            .in_flight
            .insert(token, LayerMetrics::open(layer_name, layer_type, layer_index));
        MonitorToken(token)
    }

    /// Records the parameter count on an open window.
    ///
    /// Ignored with a warning if the window is already finalized.
    pub fn record_parameter_info(&self, token: MonitorToken, num_parameters: u64) {
        let mut inner = self.lock();
        match inner.in_flight.get_mut(&token.0) {
            Some(open) => open.num_parameters = num_parameters,
            None => tracing::warn!(token = token.0, "parameter info for a closed window dropped"),
        }
    }

    /// Records the post-execution memory snapshot and device tag on an
    /// open window.
    pub fn record_memory(&self, token: MonitorToken, peak_vram_after: u64, device: &str) {
        let mut inner = self.lock();
        match inner.in_flight.get_mut(&token.0) {
            Some(open) => {
                open.peak_vram_after = peak_vram_after;
                open.device = device.to_string();
            }
            None => tracing::warn!(token = token.0, "memory snapshot for a closed window dropped"),
        }
    }

    /// Finalizes a measurement window and appends it to the history.
    ///
    /// Fills `forward_latency_ms` and the p50/p95/p99 aggregates computed
    /// over this layer's full latency history (including this run). The
    /// record is immutable from this point on.
    pub fn stop_layer_monitoring(
        &self,
        token: MonitorToken,
        latency_ms: f64,
    ) -> Result<(), MetricsError> {
        let mut inner = self.lock();
        let mut record = inner
            .in_flight
            .remove(&token.0)
            .ok_or(MetricsError::UnknownToken { token: token.0 })?;
        record.forward_latency_ms = latency_ms;

        let mut latencies: Vec<f64> = inner
            .history
            .get(&record.layer_name)
            .map(|runs| runs.iter().map(|r| r.forward_latency_ms).collect())
            .unwrap_or_default();
        latencies.push(latency_ms);
        latencies.sort_by(f64::total_cmp);
        record.p50_latency_ms = percentile(&latencies, 0.50);
        record.p95_latency_ms = percentile(&latencies, 0.95);
        record.p99_latency_ms = percentile(&latencies, 0.99);

        if !inner.history.contains_key(&record.layer_name) {
            inner.order.push(record.layer_name.clone());
        }
        inner
            .history
            .entry(record.layer_name.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    /// Returns the most recent finalized record for a layer.
    pub fn latest(&self, layer_name: &str) -> Option<LayerMetrics> {
        self.lock()
            .history
            .get(layer_name)
            .and_then(|runs| runs.last().cloned())
    }

    /// Returns the latest record per layer, ascending by `layer_index`
    /// (ties broken by name). This is the planner's input.
    pub fn latest_metrics(&self) -> Vec<LayerMetrics> {
        let inner = self.lock();
        let mut latest: Vec<LayerMetrics> = inner
            .history
            .values()
            .filter_map(|runs| runs.last().cloned())
            .collect();
        latest.sort_by(|a, b| {
            a.layer_index
                .cmp(&b.layer_index)
                .then_with(|| a.layer_name.cmp(&b.layer_name))
        });
        latest
    }

    /// Returns the full finalized history for a layer, in run order.
    pub fn history(&self, layer_name: &str) -> Vec<LayerMetrics> {
        self.lock()
            .history
            .get(layer_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of finalized runs recorded for a layer.
    pub fn run_count(&self, layer_name: &str) -> usize {
        self.lock()
            .history
            .get(layer_name)
            .map(|runs| runs.len())
            .unwrap_or(0)
    }

    /// Number of distinct layers with at least one finalized record.
    pub fn num_layers(&self) -> usize {
        self.lock().history.len()
    }

    /// Returns `true` if no measurement has been finalized yet.
    pub fn is_empty(&self) -> bool {
        self.lock().history.is_empty()
    }

    /// Returns a one-line session summary suitable for logging.
    pub fn summary(&self) -> String {
        let inner = self.lock();
        let measurements: usize = inner.history.values().map(|runs| runs.len()).sum();
        drop(inner);
        let total_latency: f64 = self
            .latest_metrics()
            .iter()
            .map(|m| m.forward_latency_ms)
            .sum();
        format!(
            "Session: {} layers, {} measurements, {:.2} ms total latest latency",
            self.num_layers(),
            measurements,
            total_latency,
        )
    }

    /// Writes every finalized measurement as line-delimited JSON.
    ///
    /// Layers appear in first-seen order, runs in finalization order.
    pub fn export_jsonl<W: Write>(&self, writer: &mut W) -> Result<(), MetricsError> {
        let inner = self.lock();
        for name in &inner.order {
            for run in inner.history.get(name).into_iter().flatten() {
                let line = serde_json::to_string(run)?;
                writeln!(writer, "{line}")?;
            }
        }
        Ok(())
    }

    /// Reconstructs a collector from a JSONL export.
    ///
    /// Records are appended in line order, so per-layer histories and
    /// "latest per layer" match the exporting session.
    pub fn import_jsonl<R: BufRead>(reader: R) -> Result<Self, MetricsError> {
        let collector = Self::new();
        {
            let mut inner = collector.lock();
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: LayerMetrics =
                    serde_json::from_str(&line).map_err(|e| MetricsError::Parse {
                        line: idx + 1,
                        detail: e.to_string(),
                    })?;
                if !inner.history.contains_key(&record.layer_name) {
                    inner.order.push(record.layer_name.clone());
                }
                inner
                    .history
                    .entry(record.layer_name.clone())
                    .or_default()
                    .push(record);
            }
        }
        Ok(collector)
    }
}

/// Nearest-rank percentile over a latency list sorted ascending.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * q) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_run(collector: &MetricsCollector, name: &str, index: usize, latency: f64) {
        let token = collector.start_layer_monitoring(name, "linear", index);
        collector.record_parameter_info(token, 1000);
        collector.record_memory(token, 2 * 1024 * 1024, "cpu");
        collector.stop_layer_monitoring(token, latency).unwrap();
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let c = MetricsCollector::new();
        assert!(c.is_empty());
        record_run(&c, "h.0", 0, 12.5);

        assert!(!c.is_empty());
        assert_eq!(c.num_layers(), 1);
        assert_eq!(c.run_count("h.0"), 1);

        let m = c.latest("h.0").unwrap();
        assert_eq!(m.forward_latency_ms, 12.5);
        assert_eq!(m.num_parameters, 1000);
        assert_eq!(m.peak_vram_after, 2 * 1024 * 1024);
        assert_eq!(m.device, "cpu");
    }

    #[test]
    fn test_history_is_append_only_and_ordered() {
        let c = MetricsCollector::new();
        for latency in [10.0, 20.0, 30.0] {
            record_run(&c, "h.0", 0, latency);
        }
        let runs = c.history("h.0");
        let latencies: Vec<f64> = runs.iter().map(|r| r.forward_latency_ms).collect();
        assert_eq!(latencies, vec![10.0, 20.0, 30.0]);
        // Earlier records are untouched by later finalizations.
        assert_eq!(runs[0].p50_latency_ms, 10.0);
    }

    #[test]
    fn test_latest_is_last_finalized() {
        let c = MetricsCollector::new();
        record_run(&c, "h.0", 0, 10.0);
        record_run(&c, "h.0", 0, 99.0);
        assert_eq!(c.latest("h.0").unwrap().forward_latency_ms, 99.0);
    }

    #[test]
    fn test_percentiles_across_runs() {
        let c = MetricsCollector::new();
        for latency in [10.0, 20.0, 30.0, 40.0] {
            record_run(&c, "h.0", 0, latency);
        }
        let m = c.latest("h.0").unwrap();
        // Sorted history: [10, 20, 30, 40]; nearest-rank indices 2, 3, 3.
        assert_eq!(m.p50_latency_ms, 30.0);
        assert_eq!(m.p95_latency_ms, 40.0);
        assert_eq!(m.p99_latency_ms, 40.0);
    }

    #[test]
    fn test_single_run_percentiles_equal_latency() {
        let c = MetricsCollector::new();
        record_run(&c, "h.0", 0, 42.0);
        let m = c.latest("h.0").unwrap();
        assert_eq!(m.p50_latency_ms, 42.0);
        assert_eq!(m.p99_latency_ms, 42.0);
    }

    #[test]
    fn test_unknown_token_is_an_error() {
        let c = MetricsCollector::new();
        let token = c.start_layer_monitoring("h.0", "linear", 0);
        c.stop_layer_monitoring(token, 5.0).unwrap();
        // Double finalization must fail, not corrupt the history.
        let err = c.stop_layer_monitoring(token, 6.0).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownToken { .. }));
        assert_eq!(c.run_count("h.0"), 1);
    }

    #[test]
    fn test_enrichment_after_stop_is_dropped() {
        let c = MetricsCollector::new();
        let token = c.start_layer_monitoring("h.0", "linear", 0);
        c.stop_layer_monitoring(token, 5.0).unwrap();
        c.record_parameter_info(token, 777);
        assert_eq!(c.latest("h.0").unwrap().num_parameters, 0);
    }

    #[test]
    fn test_latest_metrics_sorted_by_index() {
        let c = MetricsCollector::new();
        record_run(&c, "lm_head", 2, 15.0);
        record_run(&c, "wte", 0, 25.0);
        record_run(&c, "h.0", 1, 30.0);

        let latest = c.latest_metrics();
        let names: Vec<&str> = latest.iter().map(|m| m.layer_name.as_str()).collect();
        assert_eq!(names, vec!["wte", "h.0", "lm_head"]);
    }

    #[test]
    fn test_export_jsonl_one_record_per_measurement() {
        let c = MetricsCollector::new();
        record_run(&c, "wte", 0, 25.0);
        record_run(&c, "h.0", 1, 30.0);
        record_run(&c, "h.0", 1, 31.0);

        let mut buf = Vec::new();
        c.export_jsonl(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        // First-seen layer order, then run order.
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["layer_name"], "wte");
        let third: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(third["forward_latency_ms"], 31.0);
    }

    #[test]
    fn test_import_jsonl_roundtrip() {
        let c = MetricsCollector::new();
        record_run(&c, "wte", 0, 25.0);
        record_run(&c, "h.0", 1, 30.0);
        record_run(&c, "h.0", 1, 35.0);

        let mut buf = Vec::new();
        c.export_jsonl(&mut buf).unwrap();
        let imported = MetricsCollector::import_jsonl(buf.as_slice()).unwrap();

        assert_eq!(imported.num_layers(), 2);
        assert_eq!(imported.run_count("h.0"), 2);
        assert_eq!(imported.latest_metrics(), c.latest_metrics());
    }

    #[test]
    fn test_import_jsonl_rejects_garbage() {
        let data = b"{\"layer_name\": 42}\n" as &[u8];
        let err = MetricsCollector::import_jsonl(data).unwrap_err();
        assert!(matches!(err, MetricsError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_summary() {
        let c = MetricsCollector::new();
        record_run(&c, "wte", 0, 25.0);
        record_run(&c, "h.0", 1, 30.0);
        let s = c.summary();
        assert!(s.contains("2 layers"));
        assert!(s.contains("2 measurements"));
        assert!(s.contains("55.00 ms"));
    }
}
