// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-unit measurement hook.
//!
//! One [`LayerHook`] wraps one graph unit. `before_invoke` opens a
//! timing+memory window, `after_invoke` closes it and hands the result
//! to the collector. Both edges issue the probe's sync barrier so that
//! asynchronous device work is attributed to the right layer.
//!
//! Hooks sit inside the host's forward path, so every failure mode here
//! degrades: probe errors become zero-valued fields, collector errors
//! become warnings, and a window opened twice (a concurrency-contract
//! violation by the host) drops the stale window instead of corrupting
//! the fresh one.

use crate::instrumentor::InvokeObserver;
use crate::DeviceProbe;
use profile_metrics::{MetricsCollector, MonitorToken};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug)]
struct OpenWindow {
    token: MonitorToken,
    started: Instant,
}

/// Measurement hook installed on a single graph unit.
pub struct LayerHook {
    layer_name: String,
    layer_type: String,
    layer_index: usize,
    /// Snapshotted at attach time; units do not change shape mid-session.
    num_parameters: u64,
    collector: Arc<MetricsCollector>,
    probe: Arc<dyn DeviceProbe>,
    window: Mutex<Option<OpenWindow>>,
}

impl LayerHook {
    pub(crate) fn new(
        layer_name: &str,
        layer_type: &str,
        layer_index: usize,
        num_parameters: u64,
        collector: Arc<MetricsCollector>,
        probe: Arc<dyn DeviceProbe>,
    ) -> Self {
        Self {
            layer_name: layer_name.to_string(),
            layer_type: layer_type.to_string(),
            layer_index,
            num_parameters,
            collector,
            probe,
            window: Mutex::new(None),
        }
    }

    /// Name of the unit this hook wraps.
    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    /// Execution-order index assigned at attach time.
    pub fn layer_index(&self) -> usize {
        self.layer_index
    }

    fn window(&self) -> std::sync::MutexGuard<'_, Option<OpenWindow>> {
        match self.window.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl InvokeObserver for LayerHook {
    fn before_invoke(&self) {
        // Drain async work queued by *previous* layers so it is not
        // billed to this one.
        if let Err(e) = self.probe.synchronize() {
            tracing::warn!(layer = %self.layer_name, "pre-invoke sync failed: {e}");
        }

        let token = self.collector.start_layer_monitoring(
            &self.layer_name,
            &self.layer_type,
            self.layer_index,
        );
        self.collector.record_parameter_info(token, self.num_parameters);

        let stale = self.window().replace(OpenWindow {
            token,
            started: Instant::now(),
        });
        if stale.is_some() {
            tracing::warn!(
                layer = %self.layer_name,
                "overlapping invocations on one unit; dropping the stale measurement window",
            );
        }
    }

    fn after_invoke(&self) {
        // Drain this unit's own async work before reading the clock.
        if let Err(e) = self.probe.synchronize() {
            tracing::warn!(layer = %self.layer_name, "post-invoke sync failed: {e}");
        }

        let Some(open) = self.window().take() else {
            tracing::warn!(
                layer = %self.layer_name,
                "after_invoke without a matching before_invoke; measurement skipped",
            );
            return;
        };
        let latency_ms = open.started.elapsed().as_secs_f64() * 1000.0;

        let memory = self.probe.memory_used_bytes().unwrap_or_else(|e| {
            tracing::warn!(layer = %self.layer_name, "memory snapshot failed: {e}");
            0
        });
        self.collector
            .record_memory(open.token, memory, &self.probe.device_tag());

        if let Err(e) = self.collector.stop_layer_monitoring(open.token, latency_ms) {
            tracing::warn!(layer = %self.layer_name, "finalization failed: {e}");
        }
    }
}

impl std::fmt::Debug for LayerHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerHook")
            .field("layer_name", &self.layer_name)
            .field("layer_index", &self.layer_index)
            .finish()
    }
}
