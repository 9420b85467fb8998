// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph traversal traits and the attach/detach driver.
//!
//! The host runtime implements [`LayeredGraph`] and [`GraphUnit`];
//! everything else stays on this side of the seam. [`Instrumentor::attach`]
//! walks the traversal exactly once, assigning each unit its
//! `layer_index` from the traversal position — the index is fixed here
//! and never re-derived during invocation.

use crate::{DeviceProbe, LayerHook};
use profile_metrics::MetricsCollector;
use std::sync::Arc;

/// Invoke-boundary callbacks installed on a [`GraphUnit`].
///
/// Implementations must not panic: they run inside the host's forward
/// path.
pub trait InvokeObserver: Send + Sync {
    /// Called immediately before the unit executes.
    fn before_invoke(&self);
    /// Called immediately after the unit's outputs are available.
    fn after_invoke(&self);
}

/// One instrumentable unit of a layered graph.
///
/// While an observer is installed the unit must call
/// [`InvokeObserver::before_invoke`] / [`after_invoke`](InvokeObserver::after_invoke)
/// around every invocation, and must behave exactly as before once the
/// observer is removed.
pub trait GraphUnit {
    /// Stable identifier, unique within the graph.
    fn name(&self) -> &str;
    /// Unit kind label (e.g., `"self_attention"`, `"linear"`).
    fn kind(&self) -> &str;
    /// Trainable parameters owned by this unit.
    fn num_parameters(&self) -> u64;
    /// Installs or removes the invoke-boundary observer.
    fn set_observer(&mut self, observer: Option<Arc<dyn InvokeObserver>>);
}

/// A layered computation graph exposing its units for instrumentation.
pub trait LayeredGraph {
    /// Visits every instrumentable unit exactly once, in true execution
    /// order. The traversal must be deterministic: repeated calls visit
    /// the same units in the same order.
    fn visit_units(&mut self, visit: &mut dyn FnMut(&mut dyn GraphUnit));
}

/// Attaches measurement hooks to a graph and removes them again.
pub struct Instrumentor {
    collector: Arc<MetricsCollector>,
    probe: Arc<dyn DeviceProbe>,
    hooks: Vec<Arc<LayerHook>>,
}

impl Instrumentor {
    /// Creates an instrumentor that reports into `collector` and
    /// measures through `probe`.
    pub fn new(collector: Arc<MetricsCollector>, probe: Arc<dyn DeviceProbe>) -> Self {
        Self {
            collector,
            probe,
            hooks: Vec::new(),
        }
    }

    /// Installs one [`LayerHook`] per unit and returns the hook count.
    ///
    /// `layer_index` is assigned from the traversal position. Attaching
    /// again re-walks the graph and replaces any hooks from a previous
    /// attach.
    pub fn attach<G: LayeredGraph + ?Sized>(&mut self, graph: &mut G) -> usize {
        if !self.hooks.is_empty() {
            tracing::warn!("re-attaching: previous hooks are replaced");
            self.hooks.clear();
        }

        let collector = &self.collector;
        let probe = &self.probe;
        let hooks = &mut self.hooks;
        graph.visit_units(&mut |unit| {
            let index = hooks.len();
            let hook = Arc::new(LayerHook::new(
                unit.name(),
                unit.kind(),
                index,
                unit.num_parameters(),
                collector.clone(),
                probe.clone(),
            ));
            unit.set_observer(Some(hook.clone()));
            hooks.push(hook);
        });

        tracing::info!("attached {} hooks", self.hooks.len());
        self.hooks.len()
    }

    /// Removes every observer installed by [`attach`](Self::attach),
    /// restoring the graph's original behavior.
    pub fn detach<G: LayeredGraph + ?Sized>(&mut self, graph: &mut G) {
        graph.visit_units(&mut |unit| unit.set_observer(None));
        tracing::info!("detached {} hooks", self.hooks.len());
        self.hooks.clear();
    }

    /// Number of currently installed hooks.
    pub fn num_hooks(&self) -> usize {
        self.hooks.len()
    }

    /// Names of the instrumented units, in execution order.
    pub fn layer_names(&self) -> Vec<String> {
        self.hooks.iter().map(|h| h.layer_name().to_string()).collect()
    }
}

impl std::fmt::Debug for Instrumentor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentor")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
