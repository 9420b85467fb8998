// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-instrument
//!
//! Attaches measurement hooks to a layered computation graph without
//! altering its observable behavior.
//!
//! The host graph is an external collaborator reached through two small
//! traits: [`LayeredGraph`] (a deterministic traversal of instrumentable
//! units in true execution order) and [`GraphUnit`] (a stable name/type
//! plus an invoke-boundary registration hook). Timing correctness on
//! asynchronous backends comes from the [`DeviceProbe`] sync barrier,
//! issued before and after every instrumented invocation.
//!
//! # Contract
//!
//! - Hooks never panic or propagate errors into the host computation;
//!   measurement failures degrade to zero-valued fields and a warning.
//! - `layer_index` is fixed once, at attach time, from the traversal
//!   order. It is never re-derived per call.
//! - [`Instrumentor::detach`] removes every callback, restoring the
//!   graph's original behavior exactly.
//!
//! # Example
//! ```ignore
//! let collector = Arc::new(MetricsCollector::new());
//! let mut instrumentor = Instrumentor::new(collector.clone(), Arc::new(HostProbe::new()));
//! let hooked = instrumentor.attach(&mut graph);
//! tracing::info!("instrumented {hooked} units");
//! graph.forward(&input); // measured
//! instrumentor.detach(&mut graph);
//! graph.forward(&input); // untouched
//! ```

mod hook;
mod instrumentor;
mod probe;

pub use hook::LayerHook;
pub use instrumentor::{GraphUnit, Instrumentor, InvokeObserver, LayeredGraph};
pub use probe::{DeviceProbe, HostProbe, ProbeError};
