// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared CLI plumbing.

pub mod compare;
pub mod demo;
pub mod inspect;
pub mod plan;

use anyhow::Context;
use profile_metrics::MetricsCollector;
use std::io::BufReader;
use std::path::Path;

/// Initialises tracing from the `-v` count; `RUST_LOG` wins when set.
pub fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads a collector from a JSONL metrics export.
pub fn load_metrics(path: &Path) -> anyhow::Result<MetricsCollector> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open metrics file '{}'", path.display()))?;
    let collector = MetricsCollector::import_jsonl(BufReader::new(file))
        .with_context(|| format!("cannot parse metrics file '{}'", path.display()))?;
    anyhow::ensure!(
        !collector.is_empty(),
        "metrics file '{}' contains no finalized measurements",
        path.display(),
    );
    Ok(collector)
}
