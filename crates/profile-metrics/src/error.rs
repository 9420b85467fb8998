// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for metrics collection and export.

/// Errors that can occur while collecting or exporting metrics.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The monitor token does not correspond to an open measurement window.
    #[error("unknown monitor token {token}: the window was never opened or is already finalized")]
    UnknownToken { token: u64 },

    /// Reading or writing a metrics stream failed.
    #[error("metrics I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized for export.
    #[error("metrics serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An imported JSONL line is not a valid metrics record.
    #[error("malformed metrics record at line {line}: {detail}")]
    Parse { line: usize, detail: String },
}
