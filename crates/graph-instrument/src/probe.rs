// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device probes: sync barriers and memory snapshots.
//!
//! Accurate per-layer timing on devices with asynchronous execution
//! queues requires draining the queue at both edges of the measurement
//! window. A [`DeviceProbe`] abstracts that barrier together with a
//! point-in-time memory reading; the built-in [`HostProbe`] covers
//! synchronous CPU-only backends, where the barrier is a no-op.

use std::path::Path;

/// A probe operation failed.
///
/// Probe failures are always recoverable: hooks log them and fall back
/// to zero-valued fields rather than disturbing the host computation.
#[derive(Debug, thiserror::Error)]
#[error("device probe failure: {0}")]
pub struct ProbeError(pub String);

/// Blocking device synchronization and memory introspection.
pub trait DeviceProbe: Send + Sync {
    /// Tag recorded on measurements taken through this probe
    /// (e.g., `"cuda:0"`, `"cpu"`).
    fn device_tag(&self) -> String;

    /// Blocks until all previously queued asynchronous work on the
    /// device has completed. Must be a no-op on synchronous backends.
    fn synchronize(&self) -> Result<(), ProbeError>;

    /// Returns the device memory currently in use, in bytes.
    fn memory_used_bytes(&self) -> Result<u64, ProbeError>;
}

/// Default path to the process memory stats file.
const STATM_PATH: &str = "/proc/self/statm";

/// Probe for synchronous host (CPU) execution.
///
/// `synchronize` is a no-op; memory is the process resident set read
/// from `/proc/self/statm`. Off Linux the reading degrades to zero
/// rather than failing the measurement.
#[derive(Debug, Clone, Default)]
pub struct HostProbe;

impl HostProbe {
    pub fn new() -> Self {
        Self
    }

    /// Parses the resident-set field of a `/proc/self/statm` line.
    ///
    /// Format: `size resident shared text lib data dt` (pages).
    fn parse_statm(content: &str) -> Result<u64, ProbeError> {
        let resident_pages: u64 = content
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| ProbeError("statm: missing resident field".into()))?
            .parse()
            .map_err(|_| ProbeError("statm: resident field is not an integer".into()))?;
        Ok(resident_pages * page_size())
    }
}

/// System page size in bytes. 4 KiB everywhere this runs in practice.
fn page_size() -> u64 {
    4096
}

impl DeviceProbe for HostProbe {
    fn device_tag(&self) -> String {
        "cpu".to_string()
    }

    fn synchronize(&self) -> Result<(), ProbeError> {
        // Host execution is synchronous; nothing queued to drain.
        Ok(())
    }

    fn memory_used_bytes(&self) -> Result<u64, ProbeError> {
        if !Path::new(STATM_PATH).exists() {
            return Ok(0);
        }
        let content = std::fs::read_to_string(STATM_PATH)
            .map_err(|e| ProbeError(format!("cannot read {STATM_PATH}: {e}")))?;
        Self::parse_statm(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_probe_tag() {
        assert_eq!(HostProbe::new().device_tag(), "cpu");
    }

    #[test]
    fn test_synchronize_is_noop() {
        HostProbe::new().synchronize().unwrap();
    }

    #[test]
    fn test_parse_statm() {
        let bytes = HostProbe::parse_statm("12345 678 90 1 0 23 0").unwrap();
        assert_eq!(bytes, 678 * 4096);
    }

    #[test]
    fn test_parse_statm_malformed() {
        assert!(HostProbe::parse_statm("").is_err());
        assert!(HostProbe::parse_statm("12345 abc").is_err());
    }

    #[test]
    fn test_memory_used_on_host() {
        // On Linux the resident set of a running test is never zero.
        let bytes = HostProbe::new().memory_used_bytes().unwrap();
        if Path::new(STATM_PATH).exists() {
            assert!(bytes > 0);
        }
    }
}
