//! Operator-level simulator settings.

use std::time::Duration;

/// Timeout applied when a request does not carry its own.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Upper bound on the gas any single estimation call may use.
pub const DEFAULT_GAS_CAP: u64 = 50_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    pub default_timeout: Duration,
    /// Zero disables the cap.
    pub gas_cap: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { default_timeout: DEFAULT_TIMEOUT, gas_cap: DEFAULT_GAS_CAP }
    }
}

impl SimConfig {
    /// Resolves a per-request timeout in milliseconds. Zero disables the limit.
    pub fn timeout(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms.map(Duration::from_millis).unwrap_or(self.default_timeout)
    }
}
