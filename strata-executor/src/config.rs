//! Executor configuration.

use std::time::Duration;
use strata_core::error::{Result, StrataError};

/// Default budget for each phase of `finish_execution` when a host does not
/// pass its own timeout.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration shared by the batch and reactive executors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of units executing at once on the worker pool.
    ///
    /// `None` means unbounded: every unit of a wavefront runs concurrently.
    /// Set to `Some(1)` for sequential execution (debugging).
    pub max_concurrent_units: Option<usize>,
    /// Timeout for a single unit execution. `None` disables it.
    pub unit_timeout: Option<Duration>,
    /// Budget for each phase of a shutdown (graceful, then forced).
    pub shutdown_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: None,
            unit_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ExecutorConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `STRATA_MAX_CONCURRENT_UNITS`: Maximum concurrent unit executions
    /// - `STRATA_UNIT_TIMEOUT_MS`: Unit execution timeout in milliseconds
    /// - `STRATA_SHUTDOWN_TIMEOUT_MS`: Per-phase shutdown budget in milliseconds
    ///
    /// Unset or unparsable variables fall back to the defaults.
    ///
    /// # Example
    ///
    /// ```bash
    /// export STRATA_MAX_CONCURRENT_UNITS=8
    /// export STRATA_UNIT_TIMEOUT_MS=30000
    /// ```
    pub fn from_env() -> Self {
        let max_concurrent_units = std::env::var("STRATA_MAX_CONCURRENT_UNITS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());

        let unit_timeout = std::env::var("STRATA_UNIT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis);

        let shutdown_timeout = std::env::var("STRATA_SHUTDOWN_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        Self {
            max_concurrent_units,
            unit_timeout,
            shutdown_timeout,
        }
    }

    /// Bound the number of concurrently executing units.
    pub fn with_max_concurrent_units(mut self, limit: usize) -> Self {
        self.max_concurrent_units = Some(limit);
        self
    }

    /// Set the per-unit execution timeout.
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = Some(timeout);
        self
    }

    /// Set the per-phase shutdown budget.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Reject values the executor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_units == Some(0) {
            return Err(StrataError::ConfigValue {
                field: "max_concurrent_units".to_string(),
                cause: "must be at least 1".to_string(),
            });
        }
        if self.unit_timeout == Some(Duration::ZERO) {
            return Err(StrataError::ConfigValue {
                field: "unit_timeout".to_string(),
                cause: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
