//! Execution counters.
//!
//! Lock-free counters updated by the executors and readable at any time.
//! Hosts export them to whatever metrics backend they use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for runs and unit executions.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    /// Total runs started (full and triggered).
    pub runs_started: AtomicU64,
    /// Runs that finished without fault or cancellation.
    pub runs_completed: AtomicU64,
    /// Runs that ended with a fault.
    pub runs_failed: AtomicU64,
    /// Runs that observed a cancellation request.
    pub runs_cancelled: AtomicU64,
    /// Runs started by a configuration change.
    pub triggered_runs: AtomicU64,
    /// Currently active runs.
    pub runs_active: AtomicU64,
    /// Unit executions that completed successfully.
    pub units_executed: AtomicU64,
    /// Unit executions that faulted, timed out or panicked.
    pub units_failed: AtomicU64,
    /// Total run time in microseconds.
    pub total_run_us: AtomicU64,
}

impl ExecutionMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run start.
    pub fn record_run_start(&self, triggered: bool) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        self.runs_active.fetch_add(1, Ordering::Relaxed);
        if triggered {
            self.triggered_runs.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a run end.
    ///
    /// A run that both faulted and was cancelled counts as failed.
    pub fn record_run_end(&self, failed: bool, cancelled: bool, elapsed: Duration) {
        let counter = if failed {
            &self.runs_failed
        } else if cancelled {
            &self.runs_cancelled
        } else {
            &self.runs_completed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.runs_active.fetch_sub(1, Ordering::Relaxed);
        self.total_run_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a successful unit execution.
    pub fn record_unit_executed(&self) {
        self.units_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed unit execution.
    pub fn record_unit_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current failure rate (failed runs / started runs).
    pub fn failure_rate(&self) -> f64 {
        let started = self.runs_started.load(Ordering::Relaxed);
        let failed = self.runs_failed.load(Ordering::Relaxed);
        if started == 0 {
            0.0
        } else {
            failed as f64 / started as f64
        }
    }

    /// Average run time, if any run has ended.
    pub fn average_run_time(&self) -> Option<Duration> {
        let ended = self.runs_completed.load(Ordering::Relaxed)
            + self.runs_failed.load(Ordering::Relaxed)
            + self.runs_cancelled.load(Ordering::Relaxed);
        if ended == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.total_run_us.load(Ordering::Relaxed) / ended,
        ))
    }
}
