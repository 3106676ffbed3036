//! Execution sessions.
//!
//! A session owns the worker pool of one batch run, or of one reactive
//! executor's lifetime, together with the cancellation flag that stops new
//! wavefronts from starting.

use crate::config::ExecutorConfig;
use crate::listener::{ExecutionOutcome, RunScope};
use crate::metrics::ExecutionMetrics;
use crate::scheduler::{WavefrontRunner, WorkerPool, compute_execution_sets};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use strata_core::error::{Result, StrataError};
use strata_core::graph::GraphSnapshot;
use strata_core::types::{SessionId, UnitId};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// What a run over a set of units produced.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Units that completed without fault.
    pub completed: usize,
    /// The first fault, if any.
    pub error: Option<StrataError>,
    /// Whether termination was requested while the run was in progress.
    pub cancelled: bool,
}

impl RunReport {
    /// Turn the report into the outcome handed to listeners.
    pub fn into_outcome(
        self,
        session_id: SessionId,
        scope: RunScope,
        elapsed: Duration,
    ) -> ExecutionOutcome {
        ExecutionOutcome {
            session_id,
            scope,
            cancelled: self.cancelled,
            errors: self.error.into_iter().collect(),
            units_completed: self.completed,
            elapsed,
        }
    }
}

/// A worker pool plus the cancellation flag of the runs using it.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    pool: Arc<WorkerPool>,
    runner: WavefrontRunner,
    cancelled: AtomicBool,
}

impl Session {
    /// Open a session with a fresh pool on the current runtime.
    pub fn open(config: &ExecutorConfig, metrics: Arc<ExecutionMetrics>) -> Self {
        let pool = Arc::new(WorkerPool::current(config.max_concurrent_units));
        let runner = WavefrontRunner::new(Arc::clone(&pool))
            .with_unit_timeout(config.unit_timeout)
            .with_metrics(metrics);
        let id = SessionId::new();
        tracing::debug!(session_id = %id, "Session opened");

        Self {
            id,
            pool,
            runner,
            cancelled: AtomicBool::new(false),
        }
    }

    /// The session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The session's worker pool.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Whether termination was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Stratify `units` and run the wavefronts one after another.
    ///
    /// Stops at the first fault, and before starting a wavefront once
    /// termination was requested or the host interrupt has fired.
    #[instrument(skip_all, fields(session_id = %self.id))]
    pub async fn run(
        &self,
        graph: &GraphSnapshot,
        units: impl IntoIterator<Item = UnitId>,
        interrupt: &CancellationToken,
    ) -> RunReport {
        let mut report = RunReport::default();

        let sets = match compute_execution_sets(units, graph) {
            Ok(sets) => sets,
            Err(e) => {
                report.error = Some(e);
                report.cancelled = self.is_cancelled();
                return report;
            }
        };

        for (index, set) in sets.iter().enumerate() {
            if self.is_cancelled() {
                tracing::info!(
                    skipped_wavefronts = sets.len() - index,
                    "Cancellation requested, not starting further wavefronts"
                );
                break;
            }
            if interrupt.is_cancelled() {
                report.error = Some(StrataError::interrupted(
                    "host interrupt is set, not starting wavefront",
                ));
                break;
            }

            tracing::debug!(wavefront = index, units = set.len(), "Starting wavefront");
            let result = self.runner.run(graph, set, interrupt).await;
            report.completed += result.completed;

            match result.error {
                None => {}
                // The flag is raised before the pool closes, so a rejected
                // submission after cancellation is not a fault.
                Some(StrataError::PoolShutdown) if self.is_cancelled() => break,
                Some(error) => {
                    report.error = Some(error);
                    break;
                }
            }
        }

        report.cancelled = self.is_cancelled();
        report
    }

    /// Run the units covered by `scope`.
    pub async fn run_scope(
        &self,
        graph: &GraphSnapshot,
        scope: &RunScope,
        interrupt: &CancellationToken,
    ) -> RunReport {
        match scope {
            RunScope::Full => self.run(graph, graph.unit_ids(), interrupt).await,
            RunScope::Triggered { units, .. } => {
                self.run(graph, units.iter().copied(), interrupt).await
            }
        }
    }

    /// Request termination and wait for the pool to drain.
    ///
    /// First an orderly shutdown waits up to `timeout`; if the pool is still
    /// busy, running tasks are aborted and units cancelled, and the wait is
    /// repeated once. Returns [`StrataError::ShutdownTimeout`] if the pool
    /// still has not drained, or [`StrataError::Interrupted`] if `interrupt`
    /// fires while waiting.
    #[instrument(skip_all, fields(session_id = %self.id, timeout_ms = timeout.as_millis() as u64))]
    pub async fn finish(&self, timeout: Duration, interrupt: &CancellationToken) -> Result<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        self.pool.shutdown();

        if self.wait(timeout, interrupt).await? {
            tracing::info!("Session finished");
            return Ok(());
        }

        let aborted = self.pool.shutdown_now();
        tracing::warn!(aborted, "Orderly shutdown timed out, forcing");

        if self.wait(timeout, interrupt).await? {
            tracing::info!("Session finished after forced shutdown");
            return Ok(());
        }

        let pending = self.pool.pending();
        tracing::error!(pending, "Worker pool did not terminate");
        Err(StrataError::ShutdownTimeout {
            waited_ms: timeout.saturating_mul(2).as_millis() as u64,
            pending,
        })
    }

    /// Close the pool and wait for it to drain, without a time limit.
    pub async fn drain(&self, interrupt: &CancellationToken) -> Result<()> {
        self.pool.shutdown();
        tokio::select! {
            biased;
            _ = interrupt.cancelled() => Err(StrataError::interrupted(
                "host interrupted while awaiting pool termination",
            )),
            _ = self.pool.wait() => Ok(()),
        }
    }

    async fn wait(&self, timeout: Duration, interrupt: &CancellationToken) -> Result<bool> {
        tokio::select! {
            biased;
            _ = interrupt.cancelled() => Err(StrataError::interrupted(
                "host interrupted while awaiting pool termination",
            )),
            drained = self.pool.await_termination(timeout) => Ok(drained),
        }
    }
}
