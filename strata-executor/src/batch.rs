//! One-shot execution of a whole graph.

use crate::config::ExecutorConfig;
use crate::listener::{
    ExecutionListener, ExecutionOutcome, ListenerId, ListenerRegistry, RunScope,
};
use crate::metrics::ExecutionMetrics;
use crate::session::Session;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::error::{Result, StrataError};
use strata_core::graph::UnitGraph;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// State of a [`BatchExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// No run has started yet.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run completed every unit.
    Completed,
    /// The last run ended with a fault.
    Failed,
    /// The last run was cancelled by `finish_execution`, or its `execute`
    /// future was dropped.
    Cancelled,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

struct BatchState {
    state: ExecutionState,
    session: Option<Arc<Session>>,
    last_outcome: Option<Arc<ExecutionOutcome>>,
}

/// Executes every unit of a graph once, wavefront by wavefront.
///
/// Each call to [`BatchExecutor::execute`] opens a fresh session with its
/// own worker pool and closes it before returning. While a run is in
/// progress, [`BatchExecutor::finish_execution`] may be called from another
/// task to stop it.
pub struct BatchExecutor {
    config: ExecutorConfig,
    inner: Mutex<BatchState>,
    listeners: ListenerRegistry,
    metrics: Arc<ExecutionMetrics>,
    interrupt: CancellationToken,
}

impl BatchExecutor {
    /// Create an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BatchState {
                state: ExecutionState::Idle,
                session: None,
                last_outcome: None,
            }),
            listeners: ListenerRegistry::new(),
            metrics: Arc::new(ExecutionMetrics::new()),
            interrupt: CancellationToken::new(),
        }
    }

    /// Use `token` as the host interrupt.
    ///
    /// Cancelling it aborts a run in progress and any wait for the pool to
    /// drain, which then fail with [`StrataError::Interrupted`]. The token
    /// cannot be reset: once it fires, every later run reports
    /// `Interrupted` without starting a unit, so hosts that want to run
    /// again build a new executor with a fresh token.
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    /// Current state.
    pub fn state(&self) -> ExecutionState {
        self.inner.lock().state
    }

    /// Outcome of the most recent run.
    pub fn last_outcome(&self) -> Option<Arc<ExecutionOutcome>> {
        self.inner.lock().last_outcome.clone()
    }

    /// Get metrics.
    pub fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.metrics
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&self, listener: Arc<dyn ExecutionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Remove a lifecycle listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// The host interrupt token.
    pub fn interrupt_token(&self) -> &CancellationToken {
        &self.interrupt
    }

    /// Interrupt the host side: abort the current run and any waits.
    ///
    /// This is permanent for the executor. Later calls to
    /// [`BatchExecutor::execute`] report [`StrataError::Interrupted`]
    /// without running any unit; build a new executor to run again.
    pub fn interrupt(&self) {
        self.interrupt.cancel();
    }

    /// Execute every unit of `graph`.
    ///
    /// Unit faults, cancellation and interruption are reported through the
    /// returned outcome. An `Err` means the run was never admitted: the
    /// configuration is invalid or another run is in progress.
    #[instrument(skip_all, fields(units = graph.len()))]
    pub async fn execute(&self, graph: &UnitGraph) -> Result<Arc<ExecutionOutcome>> {
        self.config.validate()?;

        let session = {
            let mut inner = self.inner.lock();
            if let Some(active) = &inner.session {
                return Err(StrataError::ExecutionInProgress {
                    session_id: active.id(),
                });
            }
            let session = Arc::new(Session::open(&self.config, Arc::clone(&self.metrics)));
            inner.state = ExecutionState::Running;
            inner.session = Some(Arc::clone(&session));
            session
        };
        self.metrics.record_run_start(false);
        let started = Instant::now();
        let run = ActiveRun {
            executor: self,
            session: Arc::clone(&session),
            started,
            settled: false,
        };

        let snapshot = graph.snapshot();
        let scope = RunScope::Full;
        tracing::info!(session_id = %session.id(), units = snapshot.len(), "Execution started");

        self.listeners.before_execution(&snapshot, &scope);

        let mut report = session.run_scope(&snapshot, &scope, &self.interrupt).await;

        if let Err(e) = session.drain(&self.interrupt).await {
            session.pool().shutdown_now();
            report.error.get_or_insert(e);
        }
        report.cancelled = session.is_cancelled();

        let outcome = Arc::new(report.into_outcome(session.id(), scope, started.elapsed()));
        let state = if outcome.is_failure() {
            ExecutionState::Failed
        } else if outcome.cancelled {
            ExecutionState::Cancelled
        } else {
            ExecutionState::Completed
        };

        self.metrics
            .record_run_end(outcome.is_failure(), outcome.cancelled, outcome.elapsed);

        match outcome.first_error() {
            Some(error) => tracing::error!(
                session_id = %outcome.session_id,
                error = %error,
                code = error.code(),
                units_completed = outcome.units_completed,
                "Execution failed"
            ),
            None => tracing::info!(
                session_id = %outcome.session_id,
                units_completed = outcome.units_completed,
                cancelled = outcome.cancelled,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Execution finished"
            ),
        }

        run.settle(state, &outcome);

        self.listeners.after_execution(&snapshot, &outcome);
        Ok(outcome)
    }

    /// Stop the run in progress.
    ///
    /// No further wavefront starts. Running units get up to `timeout` to
    /// finish; after that they are aborted and cancelled, and get `timeout`
    /// once more. Returns `Ok(())` immediately when nothing is running.
    ///
    /// # Errors
    ///
    /// - [`StrataError::ShutdownTimeout`] if the pool did not drain.
    /// - [`StrataError::Interrupted`] if the host interrupt fired while waiting.
    pub async fn finish_execution(&self, timeout: Duration) -> Result<()> {
        let session = self.inner.lock().session.clone();
        let Some(session) = session else {
            tracing::debug!("No active execution to finish");
            return Ok(());
        };

        tracing::info!(
            session_id = %session.id(),
            timeout_ms = timeout.as_millis() as u64,
            "Finishing execution"
        );
        session.finish(timeout, &self.interrupt).await
    }

    /// Stop the run in progress with the configured shutdown timeout.
    pub async fn cancel(&self) -> Result<()> {
        self.finish_execution(self.config.shutdown_timeout).await
    }
}

/// The admitted run of a [`BatchExecutor`].
///
/// Releases the executor when the run settles. If the `execute` future is
/// dropped first, the pool is shut down and the run is recorded as
/// cancelled.
struct ActiveRun<'a> {
    executor: &'a BatchExecutor,
    session: Arc<Session>,
    started: Instant,
    settled: bool,
}

impl ActiveRun<'_> {
    fn settle(mut self, state: ExecutionState, outcome: &Arc<ExecutionOutcome>) {
        self.settled = true;
        let mut inner = self.executor.inner.lock();
        inner.state = state;
        inner.session = None;
        inner.last_outcome = Some(Arc::clone(outcome));
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let aborted = self.session.pool().shutdown_now();
        self.executor
            .metrics
            .record_run_end(false, true, self.started.elapsed());
        tracing::warn!(
            session_id = %self.session.id(),
            aborted,
            "Execution dropped before completion"
        );

        let mut inner = self.executor.inner.lock();
        inner.state = ExecutionState::Cancelled;
        inner.session = None;
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
