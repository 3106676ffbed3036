//! Reactive execution.
//!
//! After an initial full run the session stays open. Every unit exposing a
//! [`Configuration`](strata_core::configuration::Configuration) is observed;
//! when one changes, the unit and everything downstream of it run again on
//! the same worker pool.
//!
//! Triggered runs are independent of each other. Before executing, a run
//! locks a guard for every unit of its closure in ascending ID order, so
//! runs whose closures overlap execute one after another while disjoint
//! ones proceed concurrently. A fault in a triggered run is reported to
//! listeners and does not end the session.

use crate::config::ExecutorConfig;
use crate::listener::{
    ExecutionListener, ExecutionOutcome, ListenerId, ListenerRegistry, RunScope,
};
use crate::metrics::ExecutionMetrics;
use crate::session::Session;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use strata_core::configuration::ConfigurationChange;
use strata_core::error::{Result, StrataError};
use strata_core::graph::{GraphEvent, GraphSnapshot, UnitGraph};
use strata_core::observer::ObserverId;
use strata_core::traits::Unit;
use strata_core::types::{SessionId, UnitId};
use tokio::sync::{Notify, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Executes a graph once, then re-executes the parts of it whose
/// configuration changes.
pub struct ReactiveExecutor {
    inner: Arc<ReactiveInner>,
}

struct ReactiveInner {
    config: ExecutorConfig,
    listeners: ListenerRegistry,
    metrics: Arc<ExecutionMetrics>,
    interrupt: CancellationToken,
    active: Mutex<Option<ActiveSession>>,
    last_outcome: Mutex<Option<Arc<ExecutionOutcome>>>,
    guards: DashMap<UnitId, Arc<tokio::sync::Mutex<()>>>,
    in_flight: AtomicUsize,
    idle: Notify,
}

struct ActiveSession {
    session: Arc<Session>,
    graph: Arc<UnitGraph>,
    graph_observer: Option<ObserverId>,
    config_observers: HashMap<UnitId, (Arc<dyn Unit>, ObserverId)>,
}

/// Decrements the in-flight count when a triggered run ends, however it ends.
struct InFlight(Arc<ReactiveInner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl ReactiveExecutor {
    /// Create an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_interrupt(config, CancellationToken::new())
    }

    /// Create an executor using `interrupt` as the host interrupt.
    ///
    /// Once the token fires, every later run of this executor reports
    /// [`StrataError::Interrupted`] without starting a unit.
    pub fn with_interrupt(config: ExecutorConfig, interrupt: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ReactiveInner {
                config,
                listeners: ListenerRegistry::new(),
                metrics: Arc::new(ExecutionMetrics::new()),
                interrupt,
                active: Mutex::new(None),
                last_outcome: Mutex::new(None),
                guards: DashMap::new(),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Whether a session is open.
    pub fn is_active(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// ID of the open session.
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.active.lock().as_ref().map(|a| a.session.id())
    }

    /// Outcome of the most recent run, initial or triggered.
    pub fn last_outcome(&self) -> Option<Arc<ExecutionOutcome>> {
        self.inner.last_outcome.lock().clone()
    }

    /// Get metrics.
    pub fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.inner.metrics
    }

    /// Register a lifecycle listener.
    pub fn add_listener(&self, listener: Arc<dyn ExecutionListener>) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Remove a lifecycle listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// The host interrupt token.
    pub fn interrupt_token(&self) -> &CancellationToken {
        &self.inner.interrupt
    }

    /// Number of triggered runs in progress.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Open a session, execute every unit of `graph`, and start observing
    /// configuration changes.
    ///
    /// The initial run's faults are reported through the returned outcome;
    /// the session stays open regardless.
    #[instrument(skip_all, fields(units = graph.len()))]
    pub async fn start(&self, graph: Arc<UnitGraph>) -> Result<Arc<ExecutionOutcome>> {
        self.inner.config.validate()?;

        let session = {
            let mut active = self.inner.active.lock();
            if let Some(current) = active.as_ref() {
                return Err(StrataError::ExecutionInProgress {
                    session_id: current.session.id(),
                });
            }
            let session = Arc::new(Session::open(
                &self.inner.config,
                Arc::clone(&self.inner.metrics),
            ));
            *active = Some(ActiveSession {
                session: Arc::clone(&session),
                graph: Arc::clone(&graph),
                graph_observer: None,
                config_observers: HashMap::new(),
            });
            session
        };

        tracing::info!(session_id = %session.id(), "Reactive session started");

        let snapshot = graph.snapshot();
        let outcome = self
            .inner
            .run_guarded(&session, &snapshot, RunScope::Full)
            .await;

        let mut active = self.inner.active.lock();
        match active.as_mut() {
            Some(current) if current.session.id() == session.id() => {
                let weak = Arc::downgrade(&self.inner);
                current.graph_observer = Some(graph.subscribe(move |event| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_graph_event(event);
                    }
                }));
                for unit_id in graph.unit_ids() {
                    ReactiveInner::attach(&self.inner, current, unit_id);
                }
                tracing::debug!(
                    observed_units = current.config_observers.len(),
                    "Configuration observers attached"
                );
            }
            _ => tracing::debug!("Session stopped during initial run"),
        }

        Ok(outcome)
    }

    /// Re-execute `unit` and everything downstream of it, as if its
    /// configuration had changed.
    ///
    /// The run happens in the background; see [`ReactiveExecutor::wait_idle`].
    pub fn trigger(&self, unit: UnitId) -> Result<()> {
        self.inner.on_change(unit)
    }

    /// Wait until no triggered run is in progress.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop observing and finish the session.
    ///
    /// Uses the same two-phase shutdown as
    /// [`BatchExecutor::finish_execution`](crate::BatchExecutor::finish_execution).
    /// Returns `Ok(())` when no session is open.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        let active = self.inner.active.lock().take();
        let Some(mut active) = active else {
            return Ok(());
        };

        ReactiveInner::detach_all(&mut active);
        self.inner.guards.clear();
        tracing::info!(session_id = %active.session.id(), "Stopping reactive session");

        active.session.finish(timeout, &self.inner.interrupt).await
    }
}

impl ReactiveInner {
    fn attach(this: &Arc<Self>, active: &mut ActiveSession, unit_id: UnitId) {
        if active.config_observers.contains_key(&unit_id) {
            return;
        }
        let Some(unit) = active.graph.unit(unit_id) else {
            return;
        };

        let observer = match unit.configuration() {
            Some(configuration) => {
                let weak: Weak<Self> = Arc::downgrade(this);
                configuration.subscribe(move |change: &ConfigurationChange| {
                    if let Some(inner) = weak.upgrade() {
                        tracing::debug!(unit_id = %unit_id, key = %change.key, "Configuration changed");
                        if let Err(e) = inner.on_change(unit_id) {
                            tracing::debug!(unit_id = %unit_id, error = %e, "Change ignored");
                        }
                    }
                })
            }
            None => return,
        };

        active.config_observers.insert(unit_id, (unit, observer));
    }

    fn detach(&self, active: &mut ActiveSession, unit_id: UnitId) {
        if let Some((unit, observer)) = active.config_observers.remove(&unit_id) {
            if let Some(configuration) = unit.configuration() {
                configuration.unsubscribe(observer);
            }
        }
        self.guards.remove(&unit_id);
    }

    fn detach_all(active: &mut ActiveSession) {
        for (_, (unit, observer)) in active.config_observers.drain() {
            if let Some(configuration) = unit.configuration() {
                configuration.unsubscribe(observer);
            }
        }
        if let Some(observer) = active.graph_observer.take() {
            active.graph.unsubscribe(observer);
        }
    }

    fn on_graph_event(self: &Arc<Self>, event: &GraphEvent) {
        let mut active = self.active.lock();
        let Some(current) = active.as_mut() else {
            return;
        };
        match *event {
            GraphEvent::UnitAdded(unit_id) => Self::attach(self, current, unit_id),
            GraphEvent::UnitRemoved(unit_id) => self.detach(current, unit_id),
            GraphEvent::Linked { .. } | GraphEvent::Unlinked { .. } => {}
        }
    }

    fn on_change(self: &Arc<Self>, origin: UnitId) -> Result<()> {
        let (session, graph) = {
            let active = self.active.lock();
            let Some(current) = active.as_ref() else {
                return Err(StrataError::PoolShutdown);
            };
            (Arc::clone(&current.session), Arc::clone(&current.graph))
        };
        if session.is_cancelled() {
            return Err(StrataError::PoolShutdown);
        }

        let snapshot = graph.snapshot();
        if !snapshot.contains(origin) {
            return Err(StrataError::UnitNotFound { unit_id: origin });
        }

        let mut units: Vec<UnitId> = snapshot.transitive_successors(origin).into_iter().collect();
        units.push(origin);
        units.sort_unstable();
        tracing::info!(
            unit_id = %origin,
            closure = units.len(),
            "Scheduling triggered run"
        );

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = InFlight(Arc::clone(self));
        let task_session = Arc::clone(&session);
        session
            .pool()
            .spawn(async move {
                let inner = Arc::clone(&in_flight.0);
                inner
                    .run_guarded(&task_session, &snapshot, RunScope::Triggered { origin, units })
                    .await;
                drop(in_flight);
            })
            .map(|_| ())
    }

    /// Execute `scope` while holding the guards of every unit it covers.
    async fn run_guarded(
        &self,
        session: &Session,
        graph: &GraphSnapshot,
        scope: RunScope,
    ) -> Arc<ExecutionOutcome> {
        let units = match &scope {
            RunScope::Full => graph.unit_ids(),
            RunScope::Triggered { units, .. } => units.clone(),
        };

        let guards: Vec<Arc<tokio::sync::Mutex<()>>> = units
            .iter()
            .map(|id| Arc::clone(&self.guards.entry(*id).or_default()))
            .collect();
        let mut held: Vec<OwnedMutexGuard<()>> = Vec::with_capacity(guards.len());
        for guard in guards {
            held.push(guard.lock_owned().await);
        }

        self.listeners.before_execution(graph, &scope);
        self.metrics.record_run_start(scope.is_triggered());
        let started = Instant::now();

        let report = session.run(graph, units, &self.interrupt).await;
        drop(held);

        let outcome = Arc::new(report.into_outcome(session.id(), scope, started.elapsed()));
        self.metrics
            .record_run_end(outcome.is_failure(), outcome.cancelled, outcome.elapsed);

        match outcome.first_error() {
            Some(error) => tracing::warn!(
                session_id = %outcome.session_id,
                origin = ?outcome.scope.origin(),
                error = %error,
                code = error.code(),
                "Run failed"
            ),
            None => tracing::debug!(
                session_id = %outcome.session_id,
                origin = ?outcome.scope.origin(),
                units_completed = outcome.units_completed,
                cancelled = outcome.cancelled,
                "Run finished"
            ),
        }

        *self.last_outcome.lock() = Some(Arc::clone(&outcome));
        self.listeners.after_execution(graph, &outcome);
        outcome
    }
}

impl Default for ReactiveExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl Drop for ReactiveExecutor {
    fn drop(&mut self) {
        let active = self.inner.active.lock().take();
        if let Some(mut active) = active {
            ReactiveInner::detach_all(&mut active);
            active.session.pool().shutdown_now();
        }
    }
}

impl fmt::Debug for ReactiveExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveExecutor")
            .field("config", &self.inner.config)
            .field("session_id", &self.session_id())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
