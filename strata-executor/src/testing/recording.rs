//! Lifecycle event recording.

use crate::listener::{ExecutionListener, ExecutionOutcome, RunScope};
use parking_lot::Mutex;
use std::sync::Arc;
use strata_core::graph::GraphSnapshot;
use strata_core::types::SessionId;

/// A lifecycle event captured by [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    /// `before_execution` fired.
    Before {
        /// Units the run covers.
        scope: RunScope,
        /// Units in the graph snapshot.
        graph_units: usize,
    },
    /// `after_execution` fired.
    After {
        /// Session the run belonged to.
        session_id: SessionId,
        /// Units the run covered.
        scope: RunScope,
        /// Whether termination was requested.
        cancelled: bool,
        /// Codes of the reported errors.
        error_codes: Vec<&'static str>,
        /// Units that completed.
        units_completed: usize,
    },
}

/// Listener recording every lifecycle event in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingListener {
    /// Create a listener, ready to register.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All events so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Number of `before_execution` calls.
    pub fn before_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::Before { .. }))
            .count()
    }

    /// Number of `after_execution` calls.
    pub fn after_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::After { .. }))
            .count()
    }

    /// `after_execution` events of runs started by a configuration change.
    pub fn triggered(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::After { scope, .. } if scope.is_triggered()))
            .cloned()
            .collect()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ExecutionListener for RecordingListener {
    fn before_execution(&self, graph: &GraphSnapshot, scope: &RunScope) {
        self.events.lock().push(RecordedEvent::Before {
            scope: scope.clone(),
            graph_units: graph.len(),
        });
    }

    fn after_execution(&self, _graph: &GraphSnapshot, outcome: &ExecutionOutcome) {
        self.events.lock().push(RecordedEvent::After {
            session_id: outcome.session_id,
            scope: outcome.scope.clone(),
            cancelled: outcome.cancelled,
            error_codes: outcome.errors.iter().map(|e| e.code()).collect(),
            units_completed: outcome.units_completed,
        });
    }
}
