//! Execution lifecycle listener trait.

use super::outcome::{ExecutionOutcome, RunScope};
use std::sync::Arc;
use strata_core::graph::GraphSnapshot;

/// Observer of run lifecycle events.
///
/// `before_execution` fires once a run has been admitted and before any
/// unit executes; `after_execution` fires once the run's wavefronts have
/// ended, with the outcome. Both are called on the executor's task, so
/// implementations must not block.
pub trait ExecutionListener: Send + Sync {
    /// A run is about to start.
    fn before_execution(&self, graph: &GraphSnapshot, scope: &RunScope) {
        let _ = (graph, scope);
    }

    /// A run ended.
    fn after_execution(&self, graph: &GraphSnapshot, outcome: &ExecutionOutcome);
}

/// Listener backed by a closure over the outcome.
pub struct FnListener {
    callback: Arc<dyn Fn(&ExecutionOutcome) + Send + Sync>,
}

impl FnListener {
    /// Create a listener invoking `callback` after every run.
    pub fn new(callback: impl Fn(&ExecutionOutcome) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl ExecutionListener for FnListener {
    fn after_execution(&self, _graph: &GraphSnapshot, outcome: &ExecutionOutcome) {
        (self.callback)(outcome);
    }
}

impl std::fmt::Debug for FnListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}
