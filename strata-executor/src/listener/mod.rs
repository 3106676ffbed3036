#![allow(clippy::module_inception)]

//! Execution lifecycle listeners.
//!
//! Each executor owns a [`ListenerRegistry`]. Listeners are registered and
//! removed at any time; a notification iterates over a snapshot of the
//! registry, so a listener may deregister itself from inside a callback.
//!
//! # Example
//!
//! ```ignore
//! let executor = BatchExecutor::new(ExecutorConfig::default());
//! let id = executor.add_listener(Arc::new(FnListener::new(|outcome| {
//!     tracing::info!(success = outcome.is_success(), "Run finished");
//! })));
//!
//! executor.execute(&graph).await?;
//! executor.remove_listener(id);
//! ```

mod listener;
mod outcome;

pub use listener::{ExecutionListener, FnListener};
pub use outcome::{ExecutionOutcome, RunScope};
pub use strata_core::observer::ObserverId as ListenerId;

use std::sync::Arc;
use strata_core::graph::GraphSnapshot;
use strata_core::observer::ObserverList;

/// Registry of execution listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: ObserverList<dyn ExecutionListener>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    ///
    /// Returns the listener ID for later removal.
    pub fn add(&self, listener: Arc<dyn ExecutionListener>) -> ListenerId {
        let id = self.listeners.add(listener);
        tracing::debug!(listener_id = %id, "Listener added");
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        if removed {
            tracing::debug!(listener_id = %id, "Listener removed");
        }
        removed
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notify every listener that a run is starting.
    pub fn before_execution(&self, graph: &GraphSnapshot, scope: &RunScope) {
        for (_, listener) in self.listeners.snapshot().iter() {
            listener.before_execution(graph, scope);
        }
    }

    /// Notify every listener that a run ended.
    pub fn after_execution(&self, graph: &GraphSnapshot, outcome: &ExecutionOutcome) {
        for (_, listener) in self.listeners.snapshot().iter() {
            listener.after_execution(graph, outcome);
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
