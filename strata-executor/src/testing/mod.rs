//! Test helpers for graphs and executors.
//!
//! [`RecordingListener`] captures lifecycle events; the unit constructors
//! build small [`FnUnit`](strata_core::traits::FnUnit)s with one `Any`-typed
//! input and output that record their executions in an [`ExecutionLog`].
//!
//! # Example
//!
//! ```ignore
//! use strata_executor::testing::{ExecutionLog, RecordingListener, recording_unit};
//!
//! let log = ExecutionLog::new();
//! let a = graph.add_unit(recording_unit("a", &log));
//! let b = graph.add_unit(recording_unit("b", &log));
//! graph.connect(OutputRef::new(a, 0), InputRef::new(b, 0))?;
//!
//! let recorder = RecordingListener::new();
//! executor.add_listener(recorder.clone());
//! executor.execute(&graph).await?;
//!
//! assert_eq!(log.names(), vec!["a", "b"]);
//! assert_eq!(recorder.after_count(), 1);
//! ```

mod recording;
mod units;

pub use recording::{RecordedEvent, RecordingListener};
pub use units::{
    ExecutionLog, blocking_unit, configurable_unit, failing_unit, recording_unit, sleeping_unit,
};
