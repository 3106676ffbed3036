//! Strata Executor - Wavefront execution of unit graphs.
//!
//! This crate runs the graphs built with `strata-core`:
//! - Dependency stratification into wavefronts
//! - Concurrent wavefront execution with first-failure cancellation
//! - Batch executor with two-phase shutdown (`finish_execution`)
//! - Reactive executor re-running the downstream closure of a changed unit
//! - Lifecycle listeners, execution metrics and tracing setup
//!
//! # Example
//!
//! ```ignore
//! use strata_executor::prelude::*;
//!
//! let executor = BatchExecutor::new(ExecutorConfig::from_env());
//! let outcome = executor.execute(&graph).await?;
//! if let Some(error) = outcome.first_error() {
//!     tracing::error!(code = error.code(), %error, "Run failed");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod config;
pub mod listener;
pub mod metrics;
pub mod observability;
pub mod reactive;
pub mod scheduler;
pub mod session;
pub mod testing;

pub use batch::{BatchExecutor, ExecutionState};
pub use config::ExecutorConfig;
pub use reactive::ReactiveExecutor;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::batch::{BatchExecutor, ExecutionState};
    pub use crate::config::ExecutorConfig;
    pub use crate::listener::{
        ExecutionListener, ExecutionOutcome, FnListener, ListenerId, RunScope,
    };
    pub use crate::metrics::ExecutionMetrics;
    pub use crate::reactive::ReactiveExecutor;
    pub use crate::scheduler::{ExecutionSet, WavefrontRunner, WorkerPool, compute_execution_sets};
    pub use strata_core::prelude::*;
}
