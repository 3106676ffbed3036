//! Stratified scheduling and wavefront execution.
//!
//! This module provides the scheduling infrastructure shared by both
//! executors:
//! - [`compute_execution_sets`] - Splits units into dependency wavefronts
//! - [`WorkerPool`] - Session-scoped task pool with two-phase shutdown
//! - [`WavefrontRunner`] - Runs one wavefront with first-failure cancellation

mod pool;
mod stratify;
mod wavefront;

pub use pool::WorkerPool;
pub use stratify::{DependencySource, ExecutionSet, compute_execution_sets};
pub use wavefront::{WavefrontResult, WavefrontRunner};
