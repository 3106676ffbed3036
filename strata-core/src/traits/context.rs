//! Execution context handed to units.

use crate::error::{Result, StrataError};
use crate::link::Link;
use crate::types::UnitId;
use crate::value::Value;
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Port access and cancellation for a single unit execution.
///
/// Built from a graph snapshot, so the link wiring a unit sees is fixed for
/// the duration of the run even if the graph is edited concurrently.
#[derive(Debug, Clone)]
pub struct UnitContext {
    unit_id: UnitId,
    /// One entry per declared input; `None` when the input is unconnected.
    inputs: Vec<Option<Arc<Link>>>,
    /// One entry per declared output; an output may fan out to many links.
    outputs: Vec<Vec<Arc<Link>>>,
    cancellation: CancellationToken,
}

impl UnitContext {
    /// Create a context from resolved link tables.
    pub fn new(
        unit_id: UnitId,
        inputs: Vec<Option<Arc<Link>>>,
        outputs: Vec<Vec<Arc<Link>>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            unit_id,
            inputs,
            outputs,
            cancellation,
        }
    }

    /// Create a context with no ports and a fresh cancellation token.
    pub fn detached(unit_id: UnitId) -> Self {
        Self::new(unit_id, Vec::new(), Vec::new(), CancellationToken::new())
    }

    /// The executing unit.
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// Number of declared inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of declared outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Whether input `index` has an incoming link.
    pub fn is_input_connected(&self, index: usize) -> bool {
        matches!(self.inputs.get(index), Some(Some(_)))
    }

    /// Read the latest value on input `index`.
    ///
    /// Returns `None` for an unconnected input or a link that has not yet
    /// received a value.
    pub fn input(&self, index: usize) -> Option<Value> {
        self.inputs.get(index)?.as_ref()?.provide()
    }

    /// Read input `index` and clone it out as `T`.
    pub fn input_as<T: Any + Clone>(&self, index: usize) -> Option<T> {
        self.input(index)?.get::<T>()
    }

    /// Write a value to every link leaving output `index`.
    ///
    /// Returns the number of links written. An unconnected output is not an
    /// error; the value is simply dropped.
    pub fn emit(&self, index: usize, value: Value) -> Result<usize> {
        let links = self.outputs.get(index).ok_or(StrataError::InvalidPort {
            unit_id: self.unit_id,
            direction: "output",
            index,
            available: self.outputs.len(),
        })?;

        for link in links {
            link.accept(value.clone());
        }
        Ok(links.len())
    }

    /// Wrap `value` and write it to output `index`.
    pub fn emit_value<T: Any + Send + Sync>(&self, index: usize, value: T) -> Result<usize> {
        self.emit(index, Value::new(value))
    }

    /// Whether the run this unit belongs to has been cancelled.
    ///
    /// Long-running units should poll this (or await [`Self::cancelled`])
    /// and return early.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Future that resolves once the run is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// The underlying cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
