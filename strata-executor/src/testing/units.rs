//! Unit constructors for tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use strata_core::configuration::Configuration;
use strata_core::error::BoxError;
use strata_core::traits::{FnUnit, PortSpec, Unit, UnitContext, UnitInfo};
use strata_core::types::UnitId;

/// Shared record of unit executions, in completion order.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    entries: Arc<Mutex<Vec<(UnitId, String)>>>,
}

impl ExecutionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an execution.
    pub fn record(&self, unit_id: UnitId, name: &str) {
        self.entries.lock().push((unit_id, name.to_string()));
    }

    /// Names of executed units, in completion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    /// IDs of executed units, in completion order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.entries.lock().iter().map(|(id, _)| *id).collect()
    }

    /// How many times `name` executed.
    pub fn count(&self, name: &str) -> usize {
        self.entries.lock().iter().filter(|(_, n)| n == name).count()
    }

    /// Position of the first execution of `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.lock().iter().position(|(_, n)| n == name)
    }

    /// Total executions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing executed.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forget recorded executions.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn relay_info(name: &str) -> UnitInfo {
    UnitInfo::new(name)
        .with_inputs(vec![PortSpec::any("in")])
        .with_outputs(vec![PortSpec::any("out")])
}

/// Emit the number of upstream hops seen so far.
fn forward(ctx: &UnitContext) -> Result<(), BoxError> {
    if ctx.output_count() > 0 {
        let hops = ctx.input_as::<u64>(0).unwrap_or(0);
        ctx.emit_value(0, hops + 1)?;
    }
    Ok(())
}

/// A unit that records its execution and forwards a hop count.
pub fn recording_unit(name: &str, log: &ExecutionLog) -> Arc<dyn Unit> {
    let log = log.clone();
    let owned = name.to_string();
    Arc::new(FnUnit::new(relay_info(name), move |ctx| {
        let log = log.clone();
        let name = owned.clone();
        async move {
            forward(&ctx)?;
            log.record(ctx.unit_id(), &name);
            Ok::<(), BoxError>(())
        }
    }))
}

/// Like [`recording_unit`], but sleeps for `delay` first.
///
/// The sleep ends early when the unit is cancelled; the unit then returns
/// without recording.
pub fn sleeping_unit(name: &str, delay: Duration, log: &ExecutionLog) -> Arc<dyn Unit> {
    let log = log.clone();
    let owned = name.to_string();
    Arc::new(FnUnit::new(relay_info(name), move |ctx| {
        let log = log.clone();
        let name = owned.clone();
        async move {
            tokio::select! {
                _ = ctx.cancelled() => return Ok::<(), BoxError>(()),
                _ = tokio::time::sleep(delay) => {}
            }
            forward(&ctx)?;
            log.record(ctx.unit_id(), &name);
            Ok(())
        }
    }))
}

/// A unit that blocks its worker thread for `duration`.
///
/// Neither aborting its task nor cancelling it has any effect until the
/// thread is released. Use with a multi-threaded runtime.
pub fn blocking_unit(name: &str, duration: Duration) -> Arc<dyn Unit> {
    Arc::new(FnUnit::new(relay_info(name), move |ctx| async move {
        std::thread::sleep(duration);
        forward(&ctx)?;
        Ok::<(), BoxError>(())
    }))
}

/// A unit that always fails with `message`.
pub fn failing_unit(name: &str, message: &str) -> Arc<dyn Unit> {
    let message = message.to_string();
    Arc::new(FnUnit::new(relay_info(name), move |_ctx| {
        let message = message.clone();
        async move { Err::<(), BoxError>(message.into()) }
    }))
}

/// A recording unit exposing a configuration.
pub fn configurable_unit(name: &str, log: &ExecutionLog) -> (Arc<dyn Unit>, Arc<Configuration>) {
    let configuration = Arc::new(Configuration::new());
    let log = log.clone();
    let owned = name.to_string();
    let unit = FnUnit::new(relay_info(name), move |ctx| {
        let log = log.clone();
        let name = owned.clone();
        async move {
            forward(&ctx)?;
            log.record(ctx.unit_id(), &name);
            Ok::<(), BoxError>(())
        }
    })
    .with_configuration(Arc::clone(&configuration));
    (Arc::new(unit), configuration)
}
