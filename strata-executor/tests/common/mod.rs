//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use strata_core::prelude::*;
use strata_executor::ExecutorConfig;
use tokio::sync::Barrier;

/// A unit that tracks how many of its kind execute at once.
pub struct ConcurrencyTrackingUnit {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    hold: Duration,
}

impl ConcurrencyTrackingUnit {
    pub fn new(current: Arc<AtomicUsize>, peak: Arc<AtomicUsize>, hold: Duration) -> Self {
        Self {
            current,
            peak,
            hold,
        }
    }
}

impl Unit for ConcurrencyTrackingUnit {
    fn info(&self) -> UnitInfo {
        UnitInfo::new("concurrency_tracker")
            .with_inputs(vec![PortSpec::any("in")])
            .with_outputs(vec![PortSpec::any("out")])
    }

    fn execute<'a>(&'a self, _ctx: UnitContext) -> UnitFuture<'a> {
        Box::pin(async move {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.hold).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        })
    }
}

/// A unit that waits at a shared barrier, failing if the other parties
/// never arrive.
pub struct BarrierUnit {
    barrier: Arc<Barrier>,
    configuration: Option<Arc<Configuration>>,
}

impl BarrierUnit {
    pub fn new(barrier: Arc<Barrier>) -> Self {
        Self {
            barrier,
            configuration: None,
        }
    }

    pub fn with_configuration(mut self, configuration: Arc<Configuration>) -> Self {
        self.configuration = Some(configuration);
        self
    }
}

impl Unit for BarrierUnit {
    fn info(&self) -> UnitInfo {
        UnitInfo::new("barrier")
    }

    fn execute<'a>(&'a self, _ctx: UnitContext) -> UnitFuture<'a> {
        Box::pin(async move {
            tokio::time::timeout(Duration::from_secs(5), self.barrier.wait())
                .await
                .map_err(|_| "barrier parties never arrived")?;
            Ok::<(), BoxError>(())
        })
    }

    fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_deref()
    }
}

/// Connect output 0 of each unit to input 0 of the next.
pub fn chain(graph: &UnitGraph, units: &[UnitId]) {
    for pair in units.windows(2) {
        graph
            .connect(OutputRef::new(pair[0], 0), InputRef::new(pair[1], 0))
            .unwrap();
    }
}

/// Connect output 0 of `from` to input 0 of `to`.
pub fn link(graph: &UnitGraph, from: UnitId, to: UnitId) -> LinkId {
    graph
        .connect(OutputRef::new(from, 0), InputRef::new(to, 0))
        .unwrap()
}

/// Create a default executor config for testing.
pub fn test_config() -> ExecutorConfig {
    ExecutorConfig::default().with_shutdown_timeout(Duration::from_secs(5))
}
