//! Wavefront execution.
//!
//! Runs every unit of one [`ExecutionSet`] concurrently on the session's
//! [`WorkerPool`] and waits for them in completion order. The first fault
//! aborts the rest of the wavefront and is returned immediately, without
//! waiting for the aborted tasks to wind down.

use super::pool::WorkerPool;
use super::stratify::ExecutionSet;
use crate::metrics::ExecutionMetrics;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strata_core::error::{Result, StrataError};
use strata_core::graph::GraphSnapshot;
use strata_core::traits::{Unit, UnitContext};
use strata_core::types::UnitId;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

/// Result of running one wavefront.
#[derive(Debug, Default)]
pub struct WavefrontResult {
    /// Units that completed without fault.
    pub completed: usize,
    /// The first fault observed, if any.
    pub error: Option<StrataError>,
}

impl WavefrontResult {
    /// Whether every unit completed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs wavefronts on a worker pool.
#[derive(Debug, Clone)]
pub struct WavefrontRunner {
    pool: Arc<WorkerPool>,
    unit_timeout: Option<Duration>,
    metrics: Arc<ExecutionMetrics>,
}

impl WavefrontRunner {
    /// Create a runner submitting to `pool`.
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            unit_timeout: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Bound each unit execution by `timeout`.
    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Record unit outcomes into shared counters.
    pub fn with_metrics(mut self, metrics: Arc<ExecutionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run every unit of `set` and return the first fault, if any.
    ///
    /// Returns `None` only when every unit completed without fault.
    pub async fn execute_all(
        &self,
        graph: &GraphSnapshot,
        set: &ExecutionSet,
        interrupt: &CancellationToken,
    ) -> Option<StrataError> {
        self.run(graph, set, interrupt).await.error
    }

    /// Run every unit of `set`, reporting completions and the first fault.
    #[instrument(skip_all, fields(units = set.len()))]
    pub async fn run(
        &self,
        graph: &GraphSnapshot,
        set: &ExecutionSet,
        interrupt: &CancellationToken,
    ) -> WavefrontResult {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        let mut task_units: HashMap<tokio::task::Id, UnitId> = HashMap::with_capacity(set.len());
        let mut result = WavefrontResult::default();

        for unit_id in set {
            match self.submit(&mut tasks, graph, unit_id) {
                Ok(task_id) => {
                    task_units.insert(task_id, unit_id);
                }
                Err(e) => {
                    tasks.abort_all();
                    result.error = Some(e);
                    return result;
                }
            }
        }

        loop {
            let joined = tokio::select! {
                biased;
                _ = interrupt.cancelled() => {
                    tasks.abort_all();
                    tracing::warn!(pending = tasks.len(), "Interrupted while awaiting wavefront");
                    result.error = Some(StrataError::interrupted(
                        "host interrupted while awaiting wavefront",
                    ));
                    return result;
                }
                joined = tasks.join_next_with_id() => joined,
            };

            let Some(joined) = joined else {
                break;
            };

            let error = match joined {
                Ok((_, Ok(()))) => {
                    result.completed += 1;
                    self.metrics.record_unit_executed();
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(join_error) => match task_units.get(&join_error.id()).copied() {
                    Some(unit_id) if join_error.is_panic() => StrataError::UnitPanic {
                        unit_id,
                        message: panic_message(join_error.into_panic()),
                    },
                    Some(unit_id) => StrataError::interrupted(format!("{} was aborted", unit_id)),
                    None => StrataError::interrupted("untracked task was aborted"),
                },
            };

            self.metrics.record_unit_failed();
            tasks.abort_all();
            tracing::error!(
                error = %error,
                code = error.code(),
                aborted = tasks.len(),
                "Wavefront failed"
            );
            result.error = Some(error);
            return result;
        }

        result
    }

    fn submit(
        &self,
        tasks: &mut JoinSet<Result<()>>,
        graph: &GraphSnapshot,
        unit_id: UnitId,
    ) -> Result<tokio::task::Id> {
        let unit = graph
            .unit(unit_id)
            .cloned()
            .ok_or(StrataError::UnitNotFound { unit_id })?;
        let ctx = graph.context_for(unit_id, self.pool.cancellation_token().child_token())?;
        let unit_name = graph.unit_name(unit_id).to_string();

        let span = tracing::info_span!(
            "unit_execution",
            unit_id = %unit_id,
            unit_name = %unit_name,
        );
        let timeout = self.unit_timeout;
        self.pool.submit(
            tasks,
            run_unit(unit, ctx, unit_name, timeout).instrument(span),
        )
    }
}

async fn run_unit(
    unit: Arc<dyn Unit>,
    ctx: UnitContext,
    unit_name: String,
    timeout: Option<Duration>,
) -> Result<()> {
    let unit_id = ctx.unit_id();
    let started = Instant::now();
    tracing::debug!("Executing unit");

    let execution = unit.execute(ctx);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, execution).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(timeout_ms = limit.as_millis() as u64, "Unit timed out");
                return Err(StrataError::UnitTimeout {
                    unit_id,
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        },
        None => execution.await,
    };

    match outcome {
        Ok(()) => {
            tracing::debug!(elapsed_us = started.elapsed().as_micros() as u64, "Unit completed");
            Ok(())
        }
        Err(cause) => {
            tracing::error!(error = %cause, "Unit failed");
            Err(StrataError::UnitExecution {
                unit_id,
                unit_name,
                cause,
            })
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use strata_core::error::BoxError;
    use strata_core::graph::UnitGraph;
    use strata_core::traits::{FnUnit, UnitInfo};

    fn graph_of(units: Vec<Arc<dyn Unit>>) -> (GraphSnapshot, ExecutionSet) {
        let graph = UnitGraph::new();
        let ids: Vec<UnitId> = units.into_iter().map(|u| graph.add_unit(u)).collect();
        (graph.snapshot(), ExecutionSet::new(ids))
    }

    fn runner() -> WavefrontRunner {
        WavefrontRunner::new(Arc::new(WorkerPool::current(None)))
    }

    #[tokio::test]
    async fn all_units_complete() {
        let count = Arc::new(AtomicUsize::new(0));
        let units: Vec<Arc<dyn Unit>> = (0..5)
            .map(|i| {
                let count = Arc::clone(&count);
                Arc::new(FnUnit::new(UnitInfo::new(format!("u{i}")), move |_ctx| {
                    let count = Arc::clone(&count);
                    async move {
                        count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })) as Arc<dyn Unit>
            })
            .collect();
        let (graph, set) = graph_of(units);

        let result = runner().run(&graph, &set, &CancellationToken::new()).await;
        assert!(result.is_success());
        assert_eq!(result.completed, 5);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn first_fault_cancels_siblings() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_clone = Arc::clone(&finished);
        let slow: Arc<dyn Unit> = Arc::new(FnUnit::new(UnitInfo::new("slow"), move |_ctx| {
            let finished = Arc::clone(&finished_clone);
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                finished.store(true, Ordering::SeqCst);
                Ok(())
            }
        }));
        let failing: Arc<dyn Unit> = Arc::new(FnUnit::new(UnitInfo::new("failing"), |_ctx| async {
            Err::<(), BoxError>("bad input".into())
        }));
        let (graph, set) = graph_of(vec![slow, failing]);

        let started = Instant::now();
        let error = runner()
            .execute_all(&graph, &set, &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(error.unit_id(), Some(UnitId::new(1)));
        assert!(matches!(error, StrataError::UnitExecution { ref unit_name, .. } if unit_name == "failing"));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panic_is_reported() {
        let panicking: Arc<dyn Unit> = Arc::new(FnUnit::new(UnitInfo::new("panicking"), |_ctx| async {
            if true {
                panic!("exploded");
            }
            Ok(())
        }));
        let (graph, set) = graph_of(vec![panicking]);

        let error = runner()
            .execute_all(&graph, &set, &CancellationToken::new())
            .await
            .unwrap();
        match error {
            StrataError::UnitPanic { unit_id, message } => {
                assert_eq!(unit_id, UnitId::new(0));
                assert_eq!(message, "exploded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unit_timeout_is_enforced() {
        let sleepy: Arc<dyn Unit> = Arc::new(FnUnit::new(UnitInfo::new("sleepy"), |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }));
        let (graph, set) = graph_of(vec![sleepy]);

        let error = runner()
            .with_unit_timeout(Some(Duration::from_millis(20)))
            .execute_all(&graph, &set, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(error.code(), "E302");
    }

    #[tokio::test]
    async fn host_interrupt_stops_waiting() {
        let sleepy: Arc<dyn Unit> = Arc::new(FnUnit::new(UnitInfo::new("sleepy"), |_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }));
        let (graph, set) = graph_of(vec![sleepy]);
        let interrupt = CancellationToken::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let error = runner().execute_all(&graph, &set, &interrupt).await.unwrap();
        assert!(error.is_cancellation());
    }

    #[tokio::test]
    async fn closed_pool_is_reported() {
        let pool = Arc::new(WorkerPool::current(None));
        pool.shutdown();
        let noop: Arc<dyn Unit> = Arc::new(FnUnit::new(UnitInfo::new("noop"), |_ctx| async { Ok(()) }));
        let (graph, set) = graph_of(vec![noop]);

        let error = WavefrontRunner::new(pool)
            .execute_all(&graph, &set, &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(error, StrataError::PoolShutdown));
    }

    #[tokio::test]
    async fn empty_wavefront_succeeds() {
        let (graph, _) = graph_of(Vec::new());
        let result = runner()
            .run(&graph, &ExecutionSet::default(), &CancellationToken::new())
            .await;
        assert!(result.is_success());
        assert_eq!(result.completed, 0);
    }
}
