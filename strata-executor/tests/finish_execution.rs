//! Integration tests for stopping a batch run.
//!
//! Tests verify that:
//! - An orderly finish lets running units complete and starts nothing new
//! - A unit blocking its thread makes the finish time out after escalation
//! - Forced shutdown cancels cooperative units
//! - Finishing without a run, or twice, is harmless
//! - A host interrupt cuts the wait short

mod common;

use std::time::{Duration, Instant};
use strata_core::prelude::*;
use strata_executor::testing::{
    ExecutionLog, RecordingListener, blocking_unit, recording_unit, sleeping_unit,
};
use strata_executor::{BatchExecutor, ExecutionState};
use tokio_util::sync::CancellationToken;

use common::{link, test_config};

#[tokio::test]
async fn generous_timeout_finishes_cleanly() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    let first = graph.add_unit(sleeping_unit("first", Duration::from_millis(200), &log));
    let second = graph.add_unit(recording_unit("second", &log));
    link(&graph, first, second);

    let executor = BatchExecutor::new(test_config());
    let recorder = RecordingListener::new();
    executor.add_listener(recorder.clone());

    let (outcome, finished) = tokio::join!(executor.execute(&graph), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        executor.finish_execution(Duration::from_secs(5)).await
    });

    finished.unwrap();
    let outcome = outcome.unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.errors.is_empty());
    assert_eq!(log.names(), vec!["first"]);
    assert_eq!(executor.state(), ExecutionState::Cancelled);
    assert_eq!(recorder.after_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocking_unit_exceeds_near_zero_timeout() {
    let graph = UnitGraph::new();
    graph.add_unit(blocking_unit("stuck", Duration::from_millis(400)));

    let executor = BatchExecutor::new(test_config());
    let (outcome, finished) = tokio::join!(executor.execute(&graph), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        executor.finish_execution(Duration::from_millis(10)).await
    });

    match finished {
        Err(StrataError::ShutdownTimeout { waited_ms, pending }) => {
            assert_eq!(waited_ms, 20);
            assert!(pending >= 1);
        }
        other => panic!("expected a shutdown timeout, got {other:?}"),
    }

    // The run itself still ends once the thread is released.
    let outcome = outcome.unwrap();
    assert!(outcome.cancelled);
    assert_ne!(executor.state(), ExecutionState::Running);
}

#[tokio::test]
async fn forced_shutdown_cancels_cooperative_units() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    graph.add_unit(sleeping_unit("long", Duration::from_secs(30), &log));

    let executor = BatchExecutor::new(test_config());
    let started = Instant::now();
    let (outcome, finished) = tokio::join!(executor.execute(&graph), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        executor.finish_execution(Duration::from_millis(100)).await
    });

    // The orderly phase times out; the forced phase drains the pool.
    finished.unwrap();
    let outcome = outcome.unwrap();
    assert!(outcome.cancelled);
    assert!(log.is_empty());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn finish_without_run_is_noop() {
    let executor = BatchExecutor::new(test_config());
    executor.finish_execution(Duration::ZERO).await.unwrap();
    executor.finish_execution(Duration::ZERO).await.unwrap();
    assert_eq!(executor.state(), ExecutionState::Idle);
    assert!(executor.last_outcome().is_none());
}

#[tokio::test]
async fn concurrent_finishes_both_succeed() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    graph.add_unit(sleeping_unit("a", Duration::from_millis(100), &log));

    let executor = BatchExecutor::new(test_config());
    let (outcome, first, second) = tokio::join!(
        executor.execute(&graph),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            executor.finish_execution(Duration::from_secs(5)).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            executor.finish_execution(Duration::from_secs(5)).await
        }
    );

    first.unwrap();
    second.unwrap();
    assert!(outcome.unwrap().cancelled);
    assert_eq!(log.names(), vec!["a"]);
}

#[tokio::test]
async fn host_interrupt_while_finishing() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    graph.add_unit(sleeping_unit("slow", Duration::from_secs(30), &log));

    let interrupt = CancellationToken::new();
    let executor = BatchExecutor::new(test_config()).with_interrupt(interrupt.clone());

    let (outcome, finished, _) = tokio::join!(
        executor.execute(&graph),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            executor.finish_execution(Duration::from_secs(30)).await
        },
        async {
            tokio::time::sleep(Duration::from_millis(80)).await;
            interrupt.cancel();
        }
    );

    assert_eq!(finished.unwrap_err().code(), "E310");
    let outcome = outcome.unwrap();
    assert!(outcome.cancelled);
    assert_eq!(outcome.first_error().map(StrataError::code), Some("E310"));
    assert!(interrupt.is_cancelled());
}
