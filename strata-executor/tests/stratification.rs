//! Integration tests for dependency stratification.
//!
//! Tests verify that:
//! - Wavefronts partition the input set
//! - Every unit lands strictly after its in-set predecessors
//! - Predecessors outside the set are ignored
//! - Cycles are reported instead of looping

mod common;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use strata_core::prelude::*;
use strata_executor::scheduler::{ExecutionSet, compute_execution_sets};
use strata_executor::testing::{ExecutionLog, recording_unit};

use common::{chain, link};

fn ids(raw: &[u32]) -> Vec<UnitId> {
    raw.iter().copied().map(UnitId::new).collect()
}

fn wavefront_of(sets: &[ExecutionSet], unit: UnitId) -> usize {
    sets.iter()
        .position(|s| s.contains(unit))
        .expect("unit missing from wavefronts")
}

/// Deterministic pseudo-random DAG: edges only from lower to higher IDs.
fn random_dag(units: u32, seed: u64) -> HashMap<UnitId, Vec<UnitId>> {
    let mut state = seed;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut deps: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    for to in 1..units {
        for from in 0..to {
            if next() % 4 == 0 {
                deps.entry(UnitId::new(to)).or_default().push(UnitId::new(from));
            }
        }
    }
    deps
}

#[test]
fn wavefronts_partition_and_respect_dependencies() {
    for seed in 1..=25u64 {
        let deps = random_dag(30, seed * 7919);
        let units = ids(&(0..30).collect::<Vec<_>>());

        let sets = compute_execution_sets(units.iter().copied(), &deps).unwrap();

        let mut seen = HashSet::new();
        for set in &sets {
            assert!(!set.is_empty());
            for unit in set {
                assert!(seen.insert(unit), "{unit} appears twice");
            }
        }
        assert_eq!(seen.len(), units.len());

        for (unit, preds) in &deps {
            for pred in preds {
                assert!(wavefront_of(&sets, *pred) < wavefront_of(&sets, *unit));
            }
        }
    }
}

#[test]
fn independent_units_form_one_wavefront() {
    let deps: HashMap<UnitId, Vec<UnitId>> = HashMap::new();
    let sets = compute_execution_sets(ids(&[3, 1, 2]), &deps).unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].as_slice(), ids(&[1, 2, 3]).as_slice());
}

#[test]
fn join_waits_for_both_inputs() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    let a = graph.add_unit(recording_unit("a", &log));
    let b = graph.add_unit(recording_unit("b", &log));
    let c = graph.add_unit(Arc::new(FnUnit::new(
        UnitInfo::new("c").with_inputs(vec![PortSpec::any("left"), PortSpec::any("right")]),
        |_ctx| async { Ok::<(), BoxError>(()) },
    )));
    link(&graph, a, c);
    graph.connect(OutputRef::new(b, 0), InputRef::new(c, 1)).unwrap();

    let snapshot = graph.snapshot();
    let sets = compute_execution_sets(snapshot.unit_ids(), &snapshot).unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].as_slice(), &[a, b]);
    assert_eq!(sets[1].as_slice(), &[c]);
}

#[test]
fn subset_ignores_outside_predecessors() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    let units: Vec<UnitId> = ["a", "u", "b"]
        .iter()
        .map(|n| graph.add_unit(recording_unit(n, &log)))
        .collect();
    chain(&graph, &units);

    let snapshot = graph.snapshot();
    let sets = compute_execution_sets([units[1], units[2]], &snapshot).unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].as_slice(), &[units[1]]);
    assert_eq!(sets[1].as_slice(), &[units[2]]);
}

#[test]
fn cycle_is_reported() {
    let log = ExecutionLog::new();
    let graph = UnitGraph::new();
    let source = graph.add_unit(recording_unit("source", &log));
    let x = graph.add_unit(recording_unit("x", &log));
    let y = graph.add_unit(Arc::new(FnUnit::new(
        UnitInfo::new("y")
            .with_inputs(vec![PortSpec::any("in")])
            .with_outputs(vec![PortSpec::any("out")]),
        |_ctx| async { Ok::<(), BoxError>(()) },
    )));
    link(&graph, x, y);
    link(&graph, y, x);

    let snapshot = graph.snapshot();
    let err = compute_execution_sets(snapshot.unit_ids(), &snapshot).unwrap_err();
    match err {
        StrataError::DependencyCycle { units } => {
            assert!(units.contains(&x));
            assert!(units.contains(&y));
            assert!(!units.contains(&source));
        }
        other => panic!("expected a cycle, got {other}"),
    }
}
