//! Dependency stratification.
//!
//! Splits a set of units into wavefronts: ordered, disjoint sets in which
//! no unit depends on another unit of the same or a later set. Only
//! dependencies between units of the considered set count, so a subgraph
//! selected for re-execution is stratified as if its outside producers had
//! already run.

use std::collections::{BTreeSet, HashMap};
use strata_core::error::{Result, StrataError};
use strata_core::graph::GraphSnapshot;
use strata_core::types::UnitId;

/// Anything that can report the direct predecessors of a unit.
pub trait DependencySource {
    /// Units that feed `unit`. Units outside the considered set may appear.
    fn predecessors_of(&self, unit: UnitId) -> &[UnitId];
}

impl DependencySource for GraphSnapshot {
    fn predecessors_of(&self, unit: UnitId) -> &[UnitId] {
        self.predecessors(unit)
    }
}

impl DependencySource for HashMap<UnitId, Vec<UnitId>> {
    fn predecessors_of(&self, unit: UnitId) -> &[UnitId] {
        self.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A wavefront: units that may execute concurrently.
///
/// Iteration order is ascending unit ID; equality ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSet {
    units: Vec<UnitId>,
}

impl ExecutionSet {
    /// Build a set from any collection of units.
    pub fn new(units: impl IntoIterator<Item = UnitId>) -> Self {
        let units: BTreeSet<UnitId> = units.into_iter().collect();
        Self {
            units: units.into_iter().collect(),
        }
    }

    /// Whether the set contains `unit`.
    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.binary_search(&unit).is_ok()
    }

    /// Iterate over the units in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().copied()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The units as a sorted slice.
    pub fn as_slice(&self) -> &[UnitId] {
        &self.units
    }
}

impl FromIterator<UnitId> for ExecutionSet {
    fn from_iter<I: IntoIterator<Item = UnitId>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a ExecutionSet {
    type Item = UnitId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, UnitId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter().copied()
    }
}

/// Compute the wavefronts of `units`.
///
/// Set 0 holds the units with no predecessor inside `units`; set k holds
/// the units whose in-set predecessors all belong to sets 0..k. Every unit
/// lands in exactly one set, the earliest it is eligible for.
///
/// Returns [`StrataError::DependencyCycle`] listing the units that could
/// never become eligible when the in-set dependencies are cyclic.
pub fn compute_execution_sets<D>(
    units: impl IntoIterator<Item = UnitId>,
    dependencies: &D,
) -> Result<Vec<ExecutionSet>>
where
    D: DependencySource + ?Sized,
{
    let mut remaining: BTreeSet<UnitId> = units.into_iter().collect();
    let total = remaining.len();
    let mut sets = Vec::new();

    while !remaining.is_empty() {
        let ready: Vec<UnitId> = remaining
            .iter()
            .copied()
            .filter(|unit| {
                dependencies
                    .predecessors_of(*unit)
                    .iter()
                    .all(|pred| !remaining.contains(pred))
            })
            .collect();

        if ready.is_empty() {
            let units: Vec<UnitId> = remaining.into_iter().collect();
            tracing::warn!(stuck = units.len(), "Dependency cycle prevents stratification");
            return Err(StrataError::DependencyCycle { units });
        }

        for unit in &ready {
            remaining.remove(unit);
        }
        sets.push(ExecutionSet { units: ready });
    }

    tracing::debug!(units = total, wavefronts = sets.len(), "Stratified units");
    Ok(sets)
}
