//! The unit graph and its per-run snapshots.
//!
//! [`UnitGraph`] is the mutable, shared graph a host edits. Executors never
//! walk it directly; they take a [`GraphSnapshot`] at the start of a run and
//! use that immutable view for stratification and unit wiring, so concurrent
//! edits only affect later runs.

use crate::error::{Result, StrataError};
use crate::link::Link;
use crate::observer::{Callback, ObserverId, ObserverList};
use crate::traits::{Unit, UnitContext, UnitInfo};
use crate::types::{InputRef, LinkId, OutputRef, UnitId};
use crate::typing::{TypeContext, check_connection};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A structural change to a [`UnitGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEvent {
    /// A unit was added.
    UnitAdded(UnitId),
    /// A unit was removed (after its links were removed).
    UnitRemoved(UnitId),
    /// A link was created.
    Linked {
        /// The new link.
        link: LinkId,
        /// Source output port.
        from: OutputRef,
        /// Target input port.
        to: InputRef,
    },
    /// A link was removed.
    Unlinked {
        /// The removed link.
        link: LinkId,
        /// Source output port.
        from: OutputRef,
        /// Target input port.
        to: InputRef,
    },
}

/// A unit together with the port topology it reported when added.
#[derive(Clone)]
struct UnitEntry {
    unit: Arc<dyn Unit>,
    info: UnitInfo,
}

#[derive(Default)]
struct GraphState {
    units: BTreeMap<UnitId, UnitEntry>,
    links: BTreeMap<LinkId, Arc<Link>>,
    incoming: HashMap<InputRef, LinkId>,
    outgoing: BTreeMap<OutputRef, Vec<LinkId>>,
    next_unit: u32,
    next_link: u64,
}

impl GraphState {
    fn predecessors(&self, id: UnitId) -> Vec<UnitId> {
        let Some(entry) = self.units.get(&id) else {
            return Vec::new();
        };
        let preds: BTreeSet<UnitId> = (0..entry.info.inputs.len())
            .filter_map(|index| self.incoming.get(&InputRef::new(id, index)))
            .filter_map(|link_id| self.links.get(link_id))
            .map(|link| link.source().unit)
            .collect();
        preds.into_iter().collect()
    }

    fn successors(&self, id: UnitId) -> Vec<UnitId> {
        let Some(entry) = self.units.get(&id) else {
            return Vec::new();
        };
        let succs: BTreeSet<UnitId> = (0..entry.info.outputs.len())
            .filter_map(|index| self.outgoing.get(&OutputRef::new(id, index)))
            .flatten()
            .filter_map(|link_id| self.links.get(link_id))
            .map(|link| link.target().unit)
            .collect();
        succs.into_iter().collect()
    }

    fn entry(&self, id: UnitId) -> Result<&UnitEntry> {
        self.units
            .get(&id)
            .ok_or(StrataError::UnitNotFound { unit_id: id })
    }

    fn remove_link(&mut self, link_id: LinkId) -> Option<Arc<Link>> {
        let link = self.links.remove(&link_id)?;
        self.incoming.remove(&link.target());
        if let Some(ids) = self.outgoing.get_mut(&link.source()) {
            ids.retain(|id| *id != link_id);
            if ids.is_empty() {
                self.outgoing.remove(&link.source());
            }
        }
        Some(link)
    }
}

/// A mutable graph of units connected by links.
///
/// All mutators take `&self`; the graph is meant to be shared as
/// `Arc<UnitGraph>` between the host and the executors.
#[derive(Default)]
pub struct UnitGraph {
    state: RwLock<GraphState>,
    observers: ObserverList<Callback<GraphEvent>>,
}

impl UnitGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit and return its ID.
    pub fn add_unit(&self, unit: Arc<dyn Unit>) -> UnitId {
        let info = unit.info();
        let id = {
            let mut state = self.state.write();
            let id = UnitId::new(state.next_unit);
            state.next_unit += 1;
            tracing::debug!(unit_id = %id, unit_name = %info.name, "Unit added");
            state.units.insert(id, UnitEntry { unit, info });
            id
        };
        self.observers.notify(&GraphEvent::UnitAdded(id));
        id
    }

    /// Remove a unit and every link touching it.
    pub fn remove_unit(&self, id: UnitId) -> Result<Arc<dyn Unit>> {
        let (entry, removed_links) = {
            let mut state = self.state.write();
            let entry = state
                .units
                .remove(&id)
                .ok_or(StrataError::UnitNotFound { unit_id: id })?;
            let touching: Vec<LinkId> = state
                .links
                .values()
                .filter(|link| link.source().unit == id || link.target().unit == id)
                .map(|link| link.id())
                .collect();
            let removed: Vec<Arc<Link>> = touching
                .into_iter()
                .filter_map(|link_id| state.remove_link(link_id))
                .collect();
            (entry, removed)
        };

        tracing::debug!(unit_id = %id, links_removed = removed_links.len(), "Unit removed");
        for link in &removed_links {
            self.observers.notify(&GraphEvent::Unlinked {
                link: link.id(),
                from: link.source(),
                to: link.target(),
            });
        }
        self.observers.notify(&GraphEvent::UnitRemoved(id));
        Ok(entry.unit)
    }

    /// Connect an output port to an input port.
    ///
    /// Fails if either unit is unknown, a port index is out of range, or the
    /// input already has an incoming link.
    pub fn connect(&self, from: OutputRef, to: InputRef) -> Result<LinkId> {
        self.connect_inner(from, to, None)
    }

    /// Connect two ports after checking type compatibility under `ctx`.
    pub fn connect_checked(
        &self,
        from: OutputRef,
        to: InputRef,
        ctx: &dyn TypeContext,
    ) -> Result<LinkId> {
        self.connect_inner(from, to, Some(ctx))
    }

    fn connect_inner(
        &self,
        from: OutputRef,
        to: InputRef,
        ctx: Option<&dyn TypeContext>,
    ) -> Result<LinkId> {
        let link_id = {
            let mut state = self.state.write();
            let source = state.entry(from.unit)?;
            let target = state.entry(to.unit)?;

            if from.index >= source.info.outputs.len() {
                return Err(StrataError::InvalidPort {
                    unit_id: from.unit,
                    direction: "output",
                    index: from.index,
                    available: source.info.outputs.len(),
                });
            }
            if to.index >= target.info.inputs.len() {
                return Err(StrataError::InvalidPort {
                    unit_id: to.unit,
                    direction: "input",
                    index: to.index,
                    available: target.info.inputs.len(),
                });
            }
            if let Some(ctx) = ctx {
                check_connection(ctx, from, &source.info, to, &target.info)?;
            }
            if let Some(existing) = state.incoming.get(&to) {
                return Err(StrataError::InputAlreadyConnected {
                    input: to,
                    existing: *existing,
                });
            }

            let link_id = LinkId::new(state.next_link);
            state.next_link += 1;
            state
                .links
                .insert(link_id, Arc::new(Link::new(link_id, from, to)));
            state.incoming.insert(to, link_id);
            state.outgoing.entry(from).or_default().push(link_id);
            link_id
        };

        tracing::debug!(link_id = %link_id, from = %from, to = %to, "Link created");
        self.observers.notify(&GraphEvent::Linked {
            link: link_id,
            from,
            to,
        });
        Ok(link_id)
    }

    /// Remove a link.
    pub fn disconnect(&self, link_id: LinkId) -> Result<()> {
        let link = self
            .state
            .write()
            .remove_link(link_id)
            .ok_or(StrataError::InvalidLink { link_id })?;

        tracing::debug!(link_id = %link_id, "Link removed");
        self.observers.notify(&GraphEvent::Unlinked {
            link: link_id,
            from: link.source(),
            to: link.target(),
        });
        Ok(())
    }

    /// Get a unit by ID.
    pub fn unit(&self, id: UnitId) -> Option<Arc<dyn Unit>> {
        self.state.read().units.get(&id).map(|e| Arc::clone(&e.unit))
    }

    /// Get the port topology a unit reported when added.
    pub fn info(&self, id: UnitId) -> Option<UnitInfo> {
        self.state.read().units.get(&id).map(|e| e.info.clone())
    }

    /// Get a link by ID.
    pub fn link(&self, id: LinkId) -> Option<Arc<Link>> {
        self.state.read().links.get(&id).cloned()
    }

    /// Whether the graph contains a unit.
    pub fn contains(&self, id: UnitId) -> bool {
        self.state.read().units.contains_key(&id)
    }

    /// All unit IDs in ascending order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.state.read().units.keys().copied().collect()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.state.read().units.len()
    }

    /// Whether the graph has no units.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.state.read().links.len()
    }

    /// Units feeding at least one input of `id`.
    pub fn predecessors(&self, id: UnitId) -> Vec<UnitId> {
        self.state.read().predecessors(id)
    }

    /// Units fed by at least one output of `id`.
    pub fn successors(&self, id: UnitId) -> Vec<UnitId> {
        self.state.read().successors(id)
    }

    /// Every unit reachable downstream of `id`, excluding `id` itself.
    pub fn transitive_successors(&self, id: UnitId) -> BTreeSet<UnitId> {
        self.snapshot().transitive_successors(id)
    }

    /// Take an immutable view of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read();
        let predecessors = state
            .units
            .keys()
            .map(|id| (*id, state.predecessors(*id)))
            .collect();
        let successors = state
            .units
            .keys()
            .map(|id| (*id, state.successors(*id)))
            .collect();

        GraphSnapshot {
            units: state.units.clone(),
            links: state.links.clone(),
            incoming: state.incoming.clone(),
            outgoing: state.outgoing.clone(),
            predecessors,
            successors,
        }
    }

    /// Register a structural change observer.
    pub fn subscribe(&self, callback: impl Fn(&GraphEvent) + Send + Sync + 'static) -> ObserverId {
        self.observers.subscribe(callback)
    }

    /// Remove a structural change observer.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }
}

impl fmt::Debug for UnitGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("UnitGraph")
            .field("units", &state.units.len())
            .field("links", &state.links.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// An immutable view of a [`UnitGraph`] for the duration of one run.
///
/// Links are shared with the live graph, so values written during a run are
/// visible to later runs.
#[derive(Clone)]
pub struct GraphSnapshot {
    units: BTreeMap<UnitId, UnitEntry>,
    links: BTreeMap<LinkId, Arc<Link>>,
    incoming: HashMap<InputRef, LinkId>,
    outgoing: BTreeMap<OutputRef, Vec<LinkId>>,
    predecessors: BTreeMap<UnitId, Vec<UnitId>>,
    successors: BTreeMap<UnitId, Vec<UnitId>>,
}

impl GraphSnapshot {
    /// All unit IDs in ascending order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the snapshot has no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Whether the snapshot contains a unit.
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Get a unit by ID.
    pub fn unit(&self, id: UnitId) -> Option<&Arc<dyn Unit>> {
        self.units.get(&id).map(|e| &e.unit)
    }

    /// Get the port topology of a unit.
    pub fn info(&self, id: UnitId) -> Option<&UnitInfo> {
        self.units.get(&id).map(|e| &e.info)
    }

    /// Display name of a unit, or an empty string if unknown.
    pub fn unit_name(&self, id: UnitId) -> &str {
        self.info(id).map(|i| i.name.as_str()).unwrap_or_default()
    }

    /// Iterate over all links in ID order.
    pub fn links(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.links.values()
    }

    /// Get a link by ID.
    pub fn link(&self, id: LinkId) -> Option<&Arc<Link>> {
        self.links.get(&id)
    }

    /// The link feeding an input port, if connected.
    pub fn incoming_link(&self, input: InputRef) -> Option<&Arc<Link>> {
        self.incoming.get(&input).and_then(|id| self.links.get(id))
    }

    /// The links leaving an output port.
    pub fn outgoing_links(&self, output: OutputRef) -> Vec<&Arc<Link>> {
        self.outgoing
            .get(&output)
            .map(|ids| ids.iter().filter_map(|id| self.links.get(id)).collect())
            .unwrap_or_default()
    }

    /// Units feeding `id`, in ascending order.
    pub fn predecessors(&self, id: UnitId) -> &[UnitId] {
        self.predecessors.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Units fed by `id`, in ascending order.
    pub fn successors(&self, id: UnitId) -> &[UnitId] {
        self.successors.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every unit reachable downstream of `id`, excluding `id` itself.
    pub fn transitive_successors(&self, id: UnitId) -> BTreeSet<UnitId> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<UnitId> = self.successors(id).iter().copied().collect();

        while let Some(next) = queue.pop_front() {
            if next == id || !visited.insert(next) {
                continue;
            }
            queue.extend(self.successors(next).iter().copied());
        }
        visited
    }

    /// Order all units so that every unit follows its predecessors.
    ///
    /// Ties are broken by ascending unit ID.
    pub fn topological_order(&self) -> Result<Vec<UnitId>> {
        let mut in_degree: BTreeMap<UnitId, usize> = self
            .units
            .keys()
            .map(|id| (*id, self.predecessors(*id).len()))
            .collect();

        let mut ready: BTreeSet<UnitId> = in_degree
            .iter()
            .filter(|&(_, degree)| *degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted = Vec::with_capacity(self.units.len());
        while let Some(id) = ready.pop_first() {
            sorted.push(id);
            for succ in self.successors(id) {
                if let Some(degree) = in_degree.get_mut(succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(*succ);
                    }
                }
            }
        }

        if sorted.len() != self.units.len() {
            let units = self
                .units
                .keys()
                .filter(|id| !sorted.contains(id))
                .copied()
                .collect();
            return Err(StrataError::DependencyCycle { units });
        }

        Ok(sorted)
    }

    /// Build the execution context for `id`, wiring its ports to this
    /// snapshot's links.
    pub fn context_for(&self, id: UnitId, cancellation: CancellationToken) -> Result<UnitContext> {
        let info = self
            .info(id)
            .ok_or(StrataError::UnitNotFound { unit_id: id })?;

        let inputs = (0..info.inputs.len())
            .map(|index| self.incoming_link(InputRef::new(id, index)).cloned())
            .collect();
        let outputs = (0..info.outputs.len())
            .map(|index| {
                self.outgoing_links(OutputRef::new(id, index))
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .collect();

        Ok(UnitContext::new(id, inputs, outputs, cancellation))
    }
}

impl fmt::Debug for GraphSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSnapshot")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .field("links", &self.links.len())
            .finish()
    }
}
