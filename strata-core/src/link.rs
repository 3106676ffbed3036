//! Links between an output port and an input port.
//!
//! A link is a pass-through cell, not a queue: [`Link::accept`] overwrites
//! the previous value and [`Link::provide`] returns the last accepted value
//! without clearing it.

use crate::observer::{Callback, ObserverId, ObserverList};
use crate::types::{InputRef, LinkId, OutputRef};
use crate::value::Value;
use parking_lot::RwLock;
use std::fmt;

/// A one-slot conduit carrying the latest value from an output to an input.
pub struct Link {
    id: LinkId,
    source: OutputRef,
    target: InputRef,
    slot: RwLock<Option<Value>>,
    observers: ObserverList<Callback<Value>>,
}

impl Link {
    /// Create a new, empty link.
    pub fn new(id: LinkId, source: OutputRef, target: InputRef) -> Self {
        Self {
            id,
            source,
            target,
            slot: RwLock::new(None),
            observers: ObserverList::new(),
        }
    }

    /// The link ID.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// The output port feeding this link.
    pub fn source(&self) -> OutputRef {
        self.source
    }

    /// The input port fed by this link.
    pub fn target(&self) -> InputRef {
        self.target
    }

    /// Store a value, replacing whatever the link held before.
    pub fn accept(&self, value: Value) {
        *self.slot.write() = Some(value.clone());
        tracing::trace!(link_id = %self.id, value_type = value.type_name(), "Link accepted value");
        self.observers.notify(&value);
    }

    /// The most recently accepted value, if any.
    pub fn provide(&self) -> Option<Value> {
        self.slot.read().clone()
    }

    /// Drop the held value.
    pub fn clear(&self) {
        *self.slot.write() = None;
    }

    /// Whether the link currently holds a value.
    pub fn has_value(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Register a callback invoked after every accepted value.
    pub fn subscribe(&self, callback: impl Fn(&Value) + Send + Sync + 'static) -> ObserverId {
        self.observers.subscribe(callback)
    }

    /// Remove a callback registered with [`Link::subscribe`].
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("has_value", &self.has_value())
            .finish()
    }
}
