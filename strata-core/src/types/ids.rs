//! Strongly-typed identifiers for Strata entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an execution session (one batch run or one
/// reactive executor lifetime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a session ID from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Identifier for a unit within a graph.
///
/// Unit IDs are assigned by the graph when a unit is added and are never
/// reused by the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(u32);

impl UnitId {
    /// Create a new unit ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit_{}", self.0)
    }
}

impl From<u32> for UnitId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for a link within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(u64);

impl LinkId {
    /// Create a new link ID from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link_{}", self.0)
    }
}

/// Address of an output port: the owning unit and the port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// The unit owning the port.
    pub unit: UnitId,
    /// Index into the unit's output list.
    pub index: usize,
}

impl OutputRef {
    /// Create a new output port reference.
    #[must_use]
    pub const fn new(unit: UnitId, index: usize) -> Self {
        Self { unit, index }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.out[{}]", self.unit, self.index)
    }
}

/// Address of an input port: the owning unit and the port index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InputRef {
    /// The unit owning the port.
    pub unit: UnitId,
    /// Index into the unit's input list.
    pub index: usize,
}

impl InputRef {
    /// Create a new input port reference.
    #[must_use]
    pub const fn new(unit: UnitId, index: usize) -> Self {
        Self { unit, index }
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.in[{}]", self.unit, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_uniqueness() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("session_"));
    }

    #[test]
    fn unit_id_display_and_order() {
        assert_eq!(UnitId::new(7).to_string(), "unit_7");
        assert!(UnitId::new(1) < UnitId::new(2));
        assert_eq!(UnitId::from(3).as_u32(), 3);
    }

    #[test]
    fn port_refs_display() {
        let out = OutputRef::new(UnitId::new(1), 0);
        let input = InputRef::new(UnitId::new(2), 3);
        assert_eq!(out.to_string(), "unit_1.out[0]");
        assert_eq!(input.to_string(), "unit_2.in[3]");
    }
}
