//! Core types for Strata.

mod ids;

pub use ids::{InputRef, LinkId, OutputRef, SessionId, UnitId};
