//! Core traits for Strata components.
//!
//! This module defines the capability interface the engine depends on:
//! - `Unit`: A graph node performing one computation step
//! - `UnitContext`: Port access and cancellation handed to a unit on execution

mod context;
mod unit;

pub use context::UnitContext;
pub use unit::{FnUnit, PortSpec, Unit, UnitFuture, UnitInfo};
