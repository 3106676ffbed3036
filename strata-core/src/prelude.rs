//! Prelude for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! # Example
//!
//! ```ignore
//! use strata_core::prelude::*;
//! ```

// Core types
pub use crate::types::{InputRef, LinkId, OutputRef, SessionId, UnitId};

// Error handling
pub use crate::error::{BoxError, Result, StrataError};

// Graph
pub use crate::graph::{GraphEvent, GraphSnapshot, UnitGraph};
pub use crate::link::Link;
pub use crate::value::Value;

// Traits
pub use crate::traits::{FnUnit, PortSpec, Unit, UnitContext, UnitFuture, UnitInfo};

// Configuration
pub use crate::configuration::{Configuration, ConfigurationChange};

// Typing
pub use crate::typing::{GraphTypeContext, TypeContext, TypeRef, TypeRegistry, is_link_valid};

// Observers
pub use crate::observer::ObserverId;

// Re-export commonly used external types
pub use std::sync::Arc;
