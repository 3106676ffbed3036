//! Strata Core Library
//!
//! This crate provides the foundational types and traits for the Strata
//! dataflow engine: the graph of processing units, the links that carry
//! values between their ports, and the type-compatibility protocol used
//! when wiring links.
//!
//! # Key Components
//!
//! - **Units**: The [`Unit`] trait and the [`UnitContext`] handed to it on execution
//! - **Links**: One-slot mailboxes connecting an output port to an input port
//! - **Graph**: [`UnitGraph`] with snapshot views for a single execution cycle
//! - **Configuration**: Observable per-unit settings driving reactive re-execution
//! - **Typing**: [`TypeRef`], [`TypeContext`] and the [`is_link_valid`] predicate
//!
//! # Example
//!
//! ```ignore
//! use strata_core::prelude::*;
//!
//! let graph = UnitGraph::new();
//! let source = graph.add_unit(Arc::new(my_source));
//! let sink = graph.add_unit(Arc::new(my_sink));
//! graph.connect(OutputRef::new(source, 0), InputRef::new(sink, 0))?;
//!
//! let snapshot = graph.snapshot();
//! assert_eq!(snapshot.predecessors(sink), &[source]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod configuration;
pub mod error;
pub mod graph;
pub mod link;
pub mod observer;
pub mod prelude;
pub mod traits;
pub mod types;
pub mod typing;
pub mod value;

// Re-export key types at crate root for convenience
pub use configuration::{Configuration, ConfigurationChange};
pub use error::{BoxError, Result, StrataError};
pub use graph::{GraphEvent, GraphSnapshot, UnitGraph};
pub use link::Link;
pub use observer::{ObserverId, ObserverList};
pub use traits::{FnUnit, PortSpec, Unit, UnitContext, UnitFuture, UnitInfo};
pub use types::{InputRef, LinkId, OutputRef, SessionId, UnitId};
pub use typing::{GraphTypeContext, TypeContext, TypeRef, TypeRegistry, is_link_valid};
pub use value::Value;
