//! Port type references and the type-compatibility protocol.
//!
//! A link from an output to an input is legal when the input's resolved
//! expected type is assignable from the output's resolved actual type under
//! a pluggable [`TypeContext`].

mod context;
mod type_ref;

pub use context::{GraphTypeContext, TypeContext, TypeRegistry, check_connection, is_link_valid};
pub use type_ref::TypeRef;
