//! Unit trait and related types.

use super::context::UnitContext;
use crate::configuration::Configuration;
use crate::error::BoxError;
use crate::typing::TypeRef;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A typed port declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    /// Port name (e.g., "in", "data", "model").
    pub name: String,
    /// Formal type of the values flowing through the port.
    pub ty: TypeRef,
    /// Description of the port.
    pub description: String,
}

impl PortSpec {
    /// Create a port declaration.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            description: String::new(),
        }
    }

    /// Create a port accepting or producing anything.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, TypeRef::Any)
    }

    /// Set the port description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }
}

/// Metadata about a unit: its name and port topology.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    /// Display name (e.g., "csv_loader", "normalize").
    pub name: String,
    /// Description of what the unit does.
    pub description: String,
    /// Input ports, in index order.
    pub inputs: Vec<PortSpec>,
    /// Output ports, in index order.
    pub outputs: Vec<PortSpec>,
}

impl UnitInfo {
    /// Create unit info without ports.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set input ports.
    pub fn with_inputs(mut self, inputs: Vec<PortSpec>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Set output ports.
    pub fn with_outputs(mut self, outputs: Vec<PortSpec>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Get an input port by index.
    pub fn input(&self, index: usize) -> Option<&PortSpec> {
        self.inputs.get(index)
    }

    /// Get an output port by index.
    pub fn output(&self, index: usize) -> Option<&PortSpec> {
        self.outputs.get(index)
    }
}

/// A boxed future for async unit execution.
pub type UnitFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;

/// The capability interface of a graph node.
///
/// The engine never looks inside a unit. It reads the port topology from
/// [`Unit::info`], calls [`Unit::execute`] once per scheduled run, and
/// subscribes to [`Unit::configuration`] in reactive mode.
///
/// # Example
///
/// ```ignore
/// struct Doubler;
///
/// impl Unit for Doubler {
///     fn info(&self) -> UnitInfo {
///         UnitInfo::new("doubler")
///             .with_inputs(vec![PortSpec::new("in", TypeRef::named("i64"))])
///             .with_outputs(vec![PortSpec::new("out", TypeRef::named("i64"))])
///     }
///
///     fn execute<'a>(&'a self, ctx: UnitContext) -> UnitFuture<'a> {
///         Box::pin(async move {
///             let n = ctx.input_as::<i64>(0).unwrap_or_default();
///             ctx.emit_value(0, n * 2)?;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Unit: Send + Sync {
    /// Get metadata about this unit.
    fn info(&self) -> UnitInfo;

    /// Execute the unit: read inputs, compute, write outputs.
    fn execute<'a>(&'a self, ctx: UnitContext) -> UnitFuture<'a>;

    /// Mutable settings whose changes should trigger re-execution.
    fn configuration(&self) -> Option<&Configuration> {
        None
    }
}

/// A unit backed by a closure.
///
/// Useful for small transformation steps and for tests.
pub struct FnUnit<F> {
    info: UnitInfo,
    func: F,
    configuration: Option<Arc<Configuration>>,
}

impl<F, Fut> FnUnit<F>
where
    F: Fn(UnitContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    /// Create a closure-backed unit.
    pub fn new(info: UnitInfo, func: F) -> Self {
        Self {
            info,
            func,
            configuration: None,
        }
    }

    /// Attach an observable configuration.
    pub fn with_configuration(mut self, configuration: Arc<Configuration>) -> Self {
        self.configuration = Some(configuration);
        self
    }
}

impl<F, Fut> Unit for FnUnit<F>
where
    F: Fn(UnitContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn info(&self) -> UnitInfo {
        self.info.clone()
    }

    fn execute<'a>(&'a self, ctx: UnitContext) -> UnitFuture<'a> {
        Box::pin((self.func)(ctx))
    }

    fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_deref()
    }
}

impl<F> fmt::Debug for FnUnit<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit")
            .field("info", &self.info)
            .field("configurable", &self.configuration.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitId;

    #[test]
    fn unit_info_creation() {
        let info = UnitInfo::new("split")
            .with_description("Split a dataset")
            .with_inputs(vec![PortSpec::new("data", TypeRef::named("Table"))])
            .with_outputs(vec![
                PortSpec::new("train", TypeRef::named("Table")),
                PortSpec::new("test", TypeRef::named("Table")).with_description("Held out"),
            ]);

        assert_eq!(info.name, "split");
        assert_eq!(info.inputs.len(), 1);
        assert_eq!(info.output(1).map(|p| p.name.as_str()), Some("test"));
        assert!(info.input(1).is_none());
    }

    #[tokio::test]
    async fn fn_unit_runs_closure() {
        let unit = FnUnit::new(UnitInfo::new("noop"), |_ctx| async { Ok(()) });
        assert!(unit.configuration().is_none());
        assert_eq!(unit.info().name, "noop");

        let ctx = UnitContext::detached(UnitId::new(0));
        assert!(unit.execute(ctx).await.is_ok());
    }

    #[tokio::test]
    async fn fn_unit_propagates_error() {
        let configuration = Arc::new(Configuration::new());
        let unit = FnUnit::new(UnitInfo::new("failing"), |_ctx| async {
            Err::<(), BoxError>("boom".into())
        })
        .with_configuration(Arc::clone(&configuration));

        assert!(unit.configuration().is_some());
        let err = unit
            .execute(UnitContext::detached(UnitId::new(1)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
