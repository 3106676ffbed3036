//! Type contexts and the link validity predicate.

use super::type_ref::TypeRef;
use crate::error::{Result, StrataError};
use crate::graph::GraphSnapshot;
use crate::link::Link;
use crate::traits::UnitInfo;
use crate::types::{InputRef, OutputRef, UnitId};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Resolves port types and decides assignability.
///
/// The engine only consults a type context when a link is wired; values are
/// never type-checked at run time.
pub trait TypeContext: Send + Sync {
    /// Resolve the formal type of a port on `unit` to its actual type.
    fn resolve(&self, unit: UnitId, formal: &TypeRef) -> TypeRef;

    /// Whether a value of type `actual` may flow into a port expecting `expected`.
    fn is_assignable(&self, expected: &TypeRef, actual: &TypeRef) -> bool;
}

/// Declared subtype relations between named types.
///
/// The relation is reflexive and transitive: declaring `Int <: Number` and
/// `Number <: Scalar` makes `Int` assignable to `Scalar`.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    supertypes: HashMap<String, BTreeSet<String>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `sub` as a direct subtype of `sup`.
    pub fn declare_subtype(&mut self, sub: impl Into<String>, sup: impl Into<String>) {
        self.supertypes
            .entry(sub.into())
            .or_default()
            .insert(sup.into());
    }

    /// Builder form of [`Self::declare_subtype`].
    pub fn with_subtype(mut self, sub: impl Into<String>, sup: impl Into<String>) -> Self {
        self.declare_subtype(sub, sup);
        self
    }

    /// Whether `sub` is `sup` or one of its declared (transitive) subtypes.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }

        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([sub]);
        while let Some(current) = queue.pop_front() {
            let Some(parents) = self.supertypes.get(current) else {
                continue;
            };
            for parent in parents {
                if parent == sup {
                    return true;
                }
                if seen.insert(parent.as_str()) {
                    queue.push_back(parent.as_str());
                }
            }
        }
        false
    }

    /// Bind the variables of `formal` against `actual`, looking through
    /// declared subtypes at the outermost level.
    ///
    /// An `ArrayList<Int>` fed into a `List<T>` input binds `T := Int` when
    /// `ArrayList <: List` is declared.
    pub fn unify(
        &self,
        formal: &TypeRef,
        actual: &TypeRef,
        bindings: &mut HashMap<String, TypeRef>,
    ) {
        formal.unify_with(actual, bindings, |sub, sup| self.is_subtype(sub, sup));
    }

    fn assignable(&self, expected: &TypeRef, actual: &TypeRef) -> bool {
        match (expected, actual) {
            (TypeRef::Any, _) => true,
            (TypeRef::Var { .. }, _) | (_, TypeRef::Var { .. }) => true,
            (_, TypeRef::Any) => false,
            (
                TypeRef::Named { name, params },
                TypeRef::Named {
                    name: actual_name,
                    params: actual_params,
                },
            ) => {
                self.is_subtype(actual_name, name)
                    && params.len() == actual_params.len()
                    && params
                        .iter()
                        .zip(actual_params)
                        .all(|(e, a)| params_match(e, a))
            }
        }
    }
}

/// Type parameters are invariant; a variable on either side matches anything.
fn params_match(expected: &TypeRef, actual: &TypeRef) -> bool {
    match (expected, actual) {
        (TypeRef::Var { .. }, _) | (_, TypeRef::Var { .. }) => true,
        (TypeRef::Any, TypeRef::Any) => true,
        (
            TypeRef::Named { name, params },
            TypeRef::Named {
                name: actual_name,
                params: actual_params,
            },
        ) => {
            name == actual_name
                && params.len() == actual_params.len()
                && params
                    .iter()
                    .zip(actual_params)
                    .all(|(e, a)| params_match(e, a))
        }
        _ => false,
    }
}

impl TypeContext for TypeRegistry {
    fn resolve(&self, _unit: UnitId, formal: &TypeRef) -> TypeRef {
        formal.clone()
    }

    fn is_assignable(&self, expected: &TypeRef, actual: &TypeRef) -> bool {
        self.assignable(expected, actual)
    }
}

/// Type context that infers generic bindings from a graph's links.
///
/// Units are visited in dependency order. For every connected input, the
/// formal input type is unified against the resolved type of the upstream
/// output, so a unit declaring `List<T>` fed by a `List<Int>` resolves its
/// `T` outputs to `Int`.
#[derive(Debug, Clone, Default)]
pub struct GraphTypeContext {
    registry: TypeRegistry,
    bindings: HashMap<UnitId, HashMap<String, TypeRef>>,
}

impl GraphTypeContext {
    /// Create a context without inferred bindings.
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            bindings: HashMap::new(),
        }
    }

    /// Infer per-unit variable bindings from a snapshot.
    pub fn infer(registry: TypeRegistry, graph: &GraphSnapshot) -> Self {
        let mut ctx = Self::new(registry);

        // Cyclic graphs still get a best-effort pass in id order.
        let order = graph
            .topological_order()
            .unwrap_or_else(|_| graph.unit_ids());

        for unit_id in order {
            let Some(info) = graph.info(unit_id) else {
                continue;
            };
            let mut unit_bindings = HashMap::new();
            for (index, port) in info.inputs.iter().enumerate() {
                let Some(link) = graph.incoming_link(InputRef::new(unit_id, index)) else {
                    continue;
                };
                let source = link.source();
                let Some(source_port) = graph.info(source.unit).and_then(|i| i.output(source.index))
                else {
                    continue;
                };
                let actual = ctx.resolve(source.unit, &source_port.ty);
                ctx.registry.unify(&port.ty, &actual, &mut unit_bindings);
            }
            if !unit_bindings.is_empty() {
                tracing::trace!(unit_id = %unit_id, bindings = unit_bindings.len(), "Inferred type bindings");
                ctx.bindings.insert(unit_id, unit_bindings);
            }
        }

        ctx
    }

    /// The registry of subtype relations.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Inferred binding of variable `name` on `unit`.
    pub fn binding(&self, unit: UnitId, name: &str) -> Option<&TypeRef> {
        self.bindings.get(&unit)?.get(name)
    }
}

impl TypeContext for GraphTypeContext {
    fn resolve(&self, unit: UnitId, formal: &TypeRef) -> TypeRef {
        match self.bindings.get(&unit) {
            Some(bindings) => formal.substitute(bindings),
            None => formal.clone(),
        }
    }

    fn is_assignable(&self, expected: &TypeRef, actual: &TypeRef) -> bool {
        self.registry.assignable(expected, actual)
    }
}

/// Check that output `from` of `source` may feed input `to` of `target`.
pub fn check_connection(
    ctx: &dyn TypeContext,
    from: OutputRef,
    source: &UnitInfo,
    to: InputRef,
    target: &UnitInfo,
) -> Result<()> {
    let out_port = source.output(from.index).ok_or(StrataError::InvalidPort {
        unit_id: from.unit,
        direction: "output",
        index: from.index,
        available: source.outputs.len(),
    })?;
    let in_port = target.input(to.index).ok_or(StrataError::InvalidPort {
        unit_id: to.unit,
        direction: "input",
        index: to.index,
        available: target.inputs.len(),
    })?;

    let actual = ctx.resolve(from.unit, &out_port.ty);
    let expected = ctx.resolve(to.unit, &in_port.ty);
    if ctx.is_assignable(&expected, &actual) {
        Ok(())
    } else {
        Err(StrataError::IncompatibleLink {
            from,
            to,
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Whether `link` is type-correct within `graph` under `ctx`.
///
/// A link whose endpoints are not part of the graph is never valid.
pub fn is_link_valid(ctx: &dyn TypeContext, graph: &GraphSnapshot, link: &Link) -> bool {
    let (from, to) = (link.source(), link.target());
    match (graph.info(from.unit), graph.info(to.unit)) {
        (Some(source), Some(target)) => check_connection(ctx, from, source, to, target).is_ok(),
        _ => false,
    }
}
