//! Integration tests for the graph model.
//!
//! Tests verify that:
//! - Link buffers hold their value until overwritten
//! - Generic type variables are inferred across links
//! - Subtype declarations widen what a port accepts
//! - Checked connections reject incompatible links

use std::sync::Arc;
use strata_core::prelude::*;

fn unit(name: &str, inputs: Vec<PortSpec>, outputs: Vec<PortSpec>) -> Arc<dyn Unit> {
    let info = UnitInfo::new(name).with_inputs(inputs).with_outputs(outputs);
    Arc::new(FnUnit::new(info, |_ctx| async { Ok::<(), BoxError>(()) }))
}

fn list_of(param: TypeRef) -> TypeRef {
    TypeRef::generic("List", vec![param])
}

#[test]
fn provide_is_idempotent_until_next_accept() {
    let link = Link::new(
        LinkId::new(0),
        OutputRef::new(UnitId::new(0), 0),
        InputRef::new(UnitId::new(1), 0),
    );
    assert!(link.provide().is_none());

    link.accept(Value::new(41u32));
    let first = link.provide().unwrap();
    let second = link.provide().unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(second.get::<u32>(), Some(41));

    link.accept(Value::new(42u32));
    assert_eq!(link.provide().and_then(|v| v.get::<u32>()), Some(42));
}

#[test]
fn generic_unit_resolves_from_upstream() {
    let graph = UnitGraph::new();
    let source = graph.add_unit(unit(
        "numbers",
        vec![],
        vec![PortSpec::new("out", list_of(TypeRef::named("Int")))],
    ));
    let head = graph.add_unit(unit(
        "head",
        vec![PortSpec::new("in", list_of(TypeRef::var("T")))],
        vec![PortSpec::new("out", TypeRef::var("T"))],
    ));
    let int_sink = graph.add_unit(unit(
        "int_sink",
        vec![PortSpec::new("in", TypeRef::named("Int"))],
        vec![],
    ));
    let text_sink = graph.add_unit(unit(
        "text_sink",
        vec![PortSpec::new("in", TypeRef::named("String"))],
        vec![],
    ));

    graph
        .connect(OutputRef::new(source, 0), InputRef::new(head, 0))
        .unwrap();
    let good = graph
        .connect(OutputRef::new(head, 0), InputRef::new(int_sink, 0))
        .unwrap();
    let bad = graph
        .connect(OutputRef::new(head, 0), InputRef::new(text_sink, 0))
        .unwrap();

    let snapshot = graph.snapshot();
    let ctx = GraphTypeContext::infer(TypeRegistry::new(), &snapshot);
    assert_eq!(ctx.binding(head, "T"), Some(&TypeRef::named("Int")));

    assert!(is_link_valid(&ctx, &snapshot, snapshot.link(good).unwrap()));
    assert!(!is_link_valid(&ctx, &snapshot, snapshot.link(bad).unwrap()));

    // Without inference the variable stays a wildcard.
    let plain = GraphTypeContext::new(TypeRegistry::new());
    assert!(is_link_valid(&plain, &snapshot, snapshot.link(bad).unwrap()));
}

#[test]
fn generic_unit_infers_through_declared_subtype() {
    let registry = TypeRegistry::new().with_subtype("ArrayList", "List");

    let graph = UnitGraph::new();
    let source = graph.add_unit(unit(
        "numbers",
        vec![],
        vec![PortSpec::new(
            "out",
            TypeRef::generic("ArrayList", vec![TypeRef::named("Int")]),
        )],
    ));
    let head = graph.add_unit(unit(
        "head",
        vec![PortSpec::new("in", list_of(TypeRef::var("T")))],
        vec![PortSpec::new("out", TypeRef::var("T"))],
    ));
    let text_sink = graph.add_unit(unit(
        "text_sink",
        vec![PortSpec::new("in", TypeRef::named("String"))],
        vec![],
    ));

    graph
        .connect(OutputRef::new(source, 0), InputRef::new(head, 0))
        .unwrap();
    let bad = graph
        .connect(OutputRef::new(head, 0), InputRef::new(text_sink, 0))
        .unwrap();

    let snapshot = graph.snapshot();
    let ctx = GraphTypeContext::infer(registry, &snapshot);
    assert_eq!(ctx.binding(head, "T"), Some(&TypeRef::named("Int")));
    assert!(!is_link_valid(&ctx, &snapshot, snapshot.link(bad).unwrap()));
}

#[test]
fn declared_subtypes_are_assignable() {
    let registry = TypeRegistry::new()
        .with_subtype("Int", "Number")
        .with_subtype("Number", "Value");

    let graph = UnitGraph::new();
    let source = graph.add_unit(unit(
        "source",
        vec![],
        vec![PortSpec::new("out", TypeRef::named("Int"))],
    ));
    let sink = graph.add_unit(unit(
        "sink",
        vec![PortSpec::new("in", TypeRef::named("Value"))],
        vec![],
    ));
    let reverse = graph.add_unit(unit(
        "reverse",
        vec![PortSpec::new("in", TypeRef::named("Int"))],
        vec![PortSpec::new("out", TypeRef::named("Number"))],
    ));

    let ctx = GraphTypeContext::new(registry);
    graph
        .connect_checked(OutputRef::new(source, 0), InputRef::new(sink, 0), &ctx)
        .unwrap();

    // Number is not an Int.
    let err = graph
        .connect_checked(OutputRef::new(reverse, 0), InputRef::new(reverse, 0), &ctx)
        .unwrap_err();
    assert_eq!(err.code(), "E408");
    assert_eq!(graph.link_count(), 1);
}

#[test]
fn parameters_are_invariant() {
    let registry = TypeRegistry::new().with_subtype("Int", "Number");
    let ints = list_of(TypeRef::named("Int"));
    let numbers = list_of(TypeRef::named("Number"));

    assert!(registry.is_assignable(&ints, &ints));
    assert!(!registry.is_assignable(&numbers, &ints));
    assert!(registry.is_assignable(&list_of(TypeRef::var("T")), &ints));
    assert!(registry.is_assignable(&TypeRef::Any, &numbers));
    assert!(!registry.is_assignable(&numbers, &TypeRef::Any));
}

#[test]
fn link_outside_graph_is_invalid() {
    let graph = UnitGraph::new();
    let a = graph.add_unit(unit("a", vec![], vec![PortSpec::any("out")]));
    let link = Link::new(
        LinkId::new(99),
        OutputRef::new(a, 0),
        InputRef::new(UnitId::new(1000), 0),
    );
    let ctx = GraphTypeContext::new(TypeRegistry::new());
    assert!(!is_link_valid(&ctx, &graph.snapshot(), &link));
}

#[test]
fn snapshot_is_stable_under_mutation() {
    let graph = UnitGraph::new();
    let a = graph.add_unit(unit("a", vec![], vec![PortSpec::any("out")]));
    let b = graph.add_unit(unit("b", vec![PortSpec::any("in")], vec![]));
    let snapshot = graph.snapshot();

    graph.connect(OutputRef::new(a, 0), InputRef::new(b, 0)).unwrap();
    graph.remove_unit(a).unwrap();

    assert_eq!(snapshot.unit_ids(), vec![a, b]);
    assert!(snapshot.predecessors(b).is_empty());
    assert_eq!(graph.unit_ids(), vec![b]);
}
