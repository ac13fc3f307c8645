use std::collections::BTreeMap;

use p4tv_driver::{check_equivalence, Outcome};
use p4tv_ir::{ActionDef, ControlDef, Direction, Node, Package, Param, TypeRef};

fn control_with_body(body: Node) -> ControlDef {
    ControlDef {
        name: "ingress".to_string(),
        is_parser: false,
        params: vec![Param {
            name: "x".to_string(),
            ty: TypeRef::Bit { width: 8 },
            direction: Direction::InOut,
        }],
        locals: vec![],
        body,
    }
}

fn package_with(body: Node) -> Package {
    let mut controls = BTreeMap::new();
    controls.insert("ingress".to_string(), control_with_body(body));
    let mut pipelines = BTreeMap::new();
    pipelines.insert("ingress".to_string(), "ingress".to_string());
    Package {
        name: "p".to_string(),
        types: vec![],
        actions: BTreeMap::new(),
        tables: BTreeMap::new(),
        controls,
        pipelines,
    }
}

fn assign_x(value: Node) -> Node {
    Node::Block {
        statements: vec![Node::Assign { lval: Box::new(Node::Name("x".to_string())), rval: Box::new(value) }],
    }
}

fn lit(width: u32, value: u64) -> Node {
    Node::Literal { width, value }
}

#[test]
fn identical_programs_are_equivalent() {
    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);

    let body = assign_x(Node::BinaryOp {
        op: p4tv_ir::BinOp::Add,
        lhs: Box::new(Node::Name("x".to_string())),
        rhs: Box::new(lit(8, 1)),
    });
    let pkg_a = package_with(body.clone());
    let pkg_b = package_with(body);

    let results = check_equivalence(&ctx, ("a", &pkg_a), ("b", &pkg_b), false, 10_000).unwrap();
    assert!(matches!(results["ingress"], Outcome::Equivalent));
}

#[test]
fn constant_rewrite_is_a_violation() {
    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);

    let pkg_a = package_with(assign_x(lit(8, 1)));
    let pkg_b = package_with(assign_x(lit(8, 2)));

    let results = check_equivalence(&ctx, ("a", &pkg_a), ("b", &pkg_b), false, 10_000).unwrap();
    assert!(results["ingress"].is_violation());
}

#[test]
fn reordered_independent_assignments_are_equivalent() {
    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);

    let forward = Node::Block {
        statements: vec![
            Node::Assign { lval: Box::new(Node::Name("x".to_string())), rval: Box::new(lit(8, 3)) },
            Node::Assign {
                lval: Box::new(Node::Name("x".to_string())),
                rval: Box::new(Node::BinaryOp {
                    op: p4tv_ir::BinOp::Add,
                    lhs: Box::new(Node::Name("x".to_string())),
                    rhs: Box::new(lit(8, 4)),
                }),
            },
        ],
    };
    let pkg_a = package_with(forward);
    let pkg_b = package_with(assign_x(lit(8, 7)));

    let results = check_equivalence(&ctx, ("a", &pkg_a), ("b", &pkg_b), false, 10_000).unwrap();
    assert!(matches!(results["ingress"], Outcome::Equivalent));
}

#[test]
fn mismatched_pipeline_sets_are_skipped_not_violations() {
    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);

    let pkg_a = package_with(assign_x(lit(8, 1)));
    let mut pkg_b = package_with(assign_x(lit(8, 1)));
    pkg_b.pipelines.clear();
    pkg_b.controls.insert("egress".to_string(), control_with_body(assign_x(lit(8, 1))));
    pkg_b.pipelines.insert("egress".to_string(), "egress".to_string());

    let results = check_equivalence(&ctx, ("a", &pkg_a), ("b", &pkg_b), false, 10_000).unwrap();
    assert!(matches!(results["ingress"], Outcome::Skipped { .. }));
    assert!(matches!(results["egress"], Outcome::Skipped { .. }));
}

#[test]
fn undefined_read_is_discharged_when_allowed() {
    let cfg = z3::Config::new();
    let ctx = z3::Context::new(&cfg);

    let declare_then_copy = Node::Block {
        statements: vec![
            Node::Declare { name: "tmp".to_string(), ty: TypeRef::Bit { width: 8 }, init: None },
            Node::Assign { lval: Box::new(Node::Name("x".to_string())), rval: Box::new(Node::Name("tmp".to_string())) },
        ],
    };
    let pkg_a = package_with(declare_then_copy);
    let pkg_b = package_with(assign_x(lit(8, 0)));

    let strict = check_equivalence(&ctx, ("a", &pkg_a), ("b", &pkg_b), false, 10_000).unwrap();
    assert!(strict["ingress"].is_violation());

    let lenient = check_equivalence(&ctx, ("a", &pkg_a), ("b", &pkg_b), true, 10_000).unwrap();
    assert!(matches!(lenient["ingress"], Outcome::Equivalent));
}
