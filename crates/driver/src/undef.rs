use z3::ast::{Ast, Bool, Dynamic};
use z3::Context;

/// Walks `term` looking for a leaf constant named `undefined` -- the
/// sentinel `p4tv_core::Value::undefined` emits for an uninitialized
/// `Declare`. Presence of one means the reported violation might be an
/// artifact of comparing uninitialized garbage rather than a genuine
/// semantic mismatch.
pub fn has_undefined_behavior<'ctx>(term: &Dynamic<'ctx>) -> bool {
    if term.decl().name() == "undefined" {
        return true;
    }
    term.children().iter().any(has_undefined_behavior)
}

/// Rewrites every `undefined` leaf in `term` to a distinct fresh constant,
/// then universally quantifies the rewritten formula over all of them: if
/// the mismatch holds no matter which concrete value the undefined field
/// takes, it is a real violation; otherwise it was an artifact of one
/// particular (arbitrary) undefined-value choice.
///
/// `Ite` is special-cased because its condition and branches aren't
/// uniformly typed the way a generic n-ary operator's children are, and
/// `And`/`Or` are rebuilt with their n-ary constructors rather than a
/// blind reapplication of the original declaration, which only accepts
/// the same arity it was built with.
pub fn substitute_undefined<'ctx>(ctx: &'ctx Context, term: &Bool<'ctx>) -> Bool<'ctx> {
    let mut nondets = Vec::new();
    let (rewritten, _) = rewrite(ctx, &Dynamic::from_ast(term), &mut nondets);
    let rewritten_bool = rewritten.as_bool().expect("rewriting a Bool term stays a Bool term");

    if nondets.is_empty() {
        return rewritten_bool;
    }
    let bounds: Vec<&dyn Ast<'ctx>> = nondets.iter().map(|d| d as &dyn Ast<'ctx>).collect();
    z3::ast::forall_const(ctx, &bounds, &[], &rewritten_bool)
}

/// Rewrites `node`, returning the rewritten term plus whether that term is
/// itself exactly a fresh substitution for an `undefined` leaf (as opposed
/// to a term that merely has one buried somewhere inside it). The caller
/// uses that flag to collapse an `ite` whose two branches are *both*
/// fresh-from-undefined into one shared fresh constant, rather than an
/// `ite` choosing between two independently undefined values.
fn rewrite<'ctx>(
    ctx: &'ctx Context,
    node: &Dynamic<'ctx>,
    nondets: &mut Vec<Dynamic<'ctx>>,
) -> (Dynamic<'ctx>, bool) {
    let name = node.decl().name();
    if name == "undefined" {
        let fresh = Dynamic::fresh_const(ctx, "nondet", &node.get_sort());
        nondets.push(fresh.clone());
        return (fresh, true);
    }

    let children = node.children();
    if children.is_empty() {
        return (node.clone(), false);
    }
    let rewritten: Vec<(Dynamic<'ctx>, bool)> = children.iter().map(|c| rewrite(ctx, c, nondets)).collect();

    if name == "ite" {
        let (then_term, then_undef) = &rewritten[1];
        let (else_term, else_undef) = &rewritten[2];
        if *then_undef && *else_undef {
            // Both arms are independently-fresh constants for the same
            // `undefined` leaf -- the condition can never distinguish them,
            // so collapse to a single shared fresh constant instead of an
            // `ite` over two values that were only ever going to be equal
            // up to existential choice.
            let fresh = Dynamic::fresh_const(ctx, "nondet", &node.get_sort());
            nondets.push(fresh.clone());
            return (fresh, true);
        }
        let cond = rewritten[0].0.as_bool().expect("ite condition must be boolean");
        return (cond.ite(then_term, else_term), false);
    }
    if name == "and" {
        let bools: Vec<Bool<'ctx>> = rewritten.iter().map(|(c, _)| c.as_bool().expect("and operand must be boolean")).collect();
        let refs: Vec<&Bool<'ctx>> = bools.iter().collect();
        return (Dynamic::from_ast(&Bool::and(ctx, &refs)), false);
    }
    if name == "or" {
        let bools: Vec<Bool<'ctx>> = rewritten.iter().map(|(c, _)| c.as_bool().expect("or operand must be boolean")).collect();
        let refs: Vec<&Bool<'ctx>> = bools.iter().collect();
        return (Dynamic::from_ast(&Bool::or(ctx, &refs)), false);
    }

    let refs: Vec<&dyn Ast<'ctx>> = rewritten.iter().map(|(c, _)| c as &dyn Ast<'ctx>).collect();
    (node.decl().apply(&refs), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::ast::BV;
    use z3::{Config, Sort};

    #[test]
    fn detects_undefined_leaf() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let sort = Sort::bitvector(&ctx, 8);
        let undef = Dynamic::new_const(&ctx, "undefined", &sort);
        let other = BV::from_u64(&ctx, 1, 8);
        let eq = undef.as_bv().unwrap()._eq(&other);
        assert!(has_undefined_behavior(&Dynamic::from_ast(&eq)));
    }

    #[test]
    fn clean_term_has_no_undefined_behavior() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let a = BV::from_u64(&ctx, 1, 8);
        let b = BV::from_u64(&ctx, 2, 8);
        let eq = a._eq(&b);
        assert!(!has_undefined_behavior(&Dynamic::from_ast(&eq)));
    }
}
