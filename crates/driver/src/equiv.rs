use std::collections::{BTreeMap, BTreeSet};

use z3::ast::{Ast, Bool};
use z3::{Context, Params, SatResult, Solver, Tactic};

use p4tv_core::TypeRegistry;
use p4tv_ir::Package;
use p4tv_interp::InterpError;

use crate::error::DriverError;
use crate::outcome::Outcome;
use crate::undef;

/// Compares every pipeline the two programs have in common. Pipelines
/// declared by only one program are reported `Skipped`, not treated as a
/// mismatch -- a missing counterpart is not evidence of a behavioral
/// difference.
///
/// The two programs are assumed to share one type environment (the same
/// headers and metadata struct, differing only in table/action/control
/// logic) -- the registry is built once, from `program_a`'s declarations,
/// and reused for `program_b` rather than building two independent ones.
pub fn check_equivalence<'ctx>(
    ctx: &'ctx Context,
    program_a: (&str, &Package),
    program_b: (&str, &Package),
    allow_undefined: bool,
    solver_timeout_ms: u32,
) -> Result<BTreeMap<String, Outcome>, DriverError> {
    let (name_a, pkg_a) = program_a;
    let (name_b, pkg_b) = program_b;

    if pkg_a.pipelines.is_empty() {
        return Err(DriverError::NoPipelines { program: name_a.to_string() });
    }
    if pkg_b.pipelines.is_empty() {
        return Err(DriverError::NoPipelines { program: name_b.to_string() });
    }

    let reg = p4tv_interp::build_registry(ctx, &pkg_a.types).map_err(|e| DriverError::Setup(e.to_string()))?;

    let pipelines_a: BTreeSet<&str> = pkg_a.pipeline_names().collect();
    let pipelines_b: BTreeSet<&str> = pkg_b.pipeline_names().collect();

    let mut results = BTreeMap::new();
    for pipeline in pipelines_a.union(&pipelines_b) {
        if !pipelines_a.contains(pipeline) || !pipelines_b.contains(pipeline) {
            tracing::warn!(pipeline, "pipeline present in only one program, skipping");
            results.insert(
                (*pipeline).to_string(),
                Outcome::Skipped { reason: format!("pipeline {pipeline:?} present in only one program") },
            );
            continue;
        }
        tracing::info!(pipeline, "comparing pipeline");
        let outcome = check_pipeline(ctx, &reg, pkg_a, pkg_b, pipeline, allow_undefined, solver_timeout_ms);
        if outcome.is_violation() {
            tracing::error!(pipeline, "pipeline outputs differ");
        }
        results.insert((*pipeline).to_string(), outcome);
    }
    Ok(results)
}

fn check_pipeline<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    pkg_a: &Package,
    pkg_b: &Package,
    pipeline: &str,
    allow_undefined: bool,
    solver_timeout_ms: u32,
) -> Outcome {
    let out_a = match p4tv_interp::run_pipeline(ctx, reg, pkg_a, pipeline) {
        Ok(v) => v,
        Err(e) => return interp_error_to_outcome(e),
    };
    let out_b = match p4tv_interp::run_pipeline(ctx, reg, pkg_b, pipeline) {
        Ok(v) => v,
        Err(e) => return interp_error_to_outcome(e),
    };

    if out_a.len() != out_b.len() {
        return Outcome::Skipped { reason: "differing pipeline output arity".to_string() };
    }

    let mut diffs = Vec::with_capacity(out_a.len());
    for ((_, val_a), (_, val_b)) in out_a.iter().zip(out_b.iter()) {
        let term_a = match val_a.to_term(reg) {
            Ok(t) => t,
            Err(e) => return Outcome::Failure { reason: e.to_string() },
        };
        let term_b = match val_b.to_term(reg) {
            Ok(t) => t,
            Err(e) => return Outcome::Failure { reason: e.to_string() },
        };
        diffs.push(term_a._eq(&term_b).not());
    }
    let refs: Vec<&Bool<'ctx>> = diffs.iter().collect();
    let any_diff = Bool::or(ctx, &refs);

    let solver = tactic_solver(ctx, solver_timeout_ms);
    solver.assert(&any_diff);
    match solver.check() {
        SatResult::Unsat => Outcome::Equivalent,
        SatResult::Unknown => Outcome::Failure { reason: "solver returned unknown".to_string() },
        SatResult::Sat => {
            let model = solver.get_model().map(|m| m.to_string()).unwrap_or_default();
            if allow_undefined && undef::has_undefined_behavior(&z3::ast::Dynamic::from_ast(&any_diff)) {
                let rewritten = undef::substitute_undefined(ctx, &any_diff);
                let recheck = tactic_solver(ctx, solver_timeout_ms);
                recheck.assert(&rewritten);
                match recheck.check() {
                    SatResult::Unsat => Outcome::Equivalent,
                    _ => Outcome::Violation { pipeline: pipeline.to_string(), model },
                }
            } else {
                Outcome::Violation { pipeline: pipeline.to_string(), model }
            }
        }
    }
}

/// `Then(Tactic("simplify"), Tactic("smt"))`, as a `Solver`, with the
/// configured timeout applied so a pathological formula aborts the
/// current check instead of hanging indefinitely.
fn tactic_solver<'ctx>(ctx: &'ctx Context, timeout_ms: u32) -> Solver<'ctx> {
    let tactic = Tactic::new(ctx, "simplify").and_then(&Tactic::new(ctx, "smt"));
    let solver = tactic.solver();
    let mut params = Params::new(ctx);
    params.set_u32("timeout", timeout_ms);
    solver.set_params(&params);
    solver
}

fn interp_error_to_outcome(err: InterpError) -> Outcome {
    match err {
        InterpError::Unsupported { construct } => Outcome::Unsupported { construct },
        other => Outcome::Failure { reason: other.to_string() },
    }
}
