//! The expression evaluator and statement executor: turns an IR package
//! plus a chosen pipeline into the single Z3 term that pipeline's
//! out/inout parameters evaluate to.

mod error;
mod eval;
mod exec;
mod types;

use z3::Context;

use p4tv_core::{SymbolicState, TypeRegistry, Value};
use p4tv_ir::{Direction, Package};

pub use error::InterpError;
pub use eval::eval;
pub use exec::Executor;
pub use types::{build_registry, fresh_value, sort_of};

/// Runs one pipeline of `package` from freshly-named symbolic inputs and
/// returns the final value of every `out`/`inout` parameter of its entry
/// control -- the term(s) the equivalence driver compares between two
/// programs.
pub fn run_pipeline<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    package: &Package,
    pipeline: &str,
) -> Result<Vec<(String, Value<'ctx>)>, InterpError> {
    let control_name = package
        .pipelines
        .get(pipeline)
        .ok_or_else(|| InterpError::UnknownAction(pipeline.to_string()))?;
    let control = package
        .controls
        .get(control_name)
        .ok_or_else(|| InterpError::UnknownAction(control_name.clone()))?;

    let mut state = SymbolicState::new(ctx);
    let mut output_names = Vec::new();
    for param in &control.params {
        let hint = format!("{pipeline}.{}", param.name);
        let fresh = fresh_value(ctx, reg, &param.ty, &hint)?;
        state.declare(param.name.clone(), fresh);
        if matches!(param.direction, Direction::Out | Direction::InOut) {
            output_names.push(param.name.clone());
        }
    }

    let executor = Executor::new(ctx, reg, package);
    executor.run_pipeline(&mut state, control_name)?;

    output_names
        .into_iter()
        .map(|name| {
            let value = state.get(&name)?.clone();
            Ok((name, value))
        })
        .collect()
}
