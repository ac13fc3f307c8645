use z3::ast::{Ast, Bool, BV};
use z3::Context;

use p4tv_core::{state::rebuild_slice, EnumValue, Env, StructValue, SymbolicState, TypeRegistry, Value};
use p4tv_ir::{ActionRef, Direction, Node, Package};

use crate::error::InterpError;
use crate::eval::eval;
use crate::types;

/// Executes statement nodes against a symbolic state. Holds no mutable
/// state of its own -- every intermediate value lives on `SymbolicState`,
/// so one `Executor` can drive both programs under comparison.
pub struct Executor<'ctx, 'r, 'p> {
    ctx: &'ctx Context,
    reg: &'r TypeRegistry<'ctx>,
    package: &'p Package,
}

impl<'ctx, 'r, 'p> Executor<'ctx, 'r, 'p> {
    pub fn new(ctx: &'ctx Context, reg: &'r TypeRegistry<'ctx>, package: &'p Package) -> Self {
        Executor { ctx, reg, package }
    }

    /// Runs a control/parser's body from a freshly-declared parameter set.
    pub fn run_pipeline(&self, state: &mut SymbolicState<'ctx>, control_name: &str) -> Result<(), InterpError> {
        let control = self
            .package
            .controls
            .get(control_name)
            .ok_or_else(|| InterpError::UnknownAction(control_name.to_string()))?;
        for local in &control.locals {
            self.exec_stmt(state, local)?;
        }
        let stmts = block_statements(&control.body)?;
        self.run_block(state, &stmts)
    }

    /// Drains a local statement list to completion, independent of
    /// whatever chain the caller had pending -- callers checkpoint before
    /// calling this and restore afterward if they need to fork.
    pub fn run_block(&self, state: &mut SymbolicState<'ctx>, statements: &[Node]) -> Result<(), InterpError> {
        state.replace_chain(statements.to_vec());
        while let Some(stmt) = state.next_statement() {
            self.exec_stmt(state, &stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&self, state: &mut SymbolicState<'ctx>, stmt: &Node) -> Result<(), InterpError> {
        match stmt {
            Node::Block { statements } => {
                state.push_front(statements.clone());
                Ok(())
            }
            Node::Declare { name, ty, init } => {
                let value = match init {
                    Some(expr) => eval(self.ctx, self.reg, state, expr)?,
                    None => {
                        let sort = types::sort_of(self.ctx, self.reg, ty)?;
                        Value::undefined(self.ctx, &sort)
                    }
                };
                state.declare(name.clone(), value);
                Ok(())
            }
            Node::Assign { lval, rval } if matches!(rval.as_ref(), Node::List { .. }) => {
                let elements = match rval.as_ref() {
                    Node::List { elements } => elements,
                    _ => unreachable!(),
                };
                let path = member_path(lval)?;
                let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(eval(self.ctx, self.reg, state, element)?);
                }
                let mut target = state.resolve_path(&path_refs)?.as_struct()?.clone();
                let field_names: Vec<String> = target.fields().map(|(name, _)| name.clone()).collect();
                for (name, value) in field_names.into_iter().zip(values) {
                    target.set_field(&name, value)?;
                }
                if target.is_valid().is_some() {
                    target.set_validity(true);
                }
                self.guarded_assign(state, &path, Value::Struct(target))
            }
            Node::Assign { lval, rval } => {
                let path = member_path(lval)?;
                let new_val = eval(self.ctx, self.reg, state, rval)?;
                self.guarded_assign(state, &path, new_val)
            }
            Node::SliceAssign { lval, rval, hi, lo } => {
                let path = member_path(lval)?;
                let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
                let current = state.resolve_path(&path_refs)?.as_bit()?.clone();
                let new_bits = eval(self.ctx, self.reg, state, rval)?;
                let rebuilt = rebuild_slice(&current, *hi, *lo, new_bits.as_bit()?);
                self.guarded_assign(state, &path, Value::Bit(rebuilt))
            }
            Node::If { cond, then_block, else_block } => {
                self.exec_if(state, cond, then_block, else_block.as_deref())
            }
            Node::Switch { table, cases, default } => self.exec_switch(state, table, cases, default),
            Node::MethodCall { callee, method, args } if method == "apply" && args.is_empty() => {
                match callee.as_ref() {
                    Node::Name(table_name) => {
                        self.apply_table(state, table_name)?;
                        Ok(())
                    }
                    other => Err(InterpError::Unsupported {
                        construct: format!("apply() callee: {other:?}"),
                    }),
                }
            }
            Node::MethodCall { callee, method, args }
                if (method == "setValid" || method == "setInvalid") && args.is_empty() =>
            {
                let path = member_path(callee)?;
                let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
                let target = state.resolve_path_mut(&path_refs)?.as_struct_mut()?;
                if method == "setValid" {
                    target.activate();
                } else {
                    target.deactivate();
                }
                Ok(())
            }
            Node::MethodCall { callee, method, args }
                if (method == "push_front" || method == "pop_front") && args.len() == 1 =>
            {
                let count_val = eval(self.ctx, self.reg, state, &args[0])?;
                let count = count_val.as_bit()?.as_u64().ok_or_else(|| InterpError::Unsupported {
                    construct: format!("{method} with a non-constant count"),
                })? as u32;
                let path = member_path(callee)?;
                let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
                let stack = state.resolve_path_mut(&path_refs)?.as_stack_mut()?;
                if method == "push_front" {
                    stack.push_front(count);
                } else {
                    stack.pop_front(count);
                }
                Ok(())
            }
            Node::MethodCall { method, .. } => Err(InterpError::Unsupported {
                construct: format!("extern method call as statement: {method}"),
            }),
            Node::Exit => {
                state.declare("__exited".to_string(), Value::Bool(Bool::from_bool(self.ctx, true)));
                Ok(())
            }
            other => Err(InterpError::Unsupported { construct: format!("{other:?} in statement position") }),
        }
    }

    fn exec_if(
        &self,
        state: &mut SymbolicState<'ctx>,
        cond: &Node,
        then_block: &Node,
        else_block: Option<&Node>,
    ) -> Result<(), InterpError> {
        let c = p4tv_core::coerce::cast_bool(self.ctx, &eval(self.ctx, self.reg, state, cond)?)?;

        let then_stmts = block_statements(then_block)?;
        state.checkpoint();
        self.run_block(state, &then_stmts)?;
        let then_env = state.env_snapshot();
        state.restore();

        let else_env = match else_block {
            Some(eb) => {
                let else_stmts = block_statements(eb)?;
                state.checkpoint();
                self.run_block(state, &else_stmts)?;
                let snap = state.env_snapshot();
                state.restore();
                snap
            }
            None => state.env_snapshot(),
        };

        let merged = merge_envs(self.ctx, &c, &then_env, &else_env)?;
        state.restore_env(merged);
        Ok(())
    }

    fn exec_switch(
        &self,
        state: &mut SymbolicState<'ctx>,
        table: &str,
        cases: &[(String, Node)],
        default: &Node,
    ) -> Result<(), InterpError> {
        let selector = self.apply_table(state, table)?;
        let table_def = self
            .package
            .tables
            .get(table)
            .ok_or_else(|| InterpError::UnknownTable(table.to_string()))?;

        let default_stmts = block_statements(default)?;
        state.checkpoint();
        self.run_block(state, &default_stmts)?;
        let mut merged_env = state.env_snapshot();
        state.restore();

        for (label, case_body) in cases.iter().rev() {
            let id = table_def
                .actions
                .iter()
                .position(|a| &a.name == label)
                .ok_or_else(|| InterpError::UnknownAction(label.clone()))?;
            let cond = selector._eq(&BV::from_u64(self.ctx, id as u64, selector.get_size()));
            let case_stmts = block_statements(case_body)?;
            state.checkpoint();
            self.run_block(state, &case_stmts)?;
            let case_env = state.env_snapshot();
            state.restore();
            merged_env = merge_envs(self.ctx, &cond, &case_env, &merged_env)?;
        }

        state.restore_env(merged_env);
        Ok(())
    }

    /// The table-apply algorithm: evaluates every action in isolation from
    /// a common checkpoint, builds the nested-`If` action-selector chain,
    /// then wraps it with a second nested-`If` chain over the const
    /// entries (which take priority over the selector dispatch), and
    /// finally installs the merged environment. Returns the fresh
    /// per-apply action selector so a `switch` on `table.apply()` can
    /// dispatch on it.
    fn apply_table(&self, state: &mut SymbolicState<'ctx>, name: &str) -> Result<BV<'ctx>, InterpError> {
        let table = self
            .package
            .tables
            .get(name)
            .ok_or_else(|| InterpError::UnknownTable(name.to_string()))?;

        let action_count = table.actions.len().max(1);
        let selector_width = bits_needed(action_count as u32);
        let selector = BV::fresh_const(self.ctx, &format!("{name}_action"), selector_width);

        let mut env_by_action = Vec::with_capacity(table.actions.len());
        for action_ref in &table.actions {
            state.checkpoint();
            self.call_action(state, action_ref)?;
            env_by_action.push(state.env_snapshot());
            state.restore();
        }

        state.checkpoint();
        if let Some(default) = &table.default {
            self.call_action(state, default)?;
        }
        let mut merged_env = state.env_snapshot();
        state.restore();

        for (id, branch_env) in env_by_action.into_iter().enumerate().rev() {
            let cond = selector._eq(&BV::from_u64(self.ctx, id as u64, selector_width));
            merged_env = merge_envs(self.ctx, &cond, &branch_env, &merged_env)?;
        }

        for entry in table.const_entries.iter().rev() {
            let mut key_eqs = Vec::with_capacity(entry.keys.len());
            for (key_expr, literal) in table.keys.iter().zip(entry.keys.iter()) {
                let key_val = eval(self.ctx, self.reg, state, key_expr)?;
                let lit_val = eval(self.ctx, self.reg, state, literal)?;
                key_eqs.push(values_eq(self.ctx, &key_val, &lit_val)?);
            }
            let refs: Vec<&Bool<'ctx>> = key_eqs.iter().collect();
            let cond = Bool::and(self.ctx, &refs);

            state.checkpoint();
            self.call_action(state, &entry.action)?;
            let entry_env = state.env_snapshot();
            state.restore();

            merged_env = merge_envs(self.ctx, &cond, &entry_env, &merged_env)?;
        }

        state.restore_env(merged_env);
        Ok(selector)
    }

    fn call_action(&self, state: &mut SymbolicState<'ctx>, action_ref: &ActionRef) -> Result<(), InterpError> {
        let action = self
            .package
            .actions
            .get(&action_ref.name)
            .ok_or_else(|| InterpError::UnknownAction(action_ref.name.clone()))?;
        self.call_callable(state, &action.params, &action.body, &action_ref.args)
    }

    /// The in/inout/out calling convention: `in` params get a snapshot of
    /// the argument's value, `inout`/`out` params get a fresh binding that
    /// is written back to the argument's lvalue after the body runs. Any
    /// name shadowed by a parameter is saved before the call and restored
    /// after, matching the source's `var_buffer`.
    fn call_callable(
        &self,
        state: &mut SymbolicState<'ctx>,
        params: &[p4tv_ir::Param],
        body: &Node,
        args: &[Node],
    ) -> Result<(), InterpError> {
        let mut save_buffer = Vec::with_capacity(params.len());
        let mut writebacks: Vec<(Vec<String>, String)> = Vec::new();

        for (param, arg) in params.iter().zip(args.iter()) {
            save_buffer.push((param.name.clone(), state.env().get(&param.name).cloned()));

            match param.direction {
                Direction::In => {
                    let v = eval(self.ctx, self.reg, state, arg)?;
                    state.declare(param.name.clone(), v);
                }
                Direction::InOut => {
                    let path = member_path(arg)?;
                    let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
                    let v = state.resolve_path(&path_refs)?.clone();
                    state.declare(param.name.clone(), v);
                    writebacks.push((path, param.name.clone()));
                }
                Direction::Out => {
                    let sort = types::sort_of(self.ctx, self.reg, &param.ty)?;
                    state.declare(param.name.clone(), Value::undefined(self.ctx, &sort));
                    writebacks.push((member_path(arg)?, param.name.clone()));
                }
            }
        }

        let body_stmts = block_statements(body)?;
        self.run_block(state, &body_stmts)?;

        for (path, param_name) in &writebacks {
            let final_val = state.get(param_name)?.clone();
            let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
            state.assign_path(&path_refs, final_val)?;
        }

        for (name, saved) in save_buffer.into_iter().rev() {
            match saved {
                Some(v) => state.declare(name, v),
                None => state.delete(&name),
            }
        }
        Ok(())
    }

    fn guarded_assign(
        &self,
        state: &mut SymbolicState<'ctx>,
        path: &[String],
        new_val: Value<'ctx>,
    ) -> Result<(), InterpError> {
        let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
        let merged = match state.get("__exited") {
            Ok(v) => {
                let exited = v.as_bool()?.clone();
                let old = state.resolve_path(&path_refs)?.clone();
                merge_values(self.ctx, &exited, &old, &new_val)?
            }
            Err(_) => new_val,
        };
        state.assign_path(&path_refs, merged)?;
        Ok(())
    }
}

fn bits_needed(n: u32) -> u32 {
    if n <= 1 {
        1
    } else {
        (u32::BITS - (n - 1).leading_zeros()).max(1)
    }
}

pub(crate) fn member_path(node: &Node) -> Result<Vec<String>, InterpError> {
    match node {
        Node::Name(n) => Ok(vec![n.clone()]),
        Node::Member { lval, member } => {
            let mut path = member_path(lval)?;
            path.push(member.clone());
            Ok(path)
        }
        other => Err(InterpError::Unsupported { construct: format!("non-lvalue target: {other:?}") }),
    }
}

fn block_statements(node: &Node) -> Result<Vec<Node>, InterpError> {
    match node {
        Node::Block { statements } => Ok(statements.clone()),
        other => Ok(vec![other.clone()]),
    }
}

fn values_eq<'ctx>(ctx: &'ctx Context, a: &Value<'ctx>, b: &Value<'ctx>) -> Result<Bool<'ctx>, InterpError> {
    match (a, b) {
        (Value::Bit(x), Value::Bit(y)) => {
            let (x, y) = p4tv_core::coerce::align_widths(x.clone(), y.clone());
            Ok(x._eq(&y))
        }
        (Value::Bool(x), Value::Bool(y)) => Ok(x._eq(y)),
        (Value::Enum(x), Value::Enum(y)) => Ok(x.repr._eq(&y.repr)),
        _ => Err(InterpError::TypeMismatch { expected: a.shape(), found: b.shape() }),
    }
}

/// Merges two environments produced by executing both arms of a branch
/// from the same starting point: every binding present in either becomes
/// `ite(cond, then_value, else_value)`. A binding declared in only one arm
/// (a block-local declaration) passes through unmerged -- an accepted
/// approximation of P4 block scoping, see DESIGN.md.
fn merge_envs<'ctx>(
    ctx: &'ctx Context,
    cond: &Bool<'ctx>,
    then_env: &Env<'ctx>,
    else_env: &Env<'ctx>,
) -> Result<Env<'ctx>, InterpError> {
    let mut keys: Vec<&String> = then_env.keys().chain(else_env.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut merged = Env::new();
    for key in keys {
        let value = match (then_env.get(key), else_env.get(key)) {
            (Some(t), Some(e)) => merge_values(ctx, cond, t, e)?,
            (Some(t), None) => t.clone(),
            (None, Some(e)) => e.clone(),
            (None, None) => unreachable!(),
        };
        merged.insert(key.clone(), value);
    }
    Ok(merged)
}

fn merge_values<'ctx>(
    ctx: &'ctx Context,
    cond: &Bool<'ctx>,
    then_v: &Value<'ctx>,
    else_v: &Value<'ctx>,
) -> Result<Value<'ctx>, InterpError> {
    match (then_v, else_v) {
        (Value::Bit(t), Value::Bit(e)) => {
            let (t, e) = p4tv_core::coerce::align_widths(t.clone(), e.clone());
            Ok(Value::Bit(cond.ite(&t, &e)))
        }
        (Value::Bool(t), Value::Bool(e)) => Ok(Value::Bool(cond.ite(t, e))),
        (Value::Enum(t), Value::Enum(e)) if t.sort_name == e.sort_name => Ok(Value::Enum(EnumValue {
            sort_name: t.sort_name.clone(),
            serializable: t.serializable,
            width: t.width,
            repr: cond.ite(&t.repr, &e.repr),
        })),
        (Value::Struct(t), Value::Struct(e)) if t.sort_name == e.sort_name => {
            Ok(Value::Struct(merge_structs(ctx, cond, t, e)?))
        }
        (Value::Stack(t), Value::Stack(e)) if t.header_sort == e.header_sort => {
            let mut headers = Vec::with_capacity(t.headers.len());
            for (th, eh) in t.headers.iter().zip(e.headers.iter()) {
                headers.push(merge_structs(ctx, cond, th, eh)?);
            }
            let mut stack = p4tv_core::StackValue::new(ctx, t.header_sort.clone(), headers);
            // `next_index` is a host-level cursor; when the two branches
            // disagree we approximate by keeping the then-branch's value.
            stack.next_index = t.next_index;
            Ok(Value::Stack(stack))
        }
        (Value::Undefined(_), other) | (other, Value::Undefined(_)) => Ok(other.clone()),
        _ if then_v.shape() == else_v.shape() => Ok(then_v.clone()),
        _ => Err(InterpError::TypeMismatch { expected: then_v.shape(), found: else_v.shape() }),
    }
}

fn merge_structs<'ctx>(
    ctx: &'ctx Context,
    cond: &Bool<'ctx>,
    t: &StructValue<'ctx>,
    e: &StructValue<'ctx>,
) -> Result<StructValue<'ctx>, InterpError> {
    let mut fields = Vec::new();
    for (name, tv) in t.fields() {
        let ev = e.field(name)?;
        fields.push((name.clone(), merge_values(ctx, cond, tv, ev)?));
    }
    let valid = match (t.is_valid(), e.is_valid()) {
        (Some(tv), Some(ev)) => Some(cond.ite(tv, ev)),
        _ => None,
    };
    Ok(StructValue::new(ctx, t.kind, t.sort_name.clone(), fields, valid))
}
