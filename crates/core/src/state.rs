use std::collections::{BTreeMap, VecDeque};

use z3::ast::BV;
use z3::Context;

use crate::error::CoreError;
use crate::value::Value;
use p4tv_ir::Node;

pub type Env<'ctx> = BTreeMap<String, Value<'ctx>>;

/// The full symbolic machine state: variable bindings plus the
/// continuation chain of pending statements, with a checkpoint stack so
/// the statement executor can evaluate both arms of a branch from the same
/// starting point and merge the results with `Bool::ite` rather than with
/// native recursion.
pub struct SymbolicState<'ctx> {
    ctx: &'ctx Context,
    env: Env<'ctx>,
    chain: VecDeque<Node>,
    checkpoints: Vec<(Env<'ctx>, VecDeque<Node>)>,
}

impl<'ctx> SymbolicState<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        SymbolicState { ctx, env: BTreeMap::new(), chain: VecDeque::new(), checkpoints: Vec::new() }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    pub fn declare(&mut self, name: impl Into<String>, value: Value<'ctx>) {
        self.env.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Value<'ctx>, CoreError> {
        self.env.get(name).ok_or_else(|| CoreError::UnboundName(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Value<'ctx>, CoreError> {
        self.env.get_mut(name).ok_or_else(|| CoreError::UnboundName(name.to_string()))
    }

    /// Assigns to a (possibly dotted) member path, e.g. `hdr.eth.dst_addr`.
    /// Resolves every path segment but the last on a mutable borrow chain,
    /// then writes the final segment.
    pub fn assign_path(&mut self, path: &[&str], value: Value<'ctx>) -> Result<(), CoreError> {
        match path {
            [] => Err(CoreError::UnboundName(String::new())),
            [name] => {
                *self.get_mut(name)? = value;
                Ok(())
            }
            [head, rest @ ..] => {
                let mut target = self.get_mut(head)?.as_struct_mut()?;
                for segment in &rest[..rest.len() - 1] {
                    target = target.field_mut(segment)?.as_struct_mut()?;
                }
                target.set_field(rest[rest.len() - 1], value)
            }
        }
    }

    /// Like `resolve_path`, but yields a mutable borrow of the final segment
    /// -- used by callers that mutate a header or stack in place rather than
    /// replacing it wholesale (`setValid`, `push_front`, `.next`, ...).
    pub fn resolve_path_mut(&mut self, path: &[&str]) -> Result<&mut Value<'ctx>, CoreError> {
        match path {
            [] => Err(CoreError::UnboundName(String::new())),
            [name] => self.get_mut(name),
            [head, rest @ ..] => {
                let mut target = self.get_mut(head)?.as_struct_mut()?;
                for segment in &rest[..rest.len() - 1] {
                    target = target.field_mut(segment)?.as_struct_mut()?;
                }
                target.field_mut(rest[rest.len() - 1])
            }
        }
    }

    pub fn resolve_path(&self, path: &[&str]) -> Result<&Value<'ctx>, CoreError> {
        match path {
            [] => Err(CoreError::UnboundName(String::new())),
            [name] => self.get(name),
            [head, rest @ ..] => {
                let mut current = self.get(head)?.as_struct()?;
                for segment in &rest[..rest.len() - 1] {
                    current = current.field(segment)?.as_struct()?;
                }
                current.field(rest[rest.len() - 1])
            }
        }
    }

    /// Rewrites bits `[hi:lo]` of the bit-vector bound to `name`, leaving
    /// the rest untouched.
    pub fn slice_assign(&mut self, name: &str, hi: u32, lo: u32, new_bits: &BV<'ctx>) -> Result<(), CoreError> {
        let current = self.get(name)?.as_bit()?.clone();
        let width = current.get_size();
        let rebuilt = slice_assign_bits(&current, width, hi, lo, new_bits);
        *self.get_mut(name)? = Value::Bit(rebuilt);
        Ok(())
    }

    /// Replaces the continuation chain wholesale -- used when the executor
    /// drains a branch's own statement list in isolation before merging it
    /// back into the caller's chain.
    pub fn replace_chain(&mut self, statements: Vec<Node>) {
        self.chain = VecDeque::from(statements);
    }

    pub fn env_snapshot(&self) -> Env<'ctx> {
        self.env.clone()
    }

    pub fn restore_env(&mut self, env: Env<'ctx>) {
        self.env = env;
    }

    pub fn push_front(&mut self, statements: impl IntoIterator<Item = Node>) {
        for (offset, stmt) in statements.into_iter().enumerate() {
            self.chain.insert(offset, stmt);
        }
    }

    pub fn push_back(&mut self, statement: Node) {
        self.chain.push_back(statement);
    }

    pub fn next_statement(&mut self) -> Option<Node> {
        self.chain.pop_front()
    }

    /// `exit;` -- drops every remaining pending statement.
    pub fn clear_chain(&mut self) {
        self.chain.clear();
    }

    pub fn checkpoint(&mut self) {
        self.checkpoints.push((self.env.clone(), self.chain.clone()));
    }

    pub fn restore(&mut self) {
        if let Some((env, chain)) = self.checkpoints.pop() {
            self.env = env;
            self.chain = chain;
        }
    }

    pub fn discard_checkpoint(&mut self) {
        self.checkpoints.pop();
    }

    pub fn delete(&mut self, name: &str) {
        self.env.remove(name);
    }

    pub fn env(&self) -> &Env<'ctx> {
        &self.env
    }
}

/// Public entry point for rewriting a sub-range of bits, reused by the
/// interpreter when the lvalue being sliced is a nested member rather than
/// a bare name (`state.slice_assign` only handles the bare-name case).
pub fn rebuild_slice<'ctx>(current: &BV<'ctx>, hi: u32, lo: u32, new_bits: &BV<'ctx>) -> BV<'ctx> {
    slice_assign_bits(current, current.get_size(), hi, lo, new_bits)
}

fn slice_assign_bits<'ctx>(
    current: &BV<'ctx>,
    width: u32,
    hi: u32,
    lo: u32,
    new_bits: &BV<'ctx>,
) -> BV<'ctx> {
    let target_width = hi - lo + 1;
    let new_slice = match new_bits.get_size().cmp(&target_width) {
        std::cmp::Ordering::Less => new_bits.zero_ext(target_width - new_bits.get_size()),
        std::cmp::Ordering::Greater => new_bits.extract(target_width - 1, 0),
        std::cmp::Ordering::Equal => new_bits.clone(),
    };
    let high = if hi + 1 < width { Some(current.extract(width - 1, hi + 1)) } else { None };
    let low = if lo > 0 { Some(current.extract(lo - 1, 0)) } else { None };
    match (high, low) {
        (Some(h), Some(l)) => h.concat(&new_slice).concat(&l),
        (Some(h), None) => h.concat(&new_slice),
        (None, Some(l)) => new_slice.concat(&l),
        (None, None) => new_slice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    #[test]
    fn slice_assign_preserves_surrounding_bits() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let original = BV::from_u64(&ctx, 0b1111_0000, 8);
        let patch = BV::from_u64(&ctx, 0b10, 2);
        let rebuilt = slice_assign_bits(&original, 8, 5, 4, &patch);
        assert_eq!(rebuilt.get_size(), 8);
    }

    #[test]
    fn unbound_name_errors() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let state = SymbolicState::new(&ctx);
        assert!(matches!(state.get("nope"), Err(CoreError::UnboundName(_))));
    }
}
