use z3::ast::{Ast, Bool, BV};
use z3::Context;

use p4tv_core::{coerce, EnumValue, SymbolicState, TypeRegistry, Value};
use p4tv_ir::{BinOp, Node, UnOp};

use crate::error::InterpError;
use crate::exec::member_path;

/// Evaluates an expression node against the current symbolic state,
/// producing the `Value` it denotes. `state` is `&mut` only because reading
/// a header stack's `.next` advances its cursor as a side effect of the
/// read -- every other case only reads bindings.
pub fn eval<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    state: &mut SymbolicState<'ctx>,
    node: &Node,
) -> Result<Value<'ctx>, InterpError> {
    match node {
        Node::Name(name) => Ok(state.get(name)?.clone()),
        Node::BoolLiteral(b) => Ok(Value::Bool(Bool::from_bool(ctx, *b))),
        Node::Literal { width, value } => Ok(Value::Bit(BV::from_u64(ctx, *value, *width))),
        Node::Member { lval, member } => eval_member(ctx, reg, state, lval, member),
        Node::Slice { value, hi, lo } => {
            let v = eval(ctx, reg, state, value)?;
            Ok(Value::Bit(v.as_bit()?.extract(*hi, *lo)))
        }
        Node::BinaryOp { op, lhs, rhs } => eval_binary(ctx, reg, state, *op, lhs, rhs),
        Node::UnaryOp { op, operand } => eval_unary(ctx, reg, state, *op, operand),
        Node::Cast { operand, width } => {
            let v = eval(ctx, reg, state, operand)?;
            Ok(Value::Bit(coerce::cast_bits(ctx, &v, *width)?))
        }
        Node::Mux { cond, then_branch, else_branch } => {
            eval_mux(ctx, reg, state, cond, then_branch, else_branch)
        }
        Node::Concat { lhs, rhs } => {
            let l = eval(ctx, reg, state, lhs)?;
            let r = eval(ctx, reg, state, rhs)?;
            Ok(Value::Bit(l.as_bit()?.concat(r.as_bit()?)))
        }
        Node::MethodCall { callee, method, args } if method == "isValid" && args.is_empty() => {
            let base = eval(ctx, reg, state, callee)?;
            base.as_struct()?
                .is_valid()
                .cloned()
                .map(Value::Bool)
                .ok_or(InterpError::TypeMismatch { expected: "header or header-union", found: "struct" })
        }
        Node::MethodCall { callee, method, args } if method == "next" && args.is_empty() => {
            let path = member_path(callee)?;
            let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
            let stack = state.resolve_path_mut(&path_refs)?.as_stack_mut()?;
            Ok(Value::Struct(stack.next()?))
        }
        Node::MethodCall { callee, method, args } if method == "last" && args.is_empty() => {
            let path = member_path(callee)?;
            let path_refs: Vec<&str> = path.iter().map(String::as_str).collect();
            let stack = state.resolve_path(&path_refs)?.as_stack()?;
            Ok(Value::Struct(stack.last()?))
        }
        Node::MethodCall { method, .. } => Err(InterpError::Unsupported {
            construct: format!("extern method call in expression position: {method}"),
        }),
        other => Err(InterpError::Unsupported { construct: format!("{other:?} in expression position") }),
    }
}

fn eval_member<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    state: &mut SymbolicState<'ctx>,
    lval: &Node,
    member: &str,
) -> Result<Value<'ctx>, InterpError> {
    let base = eval(ctx, reg, state, lval)?;
    match &base {
        Value::Struct(s) => Ok(s.field(member)?.clone()),
        Value::Stack(s) => match member {
            "nextIndex" => Ok(Value::Bit(s.next_index_bv())),
            "lastIndex" => Ok(Value::Bit(s.last_index_bv())),
            other => Err(InterpError::Unsupported { construct: format!("header stack member {other}") }),
        },
        other => Err(InterpError::TypeMismatch { expected: "struct or stack", found: other.shape() }),
    }
}

fn eval_binary<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    state: &mut SymbolicState<'ctx>,
    op: BinOp,
    lhs: &Node,
    rhs: &Node,
) -> Result<Value<'ctx>, InterpError> {
    let l = eval(ctx, reg, state, lhs)?;
    let r = eval(ctx, reg, state, rhs)?;

    if matches!(op, BinOp::LogAnd | BinOp::LogOr) {
        let lb = coerce::cast_bool(ctx, &l)?;
        let rb = coerce::cast_bool(ctx, &r)?;
        return Ok(Value::Bool(match op {
            BinOp::LogAnd => Bool::and(ctx, &[&lb, &rb]),
            BinOp::LogOr => Bool::or(ctx, &[&lb, &rb]),
            _ => unreachable!(),
        }));
    }

    if matches!(op, BinOp::Eq | BinOp::Ne) {
        return eval_equality(ctx, op, &l, &r);
    }

    let lbv = l.as_bit().map_err(|_| InterpError::TypeMismatch {
        expected: "bit",
        found: l.shape(),
    })?;
    let rbv = r.as_bit().map_err(|_| InterpError::TypeMismatch {
        expected: "bit",
        found: r.shape(),
    })?;
    let (lbv, rbv) = coerce::align_widths(lbv.clone(), rbv.clone());

    let bool_result = |b: Bool<'ctx>| Ok(Value::Bool(b));
    match op {
        BinOp::Add => Ok(Value::Bit(lbv.bvadd(&rbv))),
        BinOp::Sub => Ok(Value::Bit(lbv.bvsub(&rbv))),
        BinOp::Mul => Ok(Value::Bit(lbv.bvmul(&rbv))),
        BinOp::Div => Ok(Value::Bit(lbv.bvudiv(&rbv))),
        BinOp::Mod => Ok(Value::Bit(lbv.bvurem(&rbv))),
        BinOp::BitAnd => Ok(Value::Bit(lbv.bvand(&rbv))),
        BinOp::BitOr => Ok(Value::Bit(lbv.bvor(&rbv))),
        BinOp::BitXor => Ok(Value::Bit(lbv.bvxor(&rbv))),
        BinOp::Shl => Ok(Value::Bit(lbv.bvshl(&rbv))),
        BinOp::Shr => Ok(Value::Bit(lbv.bvlshr(&rbv))),
        BinOp::Lt => bool_result(lbv.bvult(&rbv)),
        BinOp::Le => bool_result(lbv.bvule(&rbv)),
        BinOp::Ge => bool_result(lbv.bvuge(&rbv)),
        BinOp::Gt => bool_result(lbv.bvugt(&rbv)),
        BinOp::Eq | BinOp::Ne | BinOp::LogAnd | BinOp::LogOr => unreachable!(),
    }
}

/// `Eq`/`Ne` need the enum-vs-foreign-sort special case before falling
/// through to ordinary term equality.
fn eval_equality<'ctx>(
    ctx: &'ctx Context,
    op: BinOp,
    l: &Value<'ctx>,
    r: &Value<'ctx>,
) -> Result<Value<'ctx>, InterpError> {
    let eq = match (l, r) {
        (Value::Enum(a), Value::Enum(b)) if a.sort_name == b.sort_name => a.repr._eq(&b.repr),
        (Value::Enum(_), Value::Enum(_)) | (Value::Enum(_), Value::Bit(_)) | (Value::Bit(_), Value::Enum(_)) => {
            // Comparison against a value of a foreign sort: the two terms
            // cannot be compared structurally, so the comparison resolves
            // to a fresh, unconstrained boolean rather than a real equality.
            Bool::fresh_const(ctx, "enum_cmp")
        }
        (Value::Bit(a), Value::Bit(b)) => {
            let (a, b) = coerce::align_widths(a.clone(), b.clone());
            a._eq(&b)
        }
        (Value::Bool(a), Value::Bool(b)) => a._eq(b),
        (Value::Bool(_), Value::Bit(_)) | (Value::Bit(_), Value::Bool(_)) => {
            let lb = coerce::cast_bool(ctx, l)?;
            let rb = coerce::cast_bool(ctx, r)?;
            lb._eq(&rb)
        }
        _ => {
            return Err(InterpError::TypeMismatch { expected: l.shape(), found: r.shape() });
        }
    };
    Ok(Value::Bool(if matches!(op, BinOp::Ne) { eq.not() } else { eq }))
}

fn eval_unary<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    state: &mut SymbolicState<'ctx>,
    op: UnOp,
    operand: &Node,
) -> Result<Value<'ctx>, InterpError> {
    let v = eval(ctx, reg, state, operand)?;
    match op {
        UnOp::Not => Ok(Value::Bool(coerce::cast_bool(ctx, &v)?.not())),
        UnOp::BitNot => Ok(Value::Bit(v.as_bit()?.bvnot())),
        UnOp::Neg => Ok(Value::Bit(v.as_bit()?.bvneg())),
        UnOp::Abs => {
            let bv = v.as_bit()?;
            let zero = BV::from_u64(ctx, 0, bv.get_size());
            Ok(Value::Bit(bv.bvslt(&zero).ite(&bv.bvneg(), bv)))
        }
    }
}

fn eval_mux<'ctx>(
    ctx: &'ctx Context,
    reg: &TypeRegistry<'ctx>,
    state: &mut SymbolicState<'ctx>,
    cond: &Node,
    then_branch: &Node,
    else_branch: &Node,
) -> Result<Value<'ctx>, InterpError> {
    let c = coerce::cast_bool(ctx, &eval(ctx, reg, state, cond)?)?;
    let then_v = eval(ctx, reg, state, then_branch)?;
    let else_v = eval(ctx, reg, state, else_branch)?;
    // Result sort follows the then-branch's sort.
    match &then_v {
        Value::Bool(_) => {
            let else_b = coerce::cast_bool(ctx, &else_v)?;
            Ok(Value::Bool(c.ite(then_v.as_bool()?, &else_b)))
        }
        Value::Bit(then_bv) => {
            let else_bv = coerce::cast_bits(ctx, &else_v, then_bv.get_size())?;
            Ok(Value::Bit(c.ite(then_bv, &else_bv)))
        }
        Value::Enum(EnumValue { repr, .. }) => {
            let else_bv = coerce::cast_bits(ctx, &else_v, repr.get_size())?;
            Ok(Value::Bit(c.ite(repr, &else_bv)))
        }
        other => Err(InterpError::Unsupported {
            construct: format!("ternary over {} values", other.shape()),
        }),
    }
}
