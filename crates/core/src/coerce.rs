use std::cmp::Ordering;

use z3::ast::{Ast, Bool, BV};
use z3::Context;

use crate::error::CoreError;
use crate::value::Value;

/// Width-normalizes `value` to a bit-vector of `width` bits: zero-extends
/// from a smaller width, truncates the high bits from a larger one (keeps
/// the low `width` bits), and maps `true`/`false` to `1`/`0` for a boolean
/// operand.
pub fn cast_bits<'ctx>(
    ctx: &'ctx Context,
    value: &Value<'ctx>,
    width: u32,
) -> Result<BV<'ctx>, CoreError> {
    match value {
        Value::Bool(b) => {
            Ok(b.ite(&BV::from_u64(ctx, 1, width), &BV::from_u64(ctx, 0, width)))
        }
        Value::Bit(bv) => {
            let current = bv.get_size();
            Ok(match current.cmp(&width) {
                Ordering::Less => bv.zero_ext(width - current),
                Ordering::Greater => bv.extract(width - 1, 0),
                Ordering::Equal => bv.clone(),
            })
        }
        Value::Enum(e) => cast_bits(ctx, &Value::Bit(e.repr.clone()), width),
        other => Err(CoreError::ShapeMismatch { expected: "bit or bool", found: other.shape() }),
    }
}

/// Coerces `value` to a boolean: a bit-vector compares unequal to zero, a
/// boolean passes through unchanged.
pub fn cast_bool<'ctx>(ctx: &'ctx Context, value: &Value<'ctx>) -> Result<Bool<'ctx>, CoreError> {
    match value {
        Value::Bool(b) => Ok(b.clone()),
        Value::Bit(bv) => {
            let zero = BV::from_u64(ctx, 0, bv.get_size());
            Ok(bv._eq(&zero).not())
        }
        other => Err(CoreError::ShapeMismatch { expected: "bit or bool", found: other.shape() }),
    }
}

/// Aligns two bit-vector operands to the wider of their two widths by
/// zero-extending the narrower one, before invoking the matching Z3
/// operator.
pub fn align_widths<'ctx>(lhs: BV<'ctx>, rhs: BV<'ctx>) -> (BV<'ctx>, BV<'ctx>) {
    let (lw, rw) = (lhs.get_size(), rhs.get_size());
    match lw.cmp(&rw) {
        Ordering::Less => (lhs.zero_ext(rw - lw), rhs),
        Ordering::Greater => (lhs, rhs.zero_ext(lw - rw)),
        Ordering::Equal => (lhs, rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::Config;

    #[test]
    fn truncation_keeps_low_bits() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let wide = BV::from_u64(&ctx, 0b1010_1100, 8);
        let narrowed = cast_bits(&ctx, &Value::Bit(wide), 4).unwrap();
        assert_eq!(narrowed.get_size(), 4);
    }

    #[test]
    fn zero_extension_widens() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let narrow = BV::from_u64(&ctx, 3, 4);
        let widened = cast_bits(&ctx, &Value::Bit(narrow), 8).unwrap();
        assert_eq!(widened.get_size(), 8);
    }
}
