use z3::ast::{Ast, Bool, Dynamic, BV};
use z3::{Context, FuncDecl};

use crate::error::CoreError;
use crate::sort::{ComplexKind, FieldKind, TypeRegistry};

/// The tagged-union runtime value every name in a symbolic state is bound
/// to. A plain scalar is a thin wrapper over one Z3 term; a complex value
/// carries a live map of field values instead of one opaque term so that
/// member assignment does not require rebuilding an entire datatype term
/// on every write (serialization back to one term happens lazily, in
/// `to_term`).
#[derive(Clone)]
pub enum Value<'ctx> {
    Bit(BV<'ctx>),
    Bool(Bool<'ctx>),
    Struct(StructValue<'ctx>),
    Enum(EnumValue<'ctx>),
    Stack(StackValue<'ctx>),
    Extern(ExternValue<'ctx>),
    /// A `Declare` with no initializer, before its first write. Reading one
    /// is not an error -- the term itself is a fresh constant named
    /// `undefined`, which `p4tv-driver`'s undefined-behavior rewrite later
    /// recognizes by name and existentially discharges.
    Undefined(Dynamic<'ctx>),
}

impl<'ctx> Value<'ctx> {
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Bit(_) => "bit",
            Value::Bool(_) => "bool",
            Value::Struct(_) => "struct",
            Value::Enum(_) => "enum",
            Value::Stack(_) => "stack",
            Value::Extern(_) => "extern",
            Value::Undefined(_) => "undefined",
        }
    }

    pub fn undefined(ctx: &'ctx Context, sort: &z3::Sort<'ctx>) -> Self {
        Value::Undefined(Dynamic::new_const(ctx, "undefined", sort))
    }

    pub fn as_bit(&self) -> Result<&BV<'ctx>, CoreError> {
        match self {
            Value::Bit(bv) => Ok(bv),
            other => Err(CoreError::ShapeMismatch { expected: "bit", found: other.shape() }),
        }
    }

    pub fn as_bool(&self) -> Result<&Bool<'ctx>, CoreError> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(CoreError::ShapeMismatch { expected: "bool", found: other.shape() }),
        }
    }

    pub fn as_struct(&self) -> Result<&StructValue<'ctx>, CoreError> {
        match self {
            Value::Struct(s) => Ok(s),
            other => Err(CoreError::ShapeMismatch { expected: "struct", found: other.shape() }),
        }
    }

    pub fn as_struct_mut(&mut self) -> Result<&mut StructValue<'ctx>, CoreError> {
        match self {
            Value::Struct(s) => Ok(s),
            other => Err(CoreError::ShapeMismatch { expected: "struct", found: other.shape() }),
        }
    }

    pub fn as_stack(&self) -> Result<&StackValue<'ctx>, CoreError> {
        match self {
            Value::Stack(s) => Ok(s),
            other => Err(CoreError::ShapeMismatch { expected: "stack", found: other.shape() }),
        }
    }

    pub fn as_stack_mut(&mut self) -> Result<&mut StackValue<'ctx>, CoreError> {
        match self {
            Value::Stack(s) => Ok(s),
            other => Err(CoreError::ShapeMismatch { expected: "stack", found: other.shape() }),
        }
    }

    pub fn as_enum(&self) -> Result<&EnumValue<'ctx>, CoreError> {
        match self {
            Value::Enum(e) => Ok(e),
            other => Err(CoreError::ShapeMismatch { expected: "enum", found: other.shape() }),
        }
    }

    /// Serializes this value down to a single Z3 term, recursing into
    /// structured values. Scalars already are one term.
    pub fn to_term(&self, reg: &TypeRegistry<'ctx>) -> Result<Dynamic<'ctx>, CoreError> {
        match self {
            Value::Bit(bv) => Ok(Dynamic::from_ast(bv)),
            Value::Bool(b) => Ok(Dynamic::from_ast(b)),
            Value::Struct(s) => s.to_term(reg),
            Value::Enum(e) => Ok(Dynamic::from_ast(&e.repr)),
            Value::Stack(s) => s.to_term(reg),
            Value::Extern(_) => Err(CoreError::ShapeMismatch {
                expected: "serializable value",
                found: "extern",
            }),
            Value::Undefined(d) => Ok(d.clone()),
        }
    }
}

/// A struct, header, or header-union instance. Header-union variants are
/// represented the same way as header fields are -- a header-union with N
/// alternatives is a struct-shaped value whose fields happen to be
/// mutually-exclusive headers.
#[derive(Clone)]
pub struct StructValue<'ctx> {
    ctx: &'ctx Context,
    pub kind: ComplexKind,
    pub sort_name: String,
    fields: Vec<(String, Value<'ctx>)>,
    /// `Some` for Header/HeaderUnion; `None` for a plain Struct, which has
    /// no validity bit.
    pub valid: Option<Bool<'ctx>>,
}

impl<'ctx> StructValue<'ctx> {
    pub fn new(
        ctx: &'ctx Context,
        kind: ComplexKind,
        sort_name: impl Into<String>,
        fields: Vec<(String, Value<'ctx>)>,
        valid: Option<Bool<'ctx>>,
    ) -> Self {
        StructValue { ctx, kind, sort_name: sort_name.into(), fields, valid }
    }

    pub fn field(&self, name: &str) -> Result<&Value<'ctx>, CoreError> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| CoreError::NoSuchField {
                sort: self.sort_name.clone(),
                field: name.to_string(),
            })
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut Value<'ctx>, CoreError> {
        let sort_name = self.sort_name.clone();
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or(CoreError::NoSuchField { sort: sort_name, field: name.to_string() })
    }

    pub fn set_field(&mut self, name: &str, value: Value<'ctx>) -> Result<(), CoreError> {
        let slot = self
            .fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| CoreError::NoSuchField {
                sort: self.sort_name.clone(),
                field: name.to_string(),
            })?;
        slot.1 = value;
        Ok(())
    }

    pub fn fields(&self) -> impl Iterator<Item = &(String, Value<'ctx>)> {
        self.fields.iter()
    }

    /// `setValid()`/`setInvalid()` -- only meaningful for Header/HeaderUnion.
    pub fn set_validity(&mut self, valid: bool) {
        if self.valid.is_some() {
            self.valid = Some(Bool::from_bool(self.ctx, valid));
        }
    }

    pub fn is_valid(&self) -> Option<&Bool<'ctx>> {
        self.valid.as_ref()
    }

    /// Whether this value is *definitionally* invalid: `valid` is the
    /// concrete term `false`, not merely unsatisfiable-if-false. A syntactic
    /// check against the term, not a solver call.
    fn definitionally_invalid(&self) -> bool {
        matches!(self.valid.as_ref().and_then(Bool::as_bool), Some(false))
    }

    /// `setValid()`. Recurses into nested headers unconditionally; a scalar
    /// field is only reallocated to a fresh `undefined` constant if this
    /// header was definitionally invalid beforehand. Always leaves the
    /// header valid.
    pub fn activate(&mut self) {
        let was_invalid = self.definitionally_invalid();
        for (_, value) in self.fields.iter_mut() {
            match value {
                Value::Struct(s) => s.activate(),
                Value::Bit(bv) if was_invalid => *bv = BV::new_const(self.ctx, "undefined", bv.get_size()),
                Value::Bool(b) if was_invalid => *b = Bool::new_const(self.ctx, "undefined"),
                Value::Enum(e) if was_invalid => e.repr = BV::new_const(self.ctx, "undefined", e.width),
                _ => {}
            }
        }
        self.valid = Some(Bool::from_bool(self.ctx, true));
    }

    /// `setInvalid()`. Recurses into nested headers unconditionally and
    /// always reallocates every scalar field to a fresh `undefined`
    /// constant, regardless of the prior validity state.
    pub fn deactivate(&mut self) {
        for (_, value) in self.fields.iter_mut() {
            match value {
                Value::Struct(s) => s.deactivate(),
                Value::Bit(bv) => *bv = BV::new_const(self.ctx, "undefined", bv.get_size()),
                Value::Bool(b) => *b = Bool::new_const(self.ctx, "undefined"),
                Value::Enum(e) => e.repr = BV::new_const(self.ctx, "undefined", e.width),
                _ => {}
            }
        }
        self.valid = Some(Bool::from_bool(self.ctx, false));
    }

    pub fn to_term(&self, reg: &TypeRegistry<'ctx>) -> Result<Dynamic<'ctx>, CoreError> {
        let complex = reg.complex(&self.sort_name)?;
        let ctor: &FuncDecl = &complex.datatype.variants[0].constructor;
        let invalid = self.definitionally_invalid();

        let mut args: Vec<Dynamic<'ctx>> = Vec::with_capacity(self.fields.len());
        for (field_name, field_kind) in &complex.fields {
            let term = if invalid {
                reg.invalid_sentinel(field_kind)?
            } else {
                self.field(field_name)?.to_term(reg)?
            };
            args.push(term);
        }
        let arg_refs: Vec<&dyn Ast<'ctx>> = args.iter().map(|a| a as &dyn Ast<'ctx>).collect();
        Ok(ctor.apply(&arg_refs))
    }
}

/// A plain or serializable enum value. Both are represented the same way:
/// a current representative bit-vector plus enough metadata to compare
/// against a symbolic value of a foreign sort, which yields a fresh
/// symbolic constant rather than a concrete equality.
#[derive(Clone)]
pub struct EnumValue<'ctx> {
    pub sort_name: String,
    pub serializable: bool,
    pub width: u32,
    pub repr: BV<'ctx>,
}

impl<'ctx> EnumValue<'ctx> {
    pub fn variant_value(
        ctx: &'ctx Context,
        sort_name: &str,
        width: u32,
        serializable: bool,
        value: u64,
    ) -> Self {
        EnumValue {
            sort_name: sort_name.to_string(),
            serializable,
            width,
            repr: BV::from_u64(ctx, value, width),
        }
    }
}

/// A fixed-size array of headers with a P4 `nextIndex`/`lastIndex` cursor.
/// `last_index` is derived from `next_index` at read time rather than
/// tracked as a second field, since the source keeps only one cursor.
#[derive(Clone)]
pub struct StackValue<'ctx> {
    ctx: &'ctx Context,
    pub header_sort: String,
    pub size: u32,
    pub headers: Vec<StructValue<'ctx>>,
    pub next_index: u32,
}

impl<'ctx> StackValue<'ctx> {
    pub fn new(
        ctx: &'ctx Context,
        header_sort: impl Into<String>,
        headers: Vec<StructValue<'ctx>>,
    ) -> Self {
        let size = headers.len() as u32;
        StackValue { ctx, header_sort: header_sort.into(), size, headers, next_index: 0 }
    }

    pub fn get(&self, index: u32) -> Result<&StructValue<'ctx>, CoreError> {
        self.headers
            .get(index as usize)
            .ok_or(CoreError::StackIndexOutOfRange { index, size: self.size })
    }

    pub fn get_mut(&mut self, index: u32) -> Result<&mut StructValue<'ctx>, CoreError> {
        let size = self.size;
        self.headers
            .get_mut(index as usize)
            .ok_or(CoreError::StackIndexOutOfRange { index, size })
    }

    /// `push_front(count)`: activates the existing headers at indices
    /// `0..count-1` in place. No header is inserted, removed, or shifted.
    pub fn push_front(&mut self, count: u32) {
        let touched = count.saturating_sub(1).min(self.size);
        for idx in 0..touched {
            if let Some(hdr) = self.headers.get_mut(idx as usize) {
                hdr.activate();
            }
        }
    }

    /// `pop_front(count)`: deactivates the existing headers at indices
    /// `0..count-1` in place. No header is inserted, removed, or shifted.
    pub fn pop_front(&mut self, count: u32) {
        let touched = count.saturating_sub(1).min(self.size);
        for idx in 0..touched {
            if let Some(hdr) = self.headers.get_mut(idx as usize) {
                hdr.deactivate();
            }
        }
    }

    /// `.next`: reads the header at the cursor, clamped to the last header
    /// once the cursor has walked past the end of the stack, then advances
    /// the cursor unconditionally -- even past that clamp.
    pub fn next(&mut self) -> Result<StructValue<'ctx>, CoreError> {
        let read_at = if self.next_index < self.size { self.next_index } else { self.size.saturating_sub(1) };
        let header = self.get(read_at)?.clone();
        self.next_index += 1;
        Ok(header)
    }

    /// `.last`: reads the final header in the stack. Does not move the
    /// cursor.
    pub fn last(&self) -> Result<StructValue<'ctx>, CoreError> {
        let idx = if self.size < 1 { 0 } else { self.size - 1 };
        Ok(self.get(idx)?.clone())
    }

    pub fn next_index_bv(&self) -> BV<'ctx> {
        BV::from_u64(self.ctx, self.next_index as u64, 32)
    }

    /// `lastIndex = nextIndex - 1` using 32-bit wraparound, which underflows
    /// to `u32::MAX` when the stack cursor is at zero -- the source's
    /// approximation, not a stricter "no last header yet" sentinel.
    pub fn last_index_bv(&self) -> BV<'ctx> {
        BV::from_u64(self.ctx, self.next_index.wrapping_sub(1) as u64, 32)
    }

    pub fn to_term(&self, reg: &TypeRegistry<'ctx>) -> Result<Dynamic<'ctx>, CoreError> {
        // Header stacks are not addressed as a single solver term by the
        // equivalence driver (only named pipeline outputs are); this exists
        // so a stack nested inside a struct field still serializes.
        let complex = reg.complex(&self.header_sort)?;
        let first = self.headers.first().ok_or(CoreError::StackIndexOutOfRange {
            index: 0,
            size: self.size,
        })?;
        let _ = complex;
        first.to_term(reg)
    }
}

/// An extern instance: identity and a method name table only. Method calls
/// are resolved and evaluated by the interpreter, which knows how to model
/// each extern's effects; core only tracks "this name names that extern".
#[derive(Clone)]
pub struct ExternValue<'ctx> {
    pub name: String,
    pub methods: Vec<String>,
    _ctx: std::marker::PhantomData<&'ctx ()>,
}

impl<'ctx> ExternValue<'ctx> {
    pub fn new(name: impl Into<String>, methods: Vec<String>) -> Self {
        ExternValue { name: name.into(), methods, _ctx: std::marker::PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::ComplexKind;
    use z3::Config;

    #[test]
    fn invalid_header_serializes_fields_to_the_invalid_sentinel() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut reg = TypeRegistry::new(&ctx);
        reg.declare_complex(
            ComplexKind::Header,
            "Eth",
            vec![("dst".to_string(), FieldKind::Bit(8))],
        )
        .unwrap();

        let header = StructValue::new(
            &ctx,
            ComplexKind::Header,
            "Eth",
            vec![("dst".to_string(), Value::Bit(BV::from_u64(&ctx, 5, 8)))],
            Some(Bool::from_bool(&ctx, false)),
        );
        let term = header.to_term(&reg).unwrap();

        let mut valid_header = header.clone();
        valid_header.set_validity(true);
        let valid_term = valid_header.to_term(&reg).unwrap();

        // An invalid header's fields serialize to the `invalid` sentinel,
        // so the two terms differ even though the underlying field value
        // (5) is the same.
        assert_ne!(term.to_string(), valid_term.to_string());
    }

    #[test]
    fn field_read_after_write_round_trips() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let mut s = StructValue::new(
            &ctx,
            ComplexKind::Struct,
            "S",
            vec![("a".to_string(), Value::Bit(BV::from_u64(&ctx, 1, 4)))],
            None,
        );
        s.set_field("a", Value::Bit(BV::from_u64(&ctx, 9, 4))).unwrap();
        match s.field("a").unwrap() {
            Value::Bit(bv) => assert_eq!(bv.as_u64(), Some(9)),
            other => panic!("expected a bit value, got {}", other.shape()),
        }
        assert!(s.field("missing").is_err());
    }
}
