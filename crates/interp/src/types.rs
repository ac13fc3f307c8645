use z3::ast::{Bool, BV};

use p4tv_core::{ComplexKind, CoreError, EnumValue, ExternValue, FieldKind, StackValue, StructValue, TypeRegistry, Value};
use p4tv_ir::{TypeDecl, TypeRef};

use crate::error::InterpError;

fn field_kind(ty: &TypeRef) -> FieldKind {
    match ty {
        TypeRef::Bool => FieldKind::Bool,
        TypeRef::Bit { width } => FieldKind::Bit(*width),
        TypeRef::Named { name } => FieldKind::Named(name.clone()),
    }
}

/// Registers every type a package declares, in declaration order. Structs,
/// headers, and header-unions must be declared before anything that
/// references them by name, same as `z3.Datatype` construction requires.
pub fn build_registry<'ctx>(
    ctx: &'ctx z3::Context,
    decls: &[TypeDecl],
) -> Result<TypeRegistry<'ctx>, InterpError> {
    let mut reg = TypeRegistry::new(ctx);
    for decl in decls {
        match decl {
            TypeDecl::Struct { name, fields } => {
                let fields = fields.iter().map(|(n, t)| (n.clone(), field_kind(t))).collect();
                reg.declare_complex(ComplexKind::Struct, name, fields)
                    .map_err(InterpError::Core)?;
            }
            TypeDecl::Header { name, fields } => {
                let fields = fields.iter().map(|(n, t)| (n.clone(), field_kind(t))).collect();
                reg.declare_complex(ComplexKind::Header, name, fields)
                    .map_err(InterpError::Core)?;
            }
            TypeDecl::HeaderUnion { name, variants } => {
                let fields = variants.iter().map(|(n, t)| (n.clone(), field_kind(t))).collect();
                reg.declare_complex(ComplexKind::HeaderUnion, name, fields)
                    .map_err(InterpError::Core)?;
            }
            TypeDecl::Enum { name, variants } => {
                reg.declare_enum(name, variants.clone());
            }
            TypeDecl::SerEnum { name, width, variants } => {
                reg.declare_ser_enum(name, *width, variants.clone());
            }
            TypeDecl::HeaderStack { name, header, size } => {
                reg.declare_stack(name, header.clone(), *size);
            }
            TypeDecl::Extern { name, methods } => {
                reg.declare_extern(name, methods.clone());
            }
        }
    }
    Ok(reg)
}

/// Builds a fresh, wholly unconstrained value of the given type, named
/// after `hint`. Used for pipeline parameters -- these represent "any
/// input the program might see", distinct from the `undefined` sentinel a
/// `Declare` with no initializer gets, which must stay recognizable by
/// name to the undefined-behavior rewrite pass.
pub fn fresh_value<'ctx>(
    ctx: &'ctx z3::Context,
    reg: &TypeRegistry<'ctx>,
    ty: &TypeRef,
    hint: &str,
) -> Result<Value<'ctx>, InterpError> {
    Ok(match ty {
        TypeRef::Bool => Value::Bool(Bool::fresh_const(ctx, hint)),
        TypeRef::Bit { width } => Value::Bit(BV::fresh_const(ctx, hint, *width)),
        TypeRef::Named { name } => fresh_named(ctx, reg, name, hint)?,
    })
}

fn fresh_named<'ctx>(
    ctx: &'ctx z3::Context,
    reg: &TypeRegistry<'ctx>,
    name: &str,
    hint: &str,
) -> Result<Value<'ctx>, InterpError> {
    if let Ok(complex) = reg.complex(name) {
        let mut fields = Vec::with_capacity(complex.fields.len());
        for (field_name, field_kind) in &complex.fields {
            let field_ty = field_kind_to_type_ref(field_kind);
            let field_hint = format!("{hint}.{field_name}");
            fields.push((field_name.clone(), fresh_value(ctx, reg, &field_ty, &field_hint)?));
        }
        let valid = match complex.kind {
            ComplexKind::Header | ComplexKind::HeaderUnion => {
                Some(Bool::fresh_const(ctx, &format!("{hint}.valid")))
            }
            ComplexKind::Struct => None,
        };
        return Ok(Value::Struct(StructValue::new(ctx, complex.kind, name, fields, valid)));
    }
    if reg.r#enum(name).is_ok() {
        return Ok(Value::Enum(EnumValue {
            sort_name: name.to_string(),
            serializable: false,
            width: 32,
            repr: BV::fresh_const(ctx, hint, 32),
        }));
    }
    if let Ok(desc) = reg.ser_enum(name) {
        return Ok(Value::Enum(EnumValue {
            sort_name: name.to_string(),
            serializable: true,
            width: desc.width,
            repr: BV::fresh_const(ctx, hint, desc.width),
        }));
    }
    if let Ok(desc) = reg.stack(name) {
        let mut headers = Vec::with_capacity(desc.size as usize);
        for i in 0..desc.size {
            let header_hint = format!("{hint}[{i}]");
            match fresh_named(ctx, reg, &desc.header, &header_hint)? {
                Value::Struct(s) => headers.push(s),
                _ => {
                    return Err(InterpError::Unsupported {
                        construct: format!("header stack {name} over non-header {}", desc.header),
                    })
                }
            }
        }
        return Ok(Value::Stack(StackValue::new(ctx, desc.header.clone(), headers)));
    }
    if let Ok(methods) = reg.extern_methods(name) {
        return Ok(Value::Extern(ExternValue::new(name, methods.to_vec())));
    }
    Err(InterpError::Core(CoreError::UnknownSort(name.to_string())))
}

fn field_kind_to_type_ref(kind: &p4tv_core::FieldKind) -> TypeRef {
    match kind {
        p4tv_core::FieldKind::Bool => TypeRef::Bool,
        p4tv_core::FieldKind::Bit(w) => TypeRef::Bit { width: *w },
        p4tv_core::FieldKind::Named(n) => TypeRef::Named { name: n.clone() },
    }
}

pub fn sort_of<'ctx>(
    ctx: &'ctx z3::Context,
    reg: &TypeRegistry<'ctx>,
    ty: &TypeRef,
) -> Result<z3::Sort<'ctx>, CoreError> {
    Ok(match ty {
        TypeRef::Bool => z3::Sort::bool(ctx),
        TypeRef::Bit { width } => z3::Sort::bitvector(ctx, *width),
        TypeRef::Named { name } => reg.complex(name)?.datatype.sort.clone(),
    })
}
