use std::collections::HashMap;

use z3::ast::{Ast, Dynamic};
use z3::{Context, DatatypeAccessor, DatatypeBuilder, DatatypeSort, Sort};

use crate::error::CoreError;

/// The shape of one field of a registered struct/header/header-union, as
/// it needs to be known to build the field's Z3 sort.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Bool,
    Bit(u32),
    /// References another sort already registered on the same registry.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplexKind {
    Struct,
    Header,
    HeaderUnion,
}

/// A registered struct/header/header-union: one Z3 algebraic datatype with
/// a single constructor and one accessor per field.
pub struct ComplexSort<'ctx> {
    pub kind: ComplexKind,
    pub name: String,
    pub fields: Vec<(String, FieldKind)>,
    pub datatype: DatatypeSort<'ctx>,
}

impl<'ctx> ComplexSort<'ctx> {
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| name == field)
    }
}

#[derive(Debug, Clone)]
pub struct EnumDesc {
    pub variants: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SerEnumDesc {
    pub width: u32,
    pub variants: Vec<(String, u64)>,
}

#[derive(Debug, Clone)]
pub struct StackDesc {
    pub header: String,
    pub size: u32,
}

/// Every structured sort a package declared, keyed by name. Built once per
/// package load and shared for the lifetime of the symbolic run; scoped to
/// one `Context` rather than kept as global module state.
pub struct TypeRegistry<'ctx> {
    ctx: &'ctx Context,
    complex: HashMap<String, ComplexSort<'ctx>>,
    enums: HashMap<String, EnumDesc>,
    ser_enums: HashMap<String, SerEnumDesc>,
    stacks: HashMap<String, StackDesc>,
    externs: HashMap<String, Vec<String>>,
}

impl<'ctx> TypeRegistry<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        TypeRegistry {
            ctx,
            complex: HashMap::new(),
            enums: HashMap::new(),
            ser_enums: HashMap::new(),
            stacks: HashMap::new(),
            externs: HashMap::new(),
        }
    }

    fn field_sort(&self, kind: &FieldKind) -> Result<Sort<'ctx>, CoreError> {
        Ok(match kind {
            FieldKind::Bool => Sort::bool(self.ctx),
            FieldKind::Bit(width) => Sort::bitvector(self.ctx, *width),
            FieldKind::Named(name) => self
                .complex
                .get(name)
                .map(|c| c.datatype.sort.clone())
                .ok_or_else(|| CoreError::UnknownSort(name.clone()))?,
        })
    }

    pub fn declare_complex(
        &mut self,
        kind: ComplexKind,
        name: &str,
        fields: Vec<(String, FieldKind)>,
    ) -> Result<(), CoreError> {
        let ctor_name = format!("mk_{name}");
        let mut accessors = Vec::with_capacity(fields.len());
        for (field_name, field_kind) in &fields {
            accessors.push((
                field_name.as_str(),
                DatatypeAccessor::Sort(self.field_sort(field_kind)?),
            ));
        }
        let datatype = DatatypeBuilder::new(self.ctx, name)
            .variant(&ctor_name, accessors)
            .finish();
        self.complex.insert(
            name.to_string(),
            ComplexSort { kind, name: name.to_string(), fields, datatype },
        );
        Ok(())
    }

    pub fn declare_enum(&mut self, name: &str, variants: Vec<String>) {
        self.enums.insert(name.to_string(), EnumDesc { variants });
    }

    pub fn declare_ser_enum(&mut self, name: &str, width: u32, variants: Vec<(String, u64)>) {
        self.ser_enums
            .insert(name.to_string(), SerEnumDesc { width, variants });
    }

    pub fn declare_stack(&mut self, name: &str, header: String, size: u32) {
        self.stacks.insert(name.to_string(), StackDesc { header, size });
    }

    pub fn declare_extern(&mut self, name: &str, methods: Vec<String>) {
        self.externs.insert(name.to_string(), methods);
    }

    pub fn complex(&self, name: &str) -> Result<&ComplexSort<'ctx>, CoreError> {
        self.complex
            .get(name)
            .ok_or_else(|| CoreError::UnknownSort(name.to_string()))
    }

    pub fn r#enum(&self, name: &str) -> Result<&EnumDesc, CoreError> {
        self.enums
            .get(name)
            .ok_or_else(|| CoreError::UnknownSort(name.to_string()))
    }

    pub fn ser_enum(&self, name: &str) -> Result<&SerEnumDesc, CoreError> {
        self.ser_enums
            .get(name)
            .ok_or_else(|| CoreError::UnknownSort(name.to_string()))
    }

    pub fn stack(&self, name: &str) -> Result<&StackDesc, CoreError> {
        self.stacks
            .get(name)
            .ok_or_else(|| CoreError::UnknownSort(name.to_string()))
    }

    pub fn extern_methods(&self, name: &str) -> Result<&[String], CoreError> {
        self.externs
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CoreError::UnknownSort(name.to_string()))
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    /// A fresh constant named `invalid` of the given field's sort -- the
    /// sentinel an invalid header serializes its fields to.
    pub fn invalid_sentinel(&self, kind: &FieldKind) -> Result<Dynamic<'ctx>, CoreError> {
        let sort = self.field_sort(kind)?;
        Ok(Dynamic::new_const(self.ctx, "invalid", &sort))
    }
}
