use serde::{Deserialize, Serialize};

/// A type reference as it appears in a declaration or parameter list.
///
/// `Named` defers to a `TypeDecl` registered on the enclosing `Package` --
/// the IR does not inline structural types at every use site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    Bool,
    Bit { width: u32 },
    Named { name: String },
}

/// Declarations that register a structured sort before it can be used by
/// name in a `TypeRef::Named`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDecl {
    Struct {
        name: String,
        fields: Vec<(String, TypeRef)>,
    },
    Header {
        name: String,
        fields: Vec<(String, TypeRef)>,
    },
    HeaderUnion {
        name: String,
        variants: Vec<(String, TypeRef)>,
    },
    Enum {
        name: String,
        variants: Vec<String>,
    },
    SerEnum {
        name: String,
        width: u32,
        variants: Vec<(String, u64)>,
    },
    HeaderStack {
        name: String,
        header: String,
        size: u32,
    },
    Extern {
        name: String,
        methods: Vec<String>,
    },
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Struct { name, .. }
            | TypeDecl::Header { name, .. }
            | TypeDecl::HeaderUnion { name, .. }
            | TypeDecl::Enum { name, .. }
            | TypeDecl::SerEnum { name, .. }
            | TypeDecl::HeaderStack { name, .. }
            | TypeDecl::Extern { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    LogAnd,
    LogOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    Not,
    BitNot,
    Neg,
    Abs,
}

/// One node of the expression/statement tree that an IR producer hands the
/// interpreter. Expression and statement kinds share a single enum because
/// the source language does too (a `Block` is a list of `Node`s, any of
/// which may itself be an expression evaluated for effect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// A bare identifier -- the leaf a `Member` chain bottoms out on.
    Name(String),
    BoolLiteral(bool),
    Literal {
        width: u32,
        value: u64,
    },
    Member {
        lval: Box<Node>,
        member: String,
    },
    Slice {
        value: Box<Node>,
        hi: u32,
        lo: u32,
    },
    BinaryOp {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<Node>,
    },
    Cast {
        operand: Box<Node>,
        width: u32,
    },
    Mux {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
    Concat {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    /// A `{ ... }` list-initialization expression. Only valid as the `rval`
    /// of an `Assign` whose `lval` names a struct or header -- the elements
    /// bind positionally to the target's fields.
    List {
        elements: Vec<Node>,
    },
    MethodCall {
        callee: Box<Node>,
        method: String,
        args: Vec<Node>,
    },
    Assign {
        lval: Box<Node>,
        rval: Box<Node>,
    },
    SliceAssign {
        lval: Box<Node>,
        rval: Box<Node>,
        hi: u32,
        lo: u32,
    },
    Declare {
        name: String,
        #[serde(rename = "type")]
        ty: TypeRef,
        init: Option<Box<Node>>,
    },
    Block {
        statements: Vec<Node>,
    },
    If {
        cond: Box<Node>,
        then_block: Box<Node>,
        else_block: Option<Box<Node>>,
    },
    Switch {
        table: String,
        cases: Vec<(String, Node)>,
        default: Box<Node>,
    },
    /// `exit;` -- clears the remainder of the continuation chain.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    pub name: String,
    pub args: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstEntry {
    /// One literal per table key, in key order.
    pub keys: Vec<Node>,
    pub action: ActionRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub keys: Vec<Node>,
    pub actions: Vec<ActionRef>,
    #[serde(default)]
    pub const_entries: Vec<ConstEntry>,
    pub default: Option<ActionRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDef {
    pub name: String,
    /// `true` for a P4 `parser`, modeled identically to a control block --
    /// the executor does not branch on this, it is carried for diagnostics.
    #[serde(default)]
    pub is_parser: bool,
    pub params: Vec<Param>,
    pub locals: Vec<Node>,
    pub body: Node,
}
