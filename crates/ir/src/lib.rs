//! IR node types and loader for the packages the interpreter evaluates.
//!
//! The real frontend that lowers a packet-processing program into this tree
//! lives outside this workspace; this crate only fixes the contract it
//! hands the interpreter and gives that contract a concrete JSON
//! serialization so tests and the CLI have something to read.

mod error;
mod loader;
mod node;
mod package;

pub use error::IrError;
pub use loader::load_package;
pub use node::{
    ActionDef, ActionRef, BinOp, ConstEntry, ControlDef, Direction, Node, Param, TableDef,
    TypeDecl, TypeRef, UnOp,
};
pub use package::Package;
