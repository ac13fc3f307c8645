//! The value model and symbolic machine state the interpreter executes
//! programs over. Every structured value is backed by a live field map
//! rather than one opaque solver term; serialization to a single term
//! happens on demand via `Value::to_term`.

pub mod coerce;
pub mod error;
pub mod sort;
pub mod state;
pub mod value;

pub use error::CoreError;
pub use sort::{ComplexKind, ComplexSort, EnumDesc, FieldKind, SerEnumDesc, StackDesc, TypeRegistry};
pub use state::{Env, SymbolicState};
pub use value::{EnumValue, ExternValue, StackValue, StructValue, Value};
