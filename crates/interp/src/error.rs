use std::fmt;

use p4tv_core::CoreError;

/// Failures the interpreter can hit while evaluating an expression or
/// executing a statement. `Unsupported` and `TypeMismatch` are the two
/// categories that originate here; the driver decides how each maps to an
/// `Outcome`.
#[derive(Debug)]
pub enum InterpError {
    Core(CoreError),
    Unsupported { construct: String },
    TypeMismatch { expected: &'static str, found: &'static str },
    UnknownAction(String),
    UnknownTable(String),
    /// The underlying solver raised while building or checking a term.
    Solver(String),
}

impl fmt::Display for InterpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpError::Core(e) => write!(f, "{e}"),
            InterpError::Unsupported { construct } => write!(f, "unsupported construct: {construct}"),
            InterpError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            InterpError::UnknownAction(name) => write!(f, "unknown action {name:?}"),
            InterpError::UnknownTable(name) => write!(f, "unknown table {name:?}"),
            InterpError::Solver(msg) => write!(f, "solver error: {msg}"),
        }
    }
}

impl std::error::Error for InterpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InterpError::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CoreError> for InterpError {
    fn from(e: CoreError) -> Self {
        InterpError::Core(e)
    }
}
