use std::fmt;

/// Failures that can arise while manipulating values or symbolic state,
/// independent of which expression or statement triggered them -- the
/// interpreter crate adds that context when it wraps these.
#[derive(Debug)]
pub enum CoreError {
    /// A member access named a field the complex value does not have.
    NoSuchField { sort: String, field: String },
    /// An operation expected one value shape and got another (e.g. a
    /// bit-vector op applied to a struct).
    ShapeMismatch { expected: &'static str, found: &'static str },
    /// A name was looked up in an environment that never bound it.
    UnboundName(String),
    /// A sort was referenced before `TypeRegistry::declare_*` registered it.
    UnknownSort(String),
    /// A header-stack index fell outside `0..size`.
    StackIndexOutOfRange { index: u32, size: u32 },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::NoSuchField { sort, field } => {
                write!(f, "{sort} has no field {field:?}")
            }
            CoreError::ShapeMismatch { expected, found } => {
                write!(f, "expected a {expected} value, found {found}")
            }
            CoreError::UnboundName(name) => write!(f, "unbound name {name:?}"),
            CoreError::UnknownSort(name) => write!(f, "unknown sort {name:?}"),
            CoreError::StackIndexOutOfRange { index, size } => {
                write!(f, "header stack index {index} out of range for size {size}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
