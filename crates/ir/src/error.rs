use std::fmt;
use std::path::PathBuf;

/// Failures that can occur while loading or resolving an IR package.
#[derive(Debug)]
pub enum IrError {
    /// The fixture file could not be read from disk.
    Read { path: PathBuf, source: std::io::Error },
    /// The fixture's JSON did not match the expected `Package` shape.
    Parse { path: PathBuf, source: serde_json::Error },
    /// A name referenced by a pipeline, table action, or control body does
    /// not exist in the package that defines it.
    DanglingReference { kind: &'static str, name: String },
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::Read { path, source } => {
                write!(f, "failed to read IR fixture {}: {source}", path.display())
            }
            IrError::Parse { path, source } => {
                write!(f, "malformed IR fixture {}: {source}", path.display())
            }
            IrError::DanglingReference { kind, name } => {
                write!(f, "dangling {kind} reference: {name:?}")
            }
        }
    }
}

impl std::error::Error for IrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IrError::Read { source, .. } => Some(source),
            IrError::Parse { source, .. } => Some(source),
            IrError::DanglingReference { .. } => None,
        }
    }
}
