use std::fmt;

/// Setup failures that precede any per-pipeline `Outcome` -- these abort
/// the whole comparison rather than producing a result for one pipeline.
#[derive(Debug)]
pub enum DriverError {
    /// Fewer than two programs were given to compare.
    TooFewPrograms { given: usize },
    /// A program declared no pipelines at all.
    NoPipelines { program: String },
    /// The shared type registry could not be built from the first
    /// program's type declarations.
    Setup(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::TooFewPrograms { given } => {
                write!(f, "need at least two programs to compare, got {given}")
            }
            DriverError::NoPipelines { program } => write!(f, "program {program:?} declares no pipelines"),
            DriverError::Setup(msg) => write!(f, "setup failed: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {}
