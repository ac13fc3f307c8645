/// The result of comparing one pipeline between two programs.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// No input exists for which the two pipelines' outputs differ.
    Equivalent,
    /// The solver found an input on which the pipelines disagree.
    Violation { pipeline: String, model: String },
    /// The pipeline could not be compared (missing from one program, or
    /// differing output arity) -- not evidence of a mismatch.
    Skipped { reason: String },
    /// The IR used a construct the interpreter does not model.
    Unsupported { construct: String },
    /// Something else went wrong building or checking the formula.
    Failure { reason: String },
}

impl Outcome {
    /// The process exit code this project assigns to each outcome (see
    /// DESIGN.md for why these particular numbers).
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Equivalent => 0,
            Outcome::Violation { .. } => 1,
            Outcome::Skipped { .. } => 2,
            Outcome::Failure { .. } => 3,
            Outcome::Unsupported { .. } => 4,
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Outcome::Violation { .. })
    }
}
