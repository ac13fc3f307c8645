//! The equivalence driver: loads two IR packages, compares every pipeline
//! they have in common, and runs the undefined-behavior rewrite pass when
//! a violation might be an artifact of an uninitialized value.

mod equiv;
mod error;
mod failcopy;
mod outcome;
mod undef;

pub use equiv::check_equivalence;
pub use error::DriverError;
pub use failcopy::copy_failing_programs;
pub use outcome::Outcome;
