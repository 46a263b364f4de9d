//! Simulator error types.
//!
//! Only faults of the simulated program are represented here; conditions like
//! cache misses, bus backpressure or branch mispredicts are ordinary pipeline
//! control flow, and violations of simulator invariants panic instead.

use thiserror::Error;

/// A fault raised by the simulated program (or by parsing its source).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// `div`/`rem` executed with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// A branch or jump named a label the program never defined.
    #[error("label {0} does not exist")]
    UnknownLabel(String),

    /// The assembly source could not be parsed.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}
