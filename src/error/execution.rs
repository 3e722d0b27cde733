//! This module contains errors pertaining to the symbolic execution of the
//! bytecode.
//!
//! Apart from [`Error::Contradiction`], every variant is an internal
//! consistency failure: it means an earlier stage of the engine got something
//! wrong, and the branch it occurred on is abandoned and reported.

use thiserror::Error;

use crate::{
    error::{container, resolution},
    vm::value::ObjectId,
};

/// Errors that occur during the execution of the bytecode by the
/// [`crate::vm::Engine`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Object {id} does not exist in the heap")]
    NoSuchObject { id: ObjectId },

    #[error("Class {class} has no static area")]
    NoSuchStaticArea { class: String },

    #[error("Symbolic reference {reference} has already been resolved on this path")]
    AlreadyResolved { reference: String },

    #[error("Symbolic reference {reference} must be resolved before it is dereferenced")]
    UnresolvedReference { reference: String },

    #[error("The decision procedure found no feasible alternative for {choice}")]
    NoAlternatives { choice: String },

    #[error("Requested {requested} operands but only {available} are on the stack")]
    OperandStackUnderflow { requested: usize, available: usize },

    #[error("Maximum operand stack depth exceeded with request for {requested} entries")]
    OperandStackOverflow { requested: usize },

    #[error("Local slot {slot} does not exist in a frame with {available} slots")]
    NoSuchLocal { slot: usize, available: usize },

    #[error("The state has no active frame")]
    NoFrame,

    #[error("Program counter {requested} is outside of code of length {available}")]
    ProgramCounterOutOfBounds { requested: u32, available: usize },

    #[error("Expected {expected} but found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Opcode 0x{opcode:02x} is not supported by this engine")]
    UnsupportedOpcode { opcode: u8 },

    #[error("Invocation of {method} received {found} arguments but expected {expected}")]
    ArgumentMismatch {
        method:   String,
        expected: usize,
        found:    usize,
    },

    #[error("Resolution failed after it had already succeeded: {_0}")]
    Resolution(#[from] resolution::Error),

    #[error("The path condition became unsatisfiable")]
    Contradiction,

    #[error("Step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    #[error("Execution was stopped by the watchdog")]
    StoppedByWatchdog,
}

impl Error {
    /// Checks whether the error just prunes an infeasible branch.
    #[must_use]
    pub fn is_contradiction(&self) -> bool {
        matches!(self, Self::Contradiction)
    }
}

/// An execution error with an associated location in the bytecode.
pub type LocatedError = container::Located<Error>;

/// A container of execution errors used for aggregation of errors during
/// execution.
pub type Errors = container::Errors<LocatedError>;

/// The result type for methods that may have execution errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Make it possible to attach locations to these errors.
impl container::Locatable for Error {
    type Located = LocatedError;

    fn locate(self, program_counter: u32) -> Self::Located {
        container::Located {
            location: program_counter,
            branch:   None,
            payload:  self,
        }
    }
}
