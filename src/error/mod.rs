//! This module contains the primary error type for the engine's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.
//!
//! Exceptions raised inside the interpreted program are not errors in this
//! sense; they live in the state as [`crate::vm::state::Throwable`]s.

pub mod container;
pub mod execution;
pub mod resolution;

use thiserror::Error;

/// The interface result type for the library.
pub type Result<T> = std::result::Result<T, Errors>;

/// The interface error type for the library.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Internal failures of symbolic execution.
    #[error(transparent)]
    Execution(#[from] execution::Error),

    /// Resolution failures that escaped the algorithms.
    #[error(transparent)]
    Resolution(#[from] resolution::Error),

    /// An unknown error, represented as a string.
    #[error("Unknown Error: {_0:?}")]
    Other(String),
}

impl Error {
    /// Constructs an unknown error with the provided `message`.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

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

/// A library error with an associated bytecode location.
pub type LocatedError = container::Located<Error>;

/// A container of errors that may occur in the engine.
pub type Errors = container::Errors<LocatedError>;

/// Allow simple conversions from located execution errors by re-wrapping the
/// located error around the more general payload.
impl From<execution::LocatedError> for LocatedError {
    fn from(value: execution::LocatedError) -> Self {
        value.map(Error::from)
    }
}

/// Allow simple conversions from located execution errors by re-wrapping the
/// located error around the more general payload in the Errors container.
impl From<execution::LocatedError> for Errors {
    fn from(value: execution::LocatedError) -> Self {
        let re_wrapped: LocatedError = value.into();
        re_wrapped.into()
    }
}

/// Allow conversion from the execution errors container to the general errors
/// container.
impl From<execution::Errors> for Errors {
    fn from(value: execution::Errors) -> Self {
        let errs: Vec<execution::LocatedError> = value.into();
        let new_errs: Vec<LocatedError> = errs.into_iter().map(std::convert::Into::into).collect();

        new_errs.into()
    }
}
