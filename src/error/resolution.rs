//! This module contains the errors reported by a class hierarchy when it
//! cannot resolve a class, field or method on behalf of the engine.
//!
//! While a reference is being resolved they are not fatal: the algorithms
//! map each of them onto the exception the interpreted program observes, see
//! [`Error::throwable`]. Once resolution has succeeded, a failing query on
//! the same class means the hierarchy is inconsistent, and the branch is
//! aborted with [`crate::error::execution::Error::Resolution`] instead.

use thiserror::Error;

use crate::{error::container, vm::state::Throwable};

/// Failures of class, field and method resolution.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Class {class} could not be found")]
    ClassNotFound { class: String },

    #[error("{member} is incompatible with the kind of {class}")]
    IncompatibleClassChange { class: String, member: String },

    #[error("Method {method} is abstract")]
    MethodAbstract { method: String },

    #[error("Method {method} could not be found")]
    MethodNotFound { method: String },

    #[error("Method {method} is not accessible from {accessor}")]
    MethodNotAccessible { method: String, accessor: String },

    #[error("Field {field} could not be found")]
    FieldNotFound { field: String },

    #[error("Field {field} is not accessible from {accessor}")]
    FieldNotAccessible { field: String, accessor: String },

    #[error("Class {class} has no constant pool entry of the requested kind at {index}")]
    InvalidPoolIndex { class: String, index: u16 },

    #[error("Descriptor {descriptor:?} is malformed")]
    MalformedDescriptor { descriptor: String },

    #[error("Class {class} is malformed: {reason}")]
    BadClassFile { class: String, reason: String },
}

impl Error {
    /// Gets the kind of exception that the interpreted program observes when
    /// resolution fails with `self`.
    #[must_use]
    pub fn throwable(&self) -> Throwable {
        match self {
            Self::ClassNotFound { .. } => Throwable::NoClassDefFound,
            Self::IncompatibleClassChange { .. } => Throwable::IncompatibleClassChange,
            Self::MethodAbstract { .. } => Throwable::AbstractMethod,
            Self::MethodNotFound { .. } => Throwable::NoSuchMethod,
            Self::FieldNotFound { .. } => Throwable::NoSuchField,
            Self::MethodNotAccessible { .. } | Self::FieldNotAccessible { .. } => {
                Throwable::IllegalAccess
            }
            Self::InvalidPoolIndex { .. }
            | Self::MalformedDescriptor { .. }
            | Self::BadClassFile { .. } => Throwable::Verify,
        }
    }
}

/// A resolution error with an associated program counter.
pub type LocatedError = container::Located<Error>;

/// The result type for resolution queries.
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

#[cfg(test)]
mod test {
    use crate::{error::resolution::Error, vm::state::Throwable};

    #[test]
    fn maps_every_failure_to_a_distinct_user_visible_kind() {
        let cases = [
            (
                Error::ClassNotFound { class: "a/B".into() },
                Throwable::NoClassDefFound,
            ),
            (
                Error::IncompatibleClassChange {
                    class:  "a/B".into(),
                    member: "m".into(),
                },
                Throwable::IncompatibleClassChange,
            ),
            (
                Error::MethodAbstract { method: "m".into() },
                Throwable::AbstractMethod,
            ),
            (
                Error::MethodNotFound { method: "m".into() },
                Throwable::NoSuchMethod,
            ),
            (
                Error::MethodNotAccessible {
                    method:   "m".into(),
                    accessor: "a/C".into(),
                },
                Throwable::IllegalAccess,
            ),
            (
                Error::BadClassFile {
                    class:  "a/B".into(),
                    reason: "truncated".into(),
                },
                Throwable::Verify,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.throwable(), expected);
        }
    }
}
