//! The outcomes of branching decisions.
//!
//! Whenever an instruction's effect depends on something that is still
//! symbolic, the decision procedure enumerates the feasible alternatives and
//! the engine explores one successor state per alternative. Alternatives are
//! totally ordered so that the successors are always visited in the same
//! order.

pub mod procedure;
pub mod solver;

use std::fmt;

use crate::{
    classes::signature::ClassName,
    vm::value::{ObjectId, Primitive, SymbolicRef, Value},
};

/// The broad kind of a reference alternative, which is what trigger rules
/// select on.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum AlternativeKind {
    Null,
    Aliases,
    Expands,
    Resolved,
}

/// One feasible way of resolving a value that is about to be loaded.
///
/// # Ordering
///
/// The derived order is the visitation order: null first, then aliases by
/// ascending object identity, then expansions by ascending class name, with
/// the trivial resolved alternative last. Because every variant carries the
/// reference it resolves, distinct alternatives never compare equal.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum DecisionAlternative {
    /// The reference is null.
    Null { reference: SymbolicRef },

    /// The reference denotes an object that is already in the heap.
    Aliases {
        object:    ObjectId,
        reference: SymbolicRef,
    },

    /// The reference denotes a fresh object of class `class`.
    Expands {
        class:     ClassName,
        reference: SymbolicRef,
    },

    /// Nothing is left to decide.
    Resolved { value: Value },
}

impl DecisionAlternative {
    /// Gets the label recorded in the identification of the state that takes
    /// this alternative.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Null { .. } => "L_NULL".to_string(),
            Self::Aliases { object, .. } => format!("L_ALIAS {object}"),
            Self::Expands { class, .. } => format!("L_EXP {class}"),
            Self::Resolved { .. } => "L_RESOLVED".to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> AlternativeKind {
        match self {
            Self::Null { .. } => AlternativeKind::Null,
            Self::Aliases { .. } => AlternativeKind::Aliases,
            Self::Expands { .. } => AlternativeKind::Expands,
            Self::Resolved { .. } => AlternativeKind::Resolved,
        }
    }

    /// Gets the symbolic reference being resolved, if any.
    #[must_use]
    pub fn reference(&self) -> Option<&SymbolicRef> {
        match self {
            Self::Null { reference }
            | Self::Aliases { reference, .. }
            | Self::Expands { reference, .. } => Some(reference),
            Self::Resolved { .. } => None,
        }
    }

    /// Checks whether taking the alternative changes nothing but the value.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

impl fmt::Display for DecisionAlternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One feasible outcome of indexing an array with a symbolic index.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ArrayAccess {
    /// The index is within bounds whenever `condition` holds.
    InRange { condition: Primitive },

    /// The index is out of bounds whenever `condition` holds.
    OutOfRange { condition: Primitive },
}

impl ArrayAccess {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::InRange { .. } => "IN_RANGE",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
        }
    }

    #[must_use]
    pub fn condition(&self) -> &Primitive {
        match self {
            Self::InRange { condition } | Self::OutOfRange { condition } => condition,
        }
    }
}
