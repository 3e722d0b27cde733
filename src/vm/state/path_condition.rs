//! The path condition: the assumptions made along a branch.

use std::{fmt, sync::Arc};

use crate::{
    classes::signature::ClassName,
    vm::value::{ObjectId, Primitive, SymbolicRef},
};

/// One assumption.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Clause {
    /// A boolean primitive holds.
    Assume(Primitive),

    /// The reference is null.
    AssumeNull(SymbolicRef),

    /// The reference denotes an object that already existed.
    AssumeAliases {
        reference: SymbolicRef,
        object:    ObjectId,
    },

    /// The reference denotes a fresh object of class `class`.
    AssumeExpands {
        reference: SymbolicRef,
        object:    ObjectId,
        class:     ClassName,
    },

    /// The class was initialized before exploration started.
    AssumeClassInitialized(ClassName),
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assume(p) => write!(f, "{p}"),
            Self::AssumeNull(r) => write!(f, "{r} == null"),
            Self::AssumeAliases { reference, object } => write!(f, "{reference} == {object}"),
            Self::AssumeExpands {
                reference,
                object,
                class,
            } => write!(f, "{reference} fresh {class} {object}"),
            Self::AssumeClassInitialized(class) => write!(f, "pre_init({class})"),
        }
    }
}

#[derive(Debug)]
struct Node {
    clause: Clause,
    next:   Option<Arc<Node>>,
}

/// An append-only conjunction of clauses.
///
/// It is a persistent list, so a clone shares every clause with its parent and
/// extending either copy leaves the other untouched.
#[derive(Clone, Debug, Default)]
pub struct PathCondition {
    head: Option<Arc<Node>>,
    len:  usize,
}

impl PathCondition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Conjoins `clause`.
    pub fn push(&mut self, clause: Clause) {
        let next = self.head.take();
        self.head = Some(Arc::new(Node { clause, next }));
        self.len += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the clauses, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        let mut current = self.head.as_deref();
        std::iter::from_fn(move || {
            let node = current?;
            current = node.next.as_deref();
            Some(&node.clause)
        })
    }

    /// Gets the clauses in the order they were assumed.
    #[must_use]
    pub fn clauses(&self) -> Vec<&Clause> {
        let mut clauses: Vec<_> = self.iter().collect();
        clauses.reverse();
        clauses
    }

    /// Gets the boolean primitives that have been assumed.
    #[must_use]
    pub fn primitive_clauses(&self) -> Vec<&Primitive> {
        self.iter()
            .filter_map(|c| match c {
                Clause::Assume(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Checks whether `self` was obtained from `ancestor` by conjoining zero
    /// or more clauses.
    #[must_use]
    pub fn extends(&self, ancestor: &PathCondition) -> bool {
        if ancestor.len > self.len {
            return false;
        }
        let mut current = self.head.as_ref();
        for _ in 0..self.len - ancestor.len {
            current = current.and_then(|n| n.next.as_ref());
        }
        match (current, ancestor.head.as_ref()) {
            (Some(mine), Some(theirs)) => Arc::ptr_eq(mine, theirs),
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for PathCondition {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for PathCondition {}

impl fmt::Display for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("true");
        }
        let text = itertools::join(self.clauses(), " && ");
        f.write_str(&text)
    }
}

/// Unlinks the list iteratively so that dropping a long path condition cannot
/// overflow the call stack.
impl Drop for PathCondition {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::vm::{
        state::path_condition::{Clause, PathCondition},
        value::Primitive,
    };

    fn clause(value: i32) -> Clause {
        Clause::Assume(Primitive::binary(
            crate::vm::value::Operator::Eq,
            Primitive::int(value),
            Primitive::int(value),
        ))
    }

    #[test]
    fn clones_extend_independently() {
        let mut parent = PathCondition::new();
        parent.push(clause(1));

        let mut left = parent.clone();
        let mut right = parent.clone();
        left.push(clause(2));
        right.push(clause(3));
        right.push(clause(4));

        assert_eq!(parent.len(), 1);
        assert_eq!(left.len(), 2);
        assert_eq!(right.len(), 3);
        assert!(left.extends(&parent));
        assert!(right.extends(&parent));
        assert!(!left.extends(&right));
        assert!(!parent.extends(&left));
        assert_eq!(right.clauses()[0], &clause(1));
    }

    #[test]
    fn dropping_a_long_condition_does_not_recurse() {
        let mut condition = PathCondition::new();
        for i in 0..200_000 {
            condition.push(clause(i % 7));
        }
        assert_eq!(condition.len(), 200_000);
        drop(condition);
    }

    #[test]
    fn renders_as_a_conjunction() {
        let mut condition = PathCondition::new();
        assert_eq!(condition.to_string(), "true");
        condition.push(clause(1));
        condition.push(clause(2));
        assert_eq!(condition.to_string(), "true && true");
    }
}
