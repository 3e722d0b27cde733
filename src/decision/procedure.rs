//! The decision procedure that enumerates feasible alternatives.

use std::{collections::BTreeSet, fmt::Debug, sync::Arc};

use tracing::debug;

use crate::{
    classes::ClassHierarchy,
    decision::{solver::Solver, ArrayAccess, DecisionAlternative},
    error::execution::Result,
    vm::{
        state::{path_condition::PathCondition, State},
        value::{Operator, Primitive, SymbolicRef},
    },
};

/// Enumerates the feasible alternatives of the choices that execution makes,
/// and checks path conditions for satisfiability.
///
/// It is consulted synchronously by every branch and must behave as a pure
/// function of its inputs, so that enumeration is reproducible.
pub trait DecisionProcedure
where
    Self: Debug + Send + Sync,
{
    /// Enumerates the ways in which the unresolved `reference` may be
    /// resolved in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the static type of the reference is unknown.
    fn reference_alternatives(
        &self,
        reference: &SymbolicRef,
        state: &State,
        classes: &dyn ClassHierarchy,
    ) -> Result<BTreeSet<DecisionAlternative>>;

    /// Enumerates whether accessing an array of `length` at `index` may be in
    /// range, out of range, or both, under `path_condition`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the procedure cannot decide the question.
    fn array_access_alternatives(
        &self,
        index: &Primitive,
        length: &Primitive,
        path_condition: &PathCondition,
    ) -> Result<BTreeSet<ArrayAccess>>;

    /// Rewrites `term` into a simpler equivalent.
    fn simplify(&self, term: Primitive) -> Primitive;

    /// Checks whether `path_condition` can hold.
    fn is_satisfiable(&self, path_condition: &PathCondition) -> bool;
}

/// A shareable [`DecisionProcedure`].
pub type DynDecisionProcedure = Arc<dyn DecisionProcedure>;

/// The standard decision procedure.
///
/// Reference alternatives are computed from the heap and the class
/// hierarchy: null, every symbolic object already in the heap whose class is
/// compatible with the reference's static type, and one expansion per
/// instantiable subtype. Primitive constraints are handed to `S`.
#[derive(Clone, Debug, Default)]
pub struct DecisionAlgorithms<S: Solver> {
    solver: S,
}

impl<S: Solver> DecisionAlgorithms<S> {
    #[must_use]
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    #[must_use]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    fn admits(&self, path_condition: &PathCondition, extra: &Primitive) -> bool {
        let mut clauses = path_condition.primitive_clauses();
        clauses.push(extra);
        self.solver.is_satisfiable(&clauses)
    }
}

impl<S: Solver> DecisionProcedure for DecisionAlgorithms<S> {
    fn reference_alternatives(
        &self,
        reference: &SymbolicRef,
        state: &State,
        classes: &dyn ClassHierarchy,
    ) -> Result<BTreeSet<DecisionAlternative>> {
        let mut alternatives = BTreeSet::new();
        alternatives.insert(DecisionAlternative::Null {
            reference: reference.clone(),
        });

        let aliases = state
            .heap()
            .iter()
            .filter(|(_, object)| object.is_symbolic() && !object.is_statics())
            .filter(|(_, object)| classes.is_subclass(object.class(), &reference.static_type))
            .map(|(object, _)| DecisionAlternative::Aliases {
                object,
                reference: reference.clone(),
            });
        alternatives.extend(aliases);

        for class in classes.concrete_subclasses(&reference.static_type)? {
            alternatives.insert(DecisionAlternative::Expands {
                class,
                reference: reference.clone(),
            });
        }

        debug!(
            target: "lazy_symex::decision",
            %reference,
            count = alternatives.len(),
            "enumerated reference alternatives"
        );
        Ok(alternatives)
    }

    fn array_access_alternatives(
        &self,
        index: &Primitive,
        length: &Primitive,
        path_condition: &PathCondition,
    ) -> Result<BTreeSet<ArrayAccess>> {
        let in_range = Primitive::binary(
            Operator::And,
            Primitive::binary(Operator::Ge, index.clone(), Primitive::int(0)),
            Primitive::binary(Operator::Lt, index.clone(), length.clone()),
        );
        let out_of_range = Primitive::binary(
            Operator::Or,
            Primitive::binary(Operator::Lt, index.clone(), Primitive::int(0)),
            Primitive::binary(Operator::Ge, index.clone(), length.clone()),
        );

        let candidates = [
            ArrayAccess::InRange {
                condition: self.simplify(in_range),
            },
            ArrayAccess::OutOfRange {
                condition: self.simplify(out_of_range),
            },
        ];
        Ok(candidates
            .into_iter()
            .filter(|access| self.admits(path_condition, access.condition()))
            .collect())
    }

    fn simplify(&self, term: Primitive) -> Primitive {
        self.solver.simplify(term)
    }

    fn is_satisfiable(&self, path_condition: &PathCondition) -> bool {
        self.solver
            .is_satisfiable(&path_condition.primitive_clauses())
    }
}
