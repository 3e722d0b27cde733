//! Loads of array members.
//!
//! An array load makes two decisions at once: whether the index is in range,
//! and, when it is, how the loaded member resolves. Members of symbolic
//! arrays are created on first read and written back, so that reading the
//! same index term again on the path yields the same value.

use std::{collections::BTreeSet, fmt};

use crate::{
    algo::{
        load::{decide_value, refine_reference, update_load},
        pop_checked,
        raise,
        target_of,
        Branching,
        Continuation,
        Operands,
    },
    constant::SINGLE_BYTE_OFFSET,
    decision::{ArrayAccess, DecisionAlternative},
    error::execution::{Error, Result},
    vm::{
        context::ExecutionContext,
        state::{State, Throwable},
        value::{Category, ObjectId, Origin, Primitive, Value},
    },
};

/// The algorithm of the XALOAD family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ArrayLoad {
    /// The operand stack category of the array's members.
    category: Category,
}

impl ArrayLoad {
    #[must_use]
    pub fn new(category: Category) -> Self {
        Self { category }
    }
}

/// The array, the index and the member that it would load.
#[derive(Clone, Debug)]
pub struct ArrayOperands {
    array:  ObjectId,
    index:  Primitive,
    length: Primitive,
    member: Value,

    /// Whether `member` was created by this load.
    fresh: bool,
}

/// One feasible outcome of an array load.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ArrayLoadAlternative {
    /// The index is out of bounds whenever `condition` holds.
    OutOfRange { condition: Primitive },

    /// The index is in bounds whenever `condition` holds, and the member
    /// resolves as `load`.
    InRange {
        condition: Primitive,
        load:      DecisionAlternative,
    },
}

impl fmt::Display for ArrayLoadAlternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { .. } => f.write_str("OUT_OF_RANGE"),
            Self::InRange { load, .. } if load.is_trivial() => f.write_str("IN_RANGE"),
            Self::InRange { load, .. } => write!(f, "IN_RANGE {load}"),
        }
    }
}

impl Branching for ArrayLoad {
    type Alternative = ArrayLoadAlternative;
    type Operands = ArrayOperands;

    fn read(
        &self,
        state: &mut State,
        _: &ExecutionContext,
    ) -> Result<Operands<ArrayOperands>> {
        let (Some(index), Some(array)) = (pop_checked(state)?, pop_checked(state)?) else {
            return Ok(raise(state, Throwable::Verify));
        };
        let Value::Primitive(index) = index else {
            return Ok(raise(state, Throwable::Verify));
        };
        if index.ty().category() != Category::Int {
            return Ok(raise(state, Throwable::Verify));
        }
        let array = match target_of(state, &array)?.object() {
            Ok(id) => id,
            Err(kind) => return Ok(raise(state, kind)),
        };

        let object = state.object(array)?;
        let (Some(length), Ok(Some(component))) =
            (object.array_length().cloned(), object.class().component_type())
        else {
            return Ok(raise(state, Throwable::Verify));
        };
        if component.category() != Some(self.category) {
            return Ok(raise(state, Throwable::Verify));
        }

        let existing = object.member(&index).cloned();
        let origin = object.origin().map(|reference| reference.origin.clone());
        let (member, fresh) = match (existing, origin) {
            (Some(member), _) => (member, false),
            (None, Some(origin)) => {
                let origin = Origin::array_member(origin, index.clone());
                (state.fresh_value(&component, origin), true)
            }
            (None, None) => (Value::default_for(&component), false),
        };

        Ok(Operands::Ready(ArrayOperands {
            array,
            index,
            length,
            member,
            fresh,
        }))
    }

    fn decide(
        &self,
        state: &State,
        operands: &ArrayOperands,
        context: &ExecutionContext,
    ) -> Result<BTreeSet<ArrayLoadAlternative>> {
        let accesses = context.decision_procedure().array_access_alternatives(
            &operands.index,
            &operands.length,
            state.path_condition(),
        )?;

        let mut alternatives = BTreeSet::new();
        for access in accesses {
            match access {
                ArrayAccess::OutOfRange { condition } => {
                    alternatives.insert(ArrayLoadAlternative::OutOfRange { condition });
                }
                ArrayAccess::InRange { condition } => {
                    for load in decide_value(state, &operands.member, context)? {
                        alternatives.insert(ArrayLoadAlternative::InRange {
                            condition: condition.clone(),
                            load,
                        });
                    }
                }
            }
        }
        Ok(alternatives)
    }

    fn refine(
        &self,
        state: &mut State,
        operands: &ArrayOperands,
        alternative: &ArrayLoadAlternative,
        context: &ExecutionContext,
    ) -> Result<()> {
        let condition = match alternative {
            ArrayLoadAlternative::OutOfRange { condition }
            | ArrayLoadAlternative::InRange { condition, .. } => condition,
        };
        match condition.as_const() {
            Some(0) => return Err(Error::Contradiction),
            Some(_) => {}
            None => state.assume(condition.clone()),
        }

        if let ArrayLoadAlternative::InRange { load, .. } = alternative {
            if operands.fresh {
                let written = state
                    .heap_mut()
                    .get_mut(operands.array)?
                    .set_member(operands.index.clone(), operands.member.clone());
                if !written {
                    return Err(Error::TypeMismatch {
                        expected: "an array".into(),
                        found:    operands.array.to_string(),
                    });
                }
            }
            refine_reference(state, load, context)?;
        }
        Ok(())
    }

    fn update(
        &self,
        state: &mut State,
        _: &ArrayOperands,
        alternative: ArrayLoadAlternative,
        context: &ExecutionContext,
    ) -> Result<Continuation> {
        match alternative {
            ArrayLoadAlternative::OutOfRange { .. } => {
                state.raise(Throwable::ArrayIndexOutOfBounds);
                Ok(Continuation::Halt)
            }
            ArrayLoadAlternative::InRange { load, .. } => {
                update_load(state, load, SINGLE_BYTE_OFFSET, context)
            }
        }
    }
}
