//! Instructions that never consult the decision procedure.

use std::collections::BTreeMap;

use tracing::trace;

use crate::{
    algo::{halt_with, pool_index, pop_checked, target_of, Continuation, Sequential},
    constant::{NEW_OFFSET, SINGLE_BYTE_OFFSET},
    error::execution::{Error, Result},
    vm::{
        context::ExecutionContext,
        state::{frame::FrameKind, object::Object, ClassInit, Outcome, State, Throwable},
        value::{Category, Operator, Primitive, Value},
    },
};

/// The straight-line instructions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Simple {
    Nop,
    AconstNull,

    /// ICONST_N and LCONST_N.
    Constant(Primitive),

    BiPush,
    SiPush,
    Pop,
    Dup,

    /// Two-operand integral arithmetic on values of `category`.
    Arithmetic {
        op:       Operator,
        category: Category,
    },

    New,
    ArrayLength,
    AThrow,

    /// XRETURN, or RETURN when the category is absent.
    Return(Option<Category>),
}

impl Sequential for Simple {
    fn apply(&self, state: &mut State, context: &ExecutionContext) -> Result<Continuation> {
        match self {
            Self::Nop => Ok(Continuation::Advance(SINGLE_BYTE_OFFSET)),
            Self::AconstNull => {
                state.push_operand(Value::null())?;
                Ok(Continuation::Advance(SINGLE_BYTE_OFFSET))
            }
            Self::Constant(value) => {
                state.push_operand(Value::Primitive(value.clone()))?;
                Ok(Continuation::Advance(SINGLE_BYTE_OFFSET))
            }
            Self::BiPush => {
                let Some(byte) = state.current_frame()?.byte_at(1) else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                state.push_operand(Value::int(i32::from(byte as i8)))?;
                Ok(Continuation::Advance(2))
            }
            Self::SiPush => {
                let Some(short) = state.current_frame()?.u16_at(1) else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                state.push_operand(Value::int(i32::from(short as i16)))?;
                Ok(Continuation::Advance(3))
            }
            Self::Pop => match pop_checked(state)? {
                Some(_) => Ok(Continuation::Advance(SINGLE_BYTE_OFFSET)),
                None => Ok(halt_with(state, Throwable::Verify)),
            },
            Self::Dup => match state.current_frame_mut()?.operands_mut().dup(0) {
                Ok(()) => Ok(Continuation::Advance(SINGLE_BYTE_OFFSET)),
                Err(Error::OperandStackUnderflow { .. }) => Ok(halt_with(state, Throwable::Verify)),
                Err(error) => Err(error),
            },
            Self::Arithmetic { op, category } => arithmetic(state, *op, *category),
            Self::New => new(state, context),
            Self::ArrayLength => {
                let Some(array) = pop_checked(state)? else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                let id = match target_of(state, &array)?.object() {
                    Ok(id) => id,
                    Err(kind) => return Ok(halt_with(state, kind)),
                };
                let Some(length) = state.object(id)?.array_length().cloned() else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                state.push_operand(Value::Primitive(length))?;
                Ok(Continuation::Advance(SINGLE_BYTE_OFFSET))
            }
            Self::AThrow => {
                let Some(exception) = pop_checked(state)? else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                match target_of(state, &exception)?.object() {
                    Ok(id) => state.throw(id)?,
                    Err(kind) => {
                        state.raise(kind);
                    }
                }
                Ok(Continuation::Halt)
            }
            Self::Return(category) => method_return(state, *category),
        }
    }
}

fn arithmetic(state: &mut State, op: Operator, category: Category) -> Result<Continuation> {
    let (Some(right), Some(left)) = (pop_checked(state)?, pop_checked(state)?) else {
        return Ok(halt_with(state, Throwable::Verify));
    };
    let (Value::Primitive(left), Value::Primitive(right)) = (left, right) else {
        return Ok(halt_with(state, Throwable::Verify));
    };
    if left.ty().category() != category || right.ty().category() != category {
        return Ok(halt_with(state, Throwable::Verify));
    }

    state.push_operand(Value::Primitive(Primitive::binary(op, left, right)))?;
    Ok(Continuation::Advance(SINGLE_BYTE_OFFSET))
}

fn new(state: &mut State, context: &ExecutionContext) -> Result<Continuation> {
    let Some(index) = pool_index(state)? else {
        return Ok(halt_with(state, Throwable::Verify));
    };
    let accessor = state.current_method()?.class.clone();
    let class = match context.classes().class_ref(&accessor, index) {
        Ok(class) => class,
        Err(error) => return Ok(halt_with(state, error.throwable())),
    };

    match state.ensure_class_initialized(&class, context.classes())? {
        ClassInit::Ready => {}
        ClassInit::Suspended => return Ok(Continuation::Suspend { frames: 1 }),
        ClassInit::Raised => return Ok(Continuation::Halt),
    }

    let fields = context.classes().instance_fields(&class)?;
    let mut values = BTreeMap::new();
    for field in fields {
        let ty = field.field_type()?;
        values.insert(field.name, Value::default_for(&ty));
    }

    let object = Object::instance(class, values, state.history_point());
    let Some(id) = state.allocate(object) else {
        return Ok(halt_with(state, Throwable::OutOfMemory));
    };
    trace!(target: "lazy_symex::algo::simple", state = %state.identifier(), %id, "allocated");
    state.push_operand(Value::object(id))?;
    Ok(Continuation::Advance(NEW_OFFSET))
}

/// Pops the executing frame and hands its result to the caller, or ends the
/// branch if the root method returned.
fn method_return(state: &mut State, category: Option<Category>) -> Result<Continuation> {
    let value = match category {
        None => None,
        Some(category) => match pop_checked(state)? {
            Some(value) if value.category() == category => Some(value),
            _ => return Ok(halt_with(state, Throwable::Verify)),
        },
    };

    let frame = state.pop_frame()?;
    if state.frames().is_empty() {
        state.halt(Outcome::Returned(value));
        return Ok(Continuation::Halt);
    }

    state.current_frame_mut()?.resume()?;
    // Trigger and initializer frames run for their side effects only.
    if let (FrameKind::Method, Some(value)) = (frame.kind(), value) {
        state.push_operand(value)?;
    }
    Ok(Continuation::Transfer)
}
