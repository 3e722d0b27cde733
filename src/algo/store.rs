//! Stores into local slots and fields.

use crate::{
    algo::{
        halt_with,
        load::{is_static_field, resolve_field_operand},
        pop_checked,
        target_of,
        Continuation,
        Sequential,
    },
    classes::signature::FieldSignature,
    constant::{FIELD_ACCESS_OFFSET, LOCAL_INDEXED_OFFSET, SINGLE_BYTE_OFFSET},
    error::execution::{Error, Result},
    vm::{
        context::ExecutionContext,
        state::{ClassInit, State, Throwable},
        value::{Category, Value},
    },
};

/// The XSTORE family. The slot is implied by the opcode when set.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StoreLocal {
    pub category: Category,
    pub slot:     Option<u8>,
}

impl Sequential for StoreLocal {
    fn apply(&self, state: &mut State, _: &ExecutionContext) -> Result<Continuation> {
        let (slot, offset) = match self.slot {
            Some(slot) => (slot, SINGLE_BYTE_OFFSET),
            None => match state.current_frame()?.byte_at(1) {
                Some(slot) => (slot, LOCAL_INDEXED_OFFSET),
                None => return Ok(halt_with(state, Throwable::Verify)),
            },
        };
        let Some(value) = pop_checked(state)? else {
            return Ok(halt_with(state, Throwable::Verify));
        };
        if value.category() != self.category {
            return Ok(halt_with(state, Throwable::Verify));
        }

        match state.set_local(usize::from(slot), value) {
            Ok(()) => Ok(Continuation::Advance(offset)),
            Err(Error::NoSuchLocal { .. }) => Ok(halt_with(state, Throwable::Verify)),
            Err(error) => Err(error),
        }
    }
}

/// PUTFIELD.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PutField;

impl Sequential for PutField {
    fn apply(&self, state: &mut State, context: &ExecutionContext) -> Result<Continuation> {
        let field = match resolve_field_operand(state, context.classes())? {
            Ok(field) => field,
            Err(kind) => return Ok(halt_with(state, kind)),
        };
        match is_static_field(context.classes(), &field) {
            Ok(false) => {}
            Ok(true) => return Ok(halt_with(state, Throwable::IncompatibleClassChange)),
            Err(error) => return Err(error.into()),
        }

        let (Some(value), Some(receiver)) = (pop_checked(state)?, pop_checked(state)?) else {
            return Ok(halt_with(state, Throwable::Verify));
        };
        if !fits(&field, &value) {
            return Ok(halt_with(state, Throwable::Verify));
        }
        let id = match target_of(state, &receiver)?.object() {
            Ok(id) => id,
            Err(kind) => return Ok(halt_with(state, kind)),
        };

        state.heap_mut().write(id, &field.name, value)?;
        Ok(Continuation::Advance(FIELD_ACCESS_OFFSET))
    }
}

/// PUTSTATIC.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PutStatic;

impl Sequential for PutStatic {
    fn apply(&self, state: &mut State, context: &ExecutionContext) -> Result<Continuation> {
        let field = match resolve_field_operand(state, context.classes())? {
            Ok(field) => field,
            Err(kind) => return Ok(halt_with(state, kind)),
        };
        match is_static_field(context.classes(), &field) {
            Ok(true) => {}
            Ok(false) => return Ok(halt_with(state, Throwable::IncompatibleClassChange)),
            Err(error) => return Err(error.into()),
        }

        // The instruction runs again after an initializer, so nothing may be
        // popped before this point.
        match state.ensure_class_initialized(&field.class, context.classes())? {
            ClassInit::Ready => {}
            ClassInit::Suspended => return Ok(Continuation::Suspend { frames: 1 }),
            ClassInit::Raised => return Ok(Continuation::Halt),
        }

        let Some(value) = pop_checked(state)? else {
            return Ok(halt_with(state, Throwable::Verify));
        };
        if !fits(&field, &value) {
            return Ok(halt_with(state, Throwable::Verify));
        }
        let statics = state
            .statics_of(&field.class)
            .ok_or_else(|| Error::NoSuchStaticArea {
                class: field.class.to_string(),
            })?;

        state.heap_mut().write(statics, &field.name, value)?;
        Ok(Continuation::Advance(FIELD_ACCESS_OFFSET))
    }
}

/// Checks whether `value` belongs to the operand stack category of `field`.
fn fits(field: &FieldSignature, value: &Value) -> bool {
    field
        .field_type()
        .map(|ty| ty.category() == Some(value.category()))
        .unwrap_or(false)
}
