//! Method activations.

use std::sync::Arc;

use crate::{
    classes::{signature::MethodSignature, MethodInfo},
    error::execution::{Error, Result},
    vm::{state::stack::Stack, value::Value},
};

/// Why a frame was pushed.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FrameKind {
    /// An ordinary call, or the root method.
    Method,

    /// The body of a trigger rule. Its result, if any, is discarded.
    Trigger,

    /// A class initializer. Its caller re-executes the instruction that
    /// required the initialization once it returns.
    ClassInitializer,
}

/// One method activation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    method: MethodSignature,
    kind:   FrameKind,
    code:   Arc<[u8]>,

    program_counter: u32,

    /// Where execution of this frame continues when the frame above it
    /// returns.
    return_program_counter: u32,

    locals:   Vec<Option<Value>>,
    operands: Stack,
}

impl Frame {
    /// Creates a frame for `method` with `arguments` in its first local slots.
    ///
    /// The frame gets at least one slot per argument even if the method
    /// declares fewer.
    #[must_use]
    pub fn new(
        method: &MethodInfo,
        kind: FrameKind,
        arguments: Vec<Value>,
        operand_limit: usize,
    ) -> Self {
        let slots = usize::from(method.max_locals).max(arguments.len());
        let mut locals: Vec<Option<Value>> = arguments.into_iter().map(Some).collect();
        locals.resize(slots, None);

        Self {
            method: method.signature.clone(),
            kind,
            code: method.code.clone(),
            program_counter: 0,
            return_program_counter: 0,
            locals,
            operands: Stack::new(operand_limit),
        }
    }

    #[must_use]
    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    #[must_use]
    pub fn program_counter(&self) -> u32 {
        self.program_counter
    }

    #[must_use]
    pub fn return_program_counter(&self) -> u32 {
        self.return_program_counter
    }

    /// Moves the program counter to `target`.
    ///
    /// # Errors
    ///
    /// If `target` is outside of the code.
    pub fn set_program_counter(&mut self, target: u32) -> Result<()> {
        if target as usize >= self.code.len() {
            return Err(Error::ProgramCounterOutOfBounds {
                requested: target,
                available: self.code.len(),
            });
        }
        self.program_counter = target;
        Ok(())
    }

    /// Records that, once the frame above returns, execution continues
    /// `offset` bytes past the current instruction.
    pub fn set_return_offset(&mut self, offset: u32) {
        self.return_program_counter = self.program_counter + offset;
    }

    /// Continues at the recorded return program counter.
    ///
    /// # Errors
    ///
    /// If the recorded program counter is outside of the code.
    pub fn resume(&mut self) -> Result<()> {
        self.set_program_counter(self.return_program_counter)
    }

    /// Reads the byte `offset` bytes past the program counter.
    #[must_use]
    pub fn byte_at(&self, offset: u32) -> Option<u8> {
        let index = self.program_counter.checked_add(offset)?;
        self.code.get(index as usize).copied()
    }

    /// Reads the big-endian two-byte operand `offset` bytes past the program
    /// counter.
    #[must_use]
    pub fn u16_at(&self, offset: u32) -> Option<u16> {
        let high = self.byte_at(offset)?;
        let low = self.byte_at(offset + 1)?;
        Some(u16::from_be_bytes([high, low]))
    }

    /// Gets the value in local `slot`.
    ///
    /// # Errors
    ///
    /// If the slot does not exist. An unset slot yields `Ok(None)`.
    pub fn local(&self, slot: usize) -> Result<Option<&Value>> {
        self.locals
            .get(slot)
            .map(Option::as_ref)
            .ok_or(Error::NoSuchLocal {
                slot,
                available: self.locals.len(),
            })
    }

    /// Sets local `slot` to `value`.
    ///
    /// # Errors
    ///
    /// If the slot does not exist.
    pub fn set_local(&mut self, slot: usize, value: Value) -> Result<()> {
        let available = self.locals.len();
        let cell = self
            .locals
            .get_mut(slot)
            .ok_or(Error::NoSuchLocal { slot, available })?;
        *cell = Some(value);
        Ok(())
    }

    #[must_use]
    pub fn operands(&self) -> &Stack {
        &self.operands
    }

    #[must_use]
    pub fn operands_mut(&mut self) -> &mut Stack {
        &mut self.operands
    }
}
