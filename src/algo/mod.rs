//! The algorithms that give each opcode its symbolic semantics.
//!
//! Every algorithm consumes the state it executes on and returns its
//! successors. Instructions whose effect does not depend on a symbolic choice
//! return exactly one successor. Those that do follow a decide, refine and
//! update protocol driven by [`run`]:
//!
//! 1. **Decide**: ask the decision procedure for the feasible alternatives.
//! 2. **Refine**: give each alternative its own successor and record the
//!    assumptions that the alternative makes in that successor.
//! 3. **Update**: perform the instruction's effect in each successor.
//!
//! Each successor carries a [`Continuation`] telling the engine how execution
//! proceeds in it.

pub mod array;
pub mod dispatch;
pub mod invoke;
pub mod load;
pub mod meta;
pub mod native;
pub mod simple;
pub mod store;

use std::{collections::BTreeSet, fmt::Display};

use tracing::debug;

use crate::{
    error::execution::{Error, Result},
    vm::{
        context::ExecutionContext,
        state::{State, Throwable},
        value::{ObjectId, Reference, Value},
    },
};

/// How execution proceeds in a successor once its algorithm is done.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Continuation {
    /// The instruction completed and the program counter moves this many
    /// bytes forward.
    Advance(u32),

    /// The instruction moved control itself, by pushing or popping a frame.
    Transfer,

    /// The instruction pushed `frames` frames that have to run first. The
    /// frame that executed the instruction continues from the program counter
    /// it recorded when they have all returned.
    Suspend { frames: usize },

    /// The branch has ended.
    Halt,
}

/// One state produced by executing an instruction.
#[derive(Clone, Debug)]
pub struct Successor {
    pub state:        State,
    pub continuation: Continuation,
}

impl Successor {
    #[must_use]
    pub fn new(state: State, continuation: Continuation) -> Self {
        Self {
            state,
            continuation,
        }
    }
}

/// The result of reading an instruction's operands.
pub(crate) enum Operands<T> {
    /// The operands were read and the algorithm continues.
    Ready(T),

    /// The instruction finished while reading its operands, for instance by
    /// raising an exception.
    Done(Continuation),
}

/// An algorithm that follows the decide, refine and update protocol.
pub(crate) trait Branching {
    /// The operands the algorithm reads before deciding.
    type Operands;

    /// The alternatives of the decision, in visitation order.
    type Alternative: Ord + Display;

    /// Reads the operands of the instruction.
    fn read(&self, state: &mut State, context: &ExecutionContext)
        -> Result<Operands<Self::Operands>>;

    /// Enumerates the feasible alternatives.
    fn decide(
        &self,
        state: &State,
        operands: &Self::Operands,
        context: &ExecutionContext,
    ) -> Result<BTreeSet<Self::Alternative>>;

    /// Records the assumptions of `alternative` in `state`.
    ///
    /// Returning [`Error::Contradiction`] prunes the successor.
    fn refine(
        &self,
        state: &mut State,
        operands: &Self::Operands,
        alternative: &Self::Alternative,
        context: &ExecutionContext,
    ) -> Result<()>;

    /// Performs the effect of the instruction under `alternative`.
    fn update(
        &self,
        state: &mut State,
        operands: &Self::Operands,
        alternative: Self::Alternative,
        context: &ExecutionContext,
    ) -> Result<Continuation>;
}

/// Executes `algorithm` on `state`, returning one successor per feasible
/// alternative in visitation order.
///
/// Every successor but the last is a fork of `state`; the last reuses it. A
/// decision with a single alternative does not fork at all.
///
/// # Errors
///
/// If any step fails, or if the decision has no alternative at all.
pub(crate) fn run<B: Branching>(
    algorithm: &B,
    mut state: State,
    context: &ExecutionContext,
) -> Result<Vec<Successor>> {
    let operands = match algorithm.read(&mut state, context)? {
        Operands::Ready(operands) => operands,
        Operands::Done(continuation) => return Ok(vec![Successor::new(state, continuation)]),
    };

    let alternatives = algorithm.decide(&state, &operands, context)?;
    if alternatives.is_empty() {
        return Err(Error::NoAlternatives {
            choice: format!("pc {}", state.program_counter()?),
        });
    }

    // Every alternative but the last works on a fork, and the last one takes
    // the state itself.
    let count = alternatives.len();
    let label = |i: usize| u32::try_from(i + 1).unwrap_or(u32::MAX);
    let mut alternatives = alternatives.into_iter().enumerate();
    let last = alternatives.next_back();
    let mut branches: Vec<_> = alternatives
        .map(|(i, alternative)| (state.fork(label(i), alternative.to_string()), alternative))
        .collect();
    if let Some((i, alternative)) = last {
        if count > 1 {
            state.enter_branch(label(i), alternative.to_string());
        }
        branches.push((state, alternative));
    }

    let mut successors = Vec::with_capacity(count);
    for (mut branch, alternative) in branches {
        match algorithm.refine(&mut branch, &operands, &alternative, context) {
            Ok(()) => {}
            Err(error) if error.is_contradiction() => {
                debug!(target: "lazy_symex::algo", state = %branch.identifier(), "pruned by contradiction");
                continue;
            }
            Err(error) => return Err(error),
        }
        if !context.decision_procedure().is_satisfiable(branch.path_condition()) {
            debug!(target: "lazy_symex::algo", state = %branch.identifier(), "pruned as unsatisfiable");
            continue;
        }
        if branch.is_halted() {
            successors.push(Successor::new(branch, Continuation::Halt));
            continue;
        }

        let continuation = algorithm.update(&mut branch, &operands, alternative, context)?;
        successors.push(Successor::new(branch, continuation));
    }

    if count > 1 {
        debug!(target: "lazy_symex::algo", alternatives = count, retained = successors.len(), "forked");
    }
    Ok(successors)
}

/// An algorithm whose effect never depends on a symbolic choice.
pub(crate) trait Sequential {
    /// Performs the effect of the instruction on `state`.
    ///
    /// Returning [`Error::Contradiction`] prunes the state.
    fn apply(&self, state: &mut State, context: &ExecutionContext) -> Result<Continuation>;
}

/// Executes `algorithm` on `state`, which becomes its only successor.
///
/// # Errors
///
/// If the algorithm fails.
pub(crate) fn step<S: Sequential>(
    algorithm: &S,
    mut state: State,
    context: &ExecutionContext,
) -> Result<Vec<Successor>> {
    match algorithm.apply(&mut state, context) {
        Ok(continuation) => Ok(vec![Successor::new(state, continuation)]),
        Err(error) if error.is_contradiction() => {
            debug!(target: "lazy_symex::algo", state = %state.identifier(), "pruned by contradiction");
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

/// Raises `kind` in `state`, ending the branch.
pub(crate) fn halt_with(state: &mut State, kind: Throwable) -> Continuation {
    state.raise(kind);
    Continuation::Halt
}

/// Raises `kind` in `state`, ending the instruction.
pub(crate) fn raise<T>(state: &mut State, kind: Throwable) -> Operands<T> {
    state.raise(kind);
    Operands::Done(Continuation::Halt)
}

/// Reads the two-byte constant pool index that follows the opcode.
pub(crate) fn pool_index(state: &State) -> Result<Option<u16>> {
    Ok(state.current_frame()?.u16_at(1))
}

/// Pops the top operand, or returns [`None`] if the stack is empty, which the
/// caller reports as a verify error.
pub(crate) fn pop_checked(state: &mut State) -> Result<Option<Value>> {
    match state.pop_operand() {
        Ok(value) => Ok(Some(value)),
        Err(Error::OperandStackUnderflow { .. }) => Ok(None),
        Err(error) => Err(error),
    }
}

/// Pops the top `count` operands like [`pop_checked`].
pub(crate) fn pop_many_checked(state: &mut State, count: usize) -> Result<Option<Vec<Value>>> {
    match state.pop_operands(count) {
        Ok(values) => Ok(Some(values)),
        Err(Error::OperandStackUnderflow { .. }) => Ok(None),
        Err(error) => Err(error),
    }
}

/// What a reference operand turned out to denote.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Target {
    Object(ObjectId),
    Null,

    /// The operand was not a reference at all.
    NotReference,
}

impl Target {
    /// Gets the object, or the exception that using the operand as an object
    /// raises.
    pub(crate) fn object(self) -> std::result::Result<ObjectId, Throwable> {
        match self {
            Self::Object(id) => Ok(id),
            Self::Null => Err(Throwable::NullPointer),
            Self::NotReference => Err(Throwable::Verify),
        }
    }
}

/// Works out what the operand `value` denotes.
///
/// # Errors
///
/// If `value` is a symbolic reference that was never resolved.
pub(crate) fn target_of(state: &State, value: &Value) -> Result<Target> {
    match value {
        Value::Reference(reference) => Ok(match dereference(state, reference)? {
            Some(id) => Target::Object(id),
            None => Target::Null,
        }),
        Value::Primitive(_) => Ok(Target::NotReference),
    }
}

fn dereference(state: &State, reference: &Reference) -> Result<Option<ObjectId>> {
    state.dereference(reference)
}
