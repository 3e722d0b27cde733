//! Meta-level and base-level overrides of methods.
//!
//! Some methods are better simulated by the engine than executed: their
//! bytecode is unavailable, irrelevant, or would drag half of a runtime
//! library into the exploration. The [`Overrides`] table maps such methods
//! either onto an engine algorithm ([`Override::Meta`]) or onto another
//! method whose body runs instead ([`Override::Base`]). It is declared once,
//! up front, and never changes during an exploration.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use tracing::debug;

use crate::{
    algo::{halt_with, target_of, Continuation},
    classes::signature::MethodSignature,
    constant::STACK_TRACE_FIELD_NAME,
    error::execution::{Error, Result},
    vm::{
        context::ExecutionContext,
        state::{Outcome, State, Throwable},
        value::{Category, Operator, Primitive, Value},
    },
};

/// A user-supplied meta-level algorithm.
pub trait MetaBehavior
where
    Self: Debug + Send + Sync,
{
    /// Simulates a call of `method` on `arguments`, which include the
    /// receiver of instance methods and have already been popped.
    ///
    /// Unless the branch ends, the caller continues `return_offset` bytes
    /// past the invoke instruction.
    ///
    /// # Errors
    ///
    /// [`Error::Contradiction`] to prune the branch, internal failures
    /// otherwise.
    fn execute(
        &self,
        state: &mut State,
        method: &MethodSignature,
        arguments: Vec<Value>,
        return_offset: u32,
        context: &ExecutionContext,
    ) -> Result<Continuation>;
}

/// The engine algorithms that a method can be replaced with.
#[derive(Clone, Debug)]
pub enum MetaAlgorithm {
    /// Discards the arguments and returns the default value of the return
    /// type.
    Ignore,

    /// Assumes that the last argument, an int, is not zero. The branch is
    /// pruned if it cannot be.
    Assume,

    /// Ends the branch as a failed assertion.
    Fail,

    /// Ends the branch as successful.
    Succeed,

    /// Clears the receiver's stack trace and returns the receiver.
    FillInStackTrace,

    Custom(Arc<dyn MetaBehavior>),
}

impl MetaAlgorithm {
    /// Runs the algorithm in place of `method`.
    ///
    /// # Errors
    ///
    /// [`Error::Contradiction`] if the call makes the path infeasible, and
    /// internal failures otherwise.
    pub fn execute(
        &self,
        state: &mut State,
        method: &MethodSignature,
        arguments: Vec<Value>,
        return_offset: u32,
        context: &ExecutionContext,
    ) -> Result<Continuation> {
        debug!(target: "lazy_symex::algo::meta", state = %state.identifier(), %method, algorithm = ?self, "meta call");
        match self {
            Self::Ignore => {
                let Ok(return_type) = method.return_type() else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                if return_type.category().is_some() {
                    state.push_operand(Value::default_for(&return_type))?;
                }
                Ok(Continuation::Advance(return_offset))
            }
            Self::Assume => {
                let Some(Value::Primitive(condition)) = arguments.last() else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                if condition.ty().category() != Category::Int {
                    return Ok(halt_with(state, Throwable::Verify));
                }
                let holds = context.decision_procedure().simplify(Primitive::binary(
                    Operator::Ne,
                    condition.clone(),
                    Primitive::int(0),
                ));
                match holds.as_const() {
                    Some(0) => return Err(Error::Contradiction),
                    Some(_) => {}
                    None => state.assume(holds),
                }
                if !context.decision_procedure().is_satisfiable(state.path_condition()) {
                    return Err(Error::Contradiction);
                }
                Ok(Continuation::Advance(return_offset))
            }
            Self::Fail => {
                state.halt(Outcome::AssertionFailed);
                Ok(Continuation::Halt)
            }
            Self::Succeed => {
                state.halt(Outcome::Succeeded);
                Ok(Continuation::Halt)
            }
            Self::FillInStackTrace => {
                let Some(receiver) = arguments.first() else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                let id = match target_of(state, receiver)?.object() {
                    Ok(id) => id,
                    Err(kind) => return Ok(halt_with(state, kind)),
                };
                state
                    .heap_mut()
                    .write(id, STACK_TRACE_FIELD_NAME, Value::null())?;
                state.push_operand(receiver.clone())?;
                Ok(Continuation::Advance(return_offset))
            }
            Self::Custom(behavior) => {
                behavior.execute(state, method, arguments, return_offset, context)
            }
        }
    }
}

/// What an overridden method is replaced with.
#[derive(Clone, Debug)]
pub enum Override {
    /// An engine algorithm.
    Meta(MetaAlgorithm),

    /// The body of another method with the same parameters.
    Base(MethodSignature),
}

/// The declarative table of method overrides.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    table: BTreeMap<MethodSignature, Override>,
}

impl Overrides {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the table of overrides that every exploration needs for the
    /// runtime library's own natives.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_meta(
                MethodSignature::new(
                    "java/lang/Throwable",
                    "()Ljava/lang/Throwable;",
                    "fillInStackTrace",
                ),
                MetaAlgorithm::FillInStackTrace,
            )
            .with_meta(
                MethodSignature::new("java/lang/Object", "()V", "registerNatives"),
                MetaAlgorithm::Ignore,
            )
            .with_meta(
                MethodSignature::new("java/lang/System", "()V", "registerNatives"),
                MetaAlgorithm::Ignore,
            )
    }

    /// Adds an override, replacing any earlier one for `method`.
    pub fn add(&mut self, method: MethodSignature, with: Override) {
        self.table.insert(method, with);
    }

    #[must_use]
    pub fn with_meta(mut self, method: MethodSignature, algorithm: MetaAlgorithm) -> Self {
        self.add(method, Override::Meta(algorithm));
        self
    }

    #[must_use]
    pub fn with_base(mut self, method: MethodSignature, replacement: MethodSignature) -> Self {
        self.add(method, Override::Base(replacement));
        self
    }

    #[must_use]
    pub fn get(&self, method: &MethodSignature) -> Option<&Override> {
        self.table.get(method)
    }

    #[must_use]
    pub fn is_meta(&self, method: &MethodSignature) -> bool {
        matches!(self.get(method), Some(Override::Meta(_)))
    }

    #[must_use]
    pub fn meta_algorithm(&self, method: &MethodSignature) -> Option<&MetaAlgorithm> {
        match self.get(method)? {
            Override::Meta(algorithm) => Some(algorithm),
            Override::Base(_) => None,
        }
    }

    #[must_use]
    pub fn is_base_overridden(&self, method: &MethodSignature) -> bool {
        matches!(self.get(method), Some(Override::Base(_)))
    }

    #[must_use]
    pub fn base_override(&self, method: &MethodSignature) -> Option<&MethodSignature> {
        match self.get(method)? {
            Override::Base(replacement) => Some(replacement),
            Override::Meta(_) => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl FromIterator<(MethodSignature, Override)> for Overrides {
    fn from_iter<T: IntoIterator<Item = (MethodSignature, Override)>>(iter: T) -> Self {
        Self {
            table: iter.into_iter().collect(),
        }
    }
}
