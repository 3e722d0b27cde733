//! Execution of native methods.

use std::{fmt::Debug, sync::Arc};

use tracing::debug;

use crate::{
    algo::{halt_with, Continuation},
    classes::{descriptor::TypeDescriptor, signature::MethodSignature},
    error::execution::Result,
    vm::{
        context::ExecutionContext,
        state::{State, Throwable},
        value::{Origin, Value},
    },
};

/// Runs native methods in place of a bytecode frame.
pub trait NativeExecutor
where
    Self: Debug + Send + Sync,
{
    /// Performs the call of the native `method` on `arguments`, which
    /// include the receiver for instance methods and have already been popped.
    ///
    /// The caller continues `return_offset` bytes past the invoke instruction
    /// unless the executor ends the branch.
    ///
    /// # Errors
    ///
    /// Internal failures only; exceptions of the interpreted program are
    /// raised in `state`.
    fn invoke(
        &self,
        state: &mut State,
        method: &MethodSignature,
        arguments: Vec<Value>,
        return_offset: u32,
        context: &ExecutionContext,
    ) -> Result<Continuation>;
}

/// A shareable [`NativeExecutor`].
pub type DynNativeExecutor = Arc<dyn NativeExecutor>;

/// A native executor that forgets the arguments and makes up an
/// unconstrained result.
///
/// Primitive results are fresh symbols. Reference results are null, since a
/// reference that no load ever produced has nothing to resolve it against.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HavocNativeExecutor;

impl NativeExecutor for HavocNativeExecutor {
    fn invoke(
        &self,
        state: &mut State,
        method: &MethodSignature,
        _: Vec<Value>,
        return_offset: u32,
        _: &ExecutionContext,
    ) -> Result<Continuation> {
        let Ok(return_type) = method.return_type() else {
            return Ok(halt_with(state, Throwable::Verify));
        };
        debug!(target: "lazy_symex::algo::native", state = %state.identifier(), %method, "havocking native call");

        match return_type {
            TypeDescriptor::Primitive(ty) => {
                let origin = Origin::NativeResult {
                    method:   method.clone(),
                    sequence: u32::try_from(state.steps()).unwrap_or(u32::MAX),
                };
                let result = state.fresh_primitive(ty, origin).widen();
                state.push_operand(Value::Primitive(result))?;
            }
            TypeDescriptor::Reference(_) => state.push_operand(Value::null())?,
            TypeDescriptor::Void => {}
        }
        Ok(Continuation::Advance(return_offset))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        algo::{
            native::{HavocNativeExecutor, NativeExecutor},
            Continuation,
        },
        classes::{
            signature::MethodSignature,
            table::ClassTable,
            MethodFlags,
            MethodInfo,
        },
        vm::{
            context::ExecutionContext,
            state::{frame::FrameKind, State},
            value::{PrimitiveType, Value},
        },
    };

    fn state() -> State {
        let method = MethodInfo {
            signature:  MethodSignature::new("pkg/Main", "()V", "run"),
            flags:      MethodFlags::default(),
            max_locals: 0,
            code:       Arc::from(vec![0xb8, 0x00, 0x01, 0xb1]),
        };
        let mut state = State::default();
        state.push_frame(&method, FrameKind::Method, vec![], 0);
        state
    }

    #[test]
    fn havoc_pushes_a_fresh_symbol_of_the_return_type() -> anyhow::Result<()> {
        let context = ExecutionContext::with_defaults(Arc::new(ClassTable::new()));
        let mut state = state();
        let clock = MethodSignature::new("java/lang/System", "()J", "nanoTime");

        let continuation = HavocNativeExecutor.invoke(&mut state, &clock, vec![], 3, &context)?;
        assert_eq!(continuation, Continuation::Advance(3));
        assert!(matches!(
            state.peek_operand(0)?,
            Value::Primitive(p) if p.ty() == PrimitiveType::Long && p.as_symbol().is_some()
        ));

        Ok(())
    }

    #[test]
    fn havoc_returns_null_references_and_nothing_for_void() -> anyhow::Result<()> {
        let context = ExecutionContext::with_defaults(Arc::new(ClassTable::new()));
        let mut state = state();
        let intern = MethodSignature::new("java/lang/String", "()Ljava/lang/String;", "intern");
        let gc = MethodSignature::new("java/lang/Runtime", "()V", "gc");

        HavocNativeExecutor.invoke(&mut state, &intern, vec![Value::null()], 3, &context)?;
        HavocNativeExecutor.invoke(&mut state, &gc, vec![Value::null()], 3, &context)?;
        assert_eq!(state.current_frame()?.operands().size(), 1);
        assert_eq!(state.peek_operand(0)?, &Value::null());

        Ok(())
    }
}
