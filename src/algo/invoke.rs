//! Method invocation.
//!
//! All four dispatch kinds share one algorithm, parameterized by whether the
//! instruction names an interface method, whether it bypasses virtual
//! selection, and whether it calls a static method. The steps run in a fixed
//! order, and every check that can raise happens before anything is popped,
//! so a raising invocation leaves the caller's operand stack as it found it.

use tracing::debug;

use crate::{
    algo::{
        halt_with,
        meta::Override,
        pool_index,
        pop_many_checked,
        target_of,
        Continuation,
        Sequential,
    },
    classes::signature::{ClassName, MethodSignature},
    constant::{
        INSTANCE_INITIALIZER_NAME,
        INVOKE_DYNAMIC_INTERFACE_OFFSET,
        INVOKE_SPECIAL_STATIC_VIRTUAL_OFFSET,
    },
    error::execution::Result,
    vm::{
        context::ExecutionContext,
        state::{frame::FrameKind, ClassInit, State, Throwable},
        value::Value,
        InitializationPolicy,
        SpecialDispatchPolicy,
    },
};

/// The INVOKEX family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Invoke {
    pub is_interface: bool,
    pub is_special:   bool,
    pub is_static:    bool,
}

impl Invoke {
    /// INVOKEINTERFACE.
    pub const INTERFACE: Self = Self::new(true, false, false);

    /// INVOKESPECIAL.
    pub const SPECIAL: Self = Self::new(false, true, false);

    /// INVOKESTATIC.
    pub const STATIC: Self = Self::new(false, false, true);

    /// INVOKEVIRTUAL.
    pub const VIRTUAL: Self = Self::new(false, false, false);

    #[must_use]
    pub const fn new(is_interface: bool, is_special: bool, is_static: bool) -> Self {
        Self {
            is_interface,
            is_special,
            is_static,
        }
    }

    /// Gets the length of the instruction in bytes, which is also how far the
    /// caller's program counter moves when the call returns.
    #[must_use]
    pub fn length(&self) -> u32 {
        if self.is_interface {
            INVOKE_DYNAMIC_INTERFACE_OFFSET
        } else {
            INVOKE_SPECIAL_STATIC_VIRTUAL_OFFSET
        }
    }

    /// Checks whether the implementation is selected by the receiver's
    /// runtime class.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        !self.is_special && !self.is_static
    }
}

impl Sequential for Invoke {
    #[allow(clippy::too_many_lines)] // The steps only make sense in sequence
    fn apply(&self, state: &mut State, context: &ExecutionContext) -> Result<Continuation> {
        let classes = context.classes();
        let config = context.config();
        let offset = self.length();

        let Some(index) = pool_index(state)? else {
            return Ok(halt_with(state, Throwable::Verify));
        };
        let accessor = state.current_method()?.class.clone();
        let resolved = match classes
            .method_ref(&accessor, index, self.is_interface)
            .and_then(|method| classes.resolve_method(&accessor, &method, self.is_interface))
        {
            Ok(method) => method,
            Err(error) => return Ok(halt_with(state, error.throwable())),
        };

        match classes.is_method_static(&resolved) {
            Ok(is_static) if is_static == self.is_static => {}
            Ok(_) => return Ok(halt_with(state, Throwable::IncompatibleClassChange)),
            Err(error) => return Err(error.into()),
        }

        if self.is_special
            && !special_call_allowed(config.special_dispatch_policy, &accessor, &resolved, context)
        {
            return Ok(halt_with(state, Throwable::IllegalAccess));
        }

        let Ok(parameters) = resolved.parameter_types() else {
            return Ok(halt_with(state, Throwable::Verify));
        };

        // The receiver sits below the arguments and stays there until the
        // call actually happens.
        let receiver = if self.is_static {
            None
        } else {
            let Ok(receiver) = state.peek_operand(parameters.len()).cloned() else {
                return Ok(halt_with(state, Throwable::Verify));
            };
            match target_of(state, &receiver)?.object() {
                Ok(id) => Some(id),
                Err(kind) => return Ok(halt_with(state, kind)),
            }
        };

        if self.is_static || config.initialization_policy == InitializationPolicy::AllDispatchKinds {
            match state.ensure_class_initialized(&resolved.class, classes)? {
                ClassInit::Ready => {}
                ClassInit::Suspended => return Ok(Continuation::Suspend { frames: 1 }),
                ClassInit::Raised => return Ok(Continuation::Halt),
            }
        }

        let implementation = match receiver {
            Some(id) if self.is_virtual() => {
                let class = state.object(id)?.class().clone();
                classes.method_implementation(&class, &resolved)?
            }
            _ => Some(resolved.clone()),
        };

        let key = implementation.as_ref().unwrap_or(&resolved);
        let (implementation, replaced) = match context.overrides().get(key) {
            Some(Override::Meta(algorithm)) => {
                let method = key.clone();
                let Some(arguments) = self.pop_arguments(state, parameters.len())? else {
                    return Ok(halt_with(state, Throwable::Verify));
                };
                return algorithm.execute(state, &method, arguments, offset, context);
            }
            Some(Override::Base(replacement)) => {
                debug!(target: "lazy_symex::algo::invoke", from = %key, to = %replacement, "base override");
                (Some(replacement.clone()), true)
            }
            None => (implementation, false),
        };

        let Some(implementation) = implementation else {
            return Ok(halt_with(state, Throwable::AbstractMethod));
        };
        // Only a replacement can name a method the hierarchy has never seen.
        let info = match classes.method(&implementation) {
            Ok(info) => info,
            Err(error) if replaced => return Ok(halt_with(state, error.throwable())),
            Err(error) => return Err(error.into()),
        };
        if info.flags.is_abstract {
            return Ok(halt_with(state, Throwable::AbstractMethod));
        }

        let Some(arguments) = self.pop_arguments(state, parameters.len())? else {
            return Ok(halt_with(state, Throwable::Verify));
        };
        let categories = parameters.iter().map(|ty| ty.category());
        let passed = arguments.iter().skip(usize::from(!self.is_static));
        if passed.zip(categories).any(|(value, category)| category != Some(value.category())) {
            return Ok(halt_with(state, Throwable::Verify));
        }

        debug!(
            target: "lazy_symex::algo::invoke",
            state = %state.identifier(),
            method = %implementation,
            depth = state.call_depth(),
            "invoking"
        );
        if info.flags.is_native {
            return context
                .native_executor()
                .invoke(state, &implementation, arguments, offset, context);
        }

        if state.push_frame(&info, FrameKind::Method, arguments, offset) {
            Ok(Continuation::Transfer)
        } else {
            Ok(Continuation::Halt)
        }
    }
}

impl Invoke {
    /// Pops the arguments of a call with `parameters` declared parameters,
    /// and the receiver below them unless the call is static.
    fn pop_arguments(&self, state: &mut State, parameters: usize) -> Result<Option<Vec<Value>>> {
        let count = parameters + usize::from(!self.is_static);
        pop_many_checked(state, count)
    }
}

/// Checks whether `method` may be the target of a special call from code in
/// `accessor` under `policy`. Instance initializers are always allowed.
#[must_use]
pub fn special_call_allowed(
    policy: SpecialDispatchPolicy,
    accessor: &ClassName,
    method: &MethodSignature,
    context: &ExecutionContext,
) -> bool {
    policy == SpecialDispatchPolicy::StaticnessOnly
        || method.name == INSTANCE_INITIALIZER_NAME
        || context.classes().is_subclass(accessor, &method.class)
}
