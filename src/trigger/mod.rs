//! The trigger manager runs user-declared rules when references are resolved.
//!
//! A rule body runs as an ordinary frame pushed on top of the frame whose
//! load resolved the reference. The load itself has already pushed its value,
//! and the frame that performed it only continues past the load once every
//! trigger frame has returned.

pub mod rule;

use std::sync::Arc;

use tracing::debug;

use crate::{
    classes::ClassHierarchy,
    decision::DecisionAlternative,
    error::execution::{Error, Result},
    trigger::rule::{TriggerRule, TriggerRules},
    vm::{
        state::{frame::FrameKind, State},
        value::{Reference, Value},
    },
};

/// Pushes the frames of the trigger rules that fire on a resolution.
///
/// The rules are read-only once exploration starts and are shared by every
/// branch.
#[derive(Clone, Debug, Default)]
pub struct TriggerManager {
    rules: Arc<TriggerRules>,
}

impl TriggerManager {
    #[must_use]
    pub fn new(rules: TriggerRules) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &TriggerRules {
        &self.rules
    }

    /// Pushes a frame for every rule that fires on `alternative`, which
    /// `state` has just taken.
    ///
    /// Frames are pushed in declaration order, so the rule declared last runs
    /// first and each trigger frame falls through to the one below it. When
    /// they have all returned, the frame that performed the load continues
    /// `return_offset` bytes past its current instruction.
    ///
    /// Returns `true` if any frame was pushed, in which case the caller must
    /// not advance its program counter itself. If pushing overflows the call
    /// stack the state has halted with an exception, and `true` is returned
    /// as well.
    ///
    /// # Errors
    ///
    /// If a rule names a method that does not exist or that the binding
    /// cannot be passed to.
    pub fn load_trigger_frames(
        &self,
        state: &mut State,
        alternative: &DecisionAlternative,
        return_offset: u32,
        classes: &dyn ClassHierarchy,
    ) -> Result<bool> {
        let Some(reference) = alternative.reference() else {
            return Ok(false);
        };
        if self.rules.is_empty() {
            return Ok(false);
        }

        let bound = state.resolution(reference).unwrap_or(Reference::Null);
        let bound_class = match state.dereference(&bound)? {
            Some(id) => Some(state.object(id)?.class().clone()),
            None => None,
        };

        let firing: Vec<&TriggerRule> = self
            .rules
            .iter()
            .filter(|rule| rule.fires_on(alternative, bound_class.as_ref(), classes))
            .collect();
        if firing.is_empty() {
            return Ok(false);
        }

        let mut offset = return_offset;
        for rule in firing {
            let method = classes.method(rule.method())?;
            if !method.flags.is_static {
                return Err(Error::TypeMismatch {
                    expected: "a static trigger method".into(),
                    found:    method.signature.to_string(),
                });
            }
            let arguments = match method.signature.parameter_types()?.len() {
                0 => Vec::new(),
                1 => vec![Value::Reference(bound.clone())],
                found => {
                    return Err(Error::ArgumentMismatch {
                        method: method.signature.to_string(),
                        expected: 1,
                        found,
                    })
                }
            };

            debug!(
                target: "lazy_symex::trigger",
                state = %state.identifier(),
                alternative = %alternative,
                method = %method.signature,
                "loading trigger frame"
            );
            if !state.push_frame(&method, FrameKind::Trigger, arguments, offset) {
                return Ok(true);
            }

            // Every later frame returns to the start of the one below it.
            offset = 0;
        }

        Ok(true)
    }

    /// Pushes the frames of the rules that fire on the resolution of the root
    /// method's receiver, before the root method executes its first
    /// instruction.
    ///
    /// # Errors
    ///
    /// As [`Self::load_trigger_frames`].
    pub fn load_trigger_frames_root(
        &self,
        state: &mut State,
        alternative: &DecisionAlternative,
        classes: &dyn ClassHierarchy,
    ) -> Result<bool> {
        self.load_trigger_frames(state, alternative, 0, classes)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        classes::{
            signature::{ClassName, MethodSignature},
            table::{ClassBuilder, ClassTable},
            MethodFlags,
            MethodInfo,
        },
        decision::DecisionAlternative,
        trigger::{
            rule::{TriggerEvent, TriggerRule, TriggerRules},
            TriggerManager,
        },
        vm::{
            state::{frame::FrameKind, State},
            value::{Origin, Value},
        },
    };

    fn classes() -> ClassTable {
        let hook = MethodFlags {
            is_static: true,
            ..MethodFlags::default()
        };
        ClassTable::new()
            .with(ClassBuilder::new("pkg/Node").field("next", "Lpkg/Node;").build())
            .with(
                ClassBuilder::new("pkg/Hooks")
                    .method("first", "(Lpkg/Node;)V", hook, 1, vec![0xb1])
                    .method("second", "()V", hook, 0, vec![0xb1])
                    .build(),
            )
    }

    fn caller() -> MethodInfo {
        MethodInfo {
            signature:  MethodSignature::new("pkg/Node", "()V", "run"),
            flags:      MethodFlags::default(),
            max_locals: 1,
            code:       Arc::from(vec![0x2a, 0xb4, 0x00, 0x01, 0xb1]),
        }
    }

    fn rules() -> anyhow::Result<TriggerRules> {
        Ok(TriggerRules::new()
            .with(TriggerRule::new(
                TriggerEvent::OnExpansion,
                r".*\.next",
                MethodSignature::new("pkg/Hooks", "(Lpkg/Node;)V", "first"),
            )?)
            .with(TriggerRule::new(
                TriggerEvent::Any,
                r".*",
                MethodSignature::new("pkg/Hooks", "()V", "second"),
            )?))
    }

    #[test]
    fn last_declared_rule_runs_first() -> anyhow::Result<()> {
        let classes = classes();
        let manager = TriggerManager::new(rules()?);
        let mut state = State::default();
        state.push_frame(&caller(), FrameKind::Method, vec![], 0);
        state.advance(1)?;

        let origin = Origin::field(Arc::new(Origin::root("this")), "next");
        let reference = state.fresh_reference(ClassName::new("pkg/Node"), origin);
        let id = state
            .assume_expands(&reference, &ClassName::new("pkg/Node"), &classes)?
            .expect("heap has room");
        let alternative = DecisionAlternative::Expands {
            class: ClassName::new("pkg/Node"),
            reference,
        };

        assert!(manager.load_trigger_frames(&mut state, &alternative, 3, &classes)?);
        let frames = state.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].method().name, "second");
        assert_eq!(frames[1].method().name, "first");
        assert_eq!(frames[1].local(0)?, Some(&Value::object(id)));
        assert_eq!(frames[1].kind(), FrameKind::Trigger);

        // The load resumes after itself once both triggers are done.
        assert_eq!(frames[0].return_program_counter(), 4);
        assert_eq!(frames[1].return_program_counter(), 0);

        Ok(())
    }

    #[test]
    fn nothing_fires_on_trivial_alternatives() -> anyhow::Result<()> {
        let classes = classes();
        let manager = TriggerManager::new(rules()?);
        let mut state = State::default();
        state.push_frame(&caller(), FrameKind::Method, vec![], 0);

        let resolved = DecisionAlternative::Resolved {
            value: Value::int(3),
        };
        assert!(!manager.load_trigger_frames(&mut state, &resolved, 3, &classes)?);
        assert_eq!(state.call_depth(), 1);

        Ok(())
    }

    #[test]
    fn null_bindings_pass_null() -> anyhow::Result<()> {
        let classes = classes();
        let rules = TriggerRules::new().with(TriggerRule::new(
            TriggerEvent::OnNull,
            r".*",
            MethodSignature::new("pkg/Hooks", "(Lpkg/Node;)V", "first"),
        )?);
        let manager = TriggerManager::new(rules);
        let mut state = State::default();
        state.push_frame(&caller(), FrameKind::Method, vec![], 0);

        let reference = state.fresh_reference(ClassName::new("pkg/Node"), Origin::root("x"));
        state.assume_null(&reference)?;
        let alternative = DecisionAlternative::Null { reference };

        assert!(manager.load_trigger_frames(&mut state, &alternative, 3, &classes)?);
        assert_eq!(state.current_frame()?.local(0)?, Some(&Value::null()));

        Ok(())
    }
}
