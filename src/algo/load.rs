//! Loads of a value onto the operand stack from a local slot or a field.
//!
//! A loaded symbolic reference that has not been resolved on the path is
//! resolved here, lazily: the decision procedure enumerates whether it is
//! null, an alias of an object already in the heap, or a fresh object of some
//! compatible class, and every feasible alternative gets its own successor.
//! Trigger rules that fire on the alternative run before the load completes.

use std::collections::BTreeSet;

use tracing::trace;

use crate::{
    algo::{pool_index, pop_checked, raise, target_of, Branching, Continuation, Operands},
    classes::{signature::FieldSignature, ClassHierarchy},
    constant::{FIELD_ACCESS_OFFSET, LOCAL_INDEXED_OFFSET, SINGLE_BYTE_OFFSET},
    decision::DecisionAlternative,
    error::{
        execution::{Error, Result},
        resolution,
    },
    vm::{
        context::ExecutionContext,
        state::{ClassInit, State, Throwable},
        value::{Category, Operator, Primitive, Value},
    },
};

/// Where a load reads its value from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoadSource {
    /// A local slot. The slot is implied by the opcode when `slot` is set,
    /// and read from the byte after it otherwise.
    Local { category: Category, slot: Option<u8> },

    /// An instance field of the popped receiver.
    Field,

    /// A static field.
    Static,
}

/// The shared algorithm of the load family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Load {
    source: LoadSource,
}

impl Load {
    #[must_use]
    pub fn local(category: Category, slot: Option<u8>) -> Self {
        Self {
            source: LoadSource::Local { category, slot },
        }
    }

    #[must_use]
    pub fn field() -> Self {
        Self {
            source: LoadSource::Field,
        }
    }

    #[must_use]
    pub fn static_field() -> Self {
        Self {
            source: LoadSource::Static,
        }
    }

    #[must_use]
    pub fn source(&self) -> LoadSource {
        self.source
    }
}

/// The value read by a load, and the length of the instruction.
#[derive(Clone, Debug)]
pub struct Loaded {
    value:  Value,
    offset: u32,
}

impl Branching for Load {
    type Alternative = DecisionAlternative;
    type Operands = Loaded;

    fn read(&self, state: &mut State, context: &ExecutionContext) -> Result<Operands<Loaded>> {
        match self.source {
            LoadSource::Local { category, slot } => read_local(state, category, slot),
            LoadSource::Field => read_field(state, context),
            LoadSource::Static => read_static(state, context),
        }
    }

    fn decide(
        &self,
        state: &State,
        operands: &Loaded,
        context: &ExecutionContext,
    ) -> Result<BTreeSet<DecisionAlternative>> {
        decide_value(state, &operands.value, context)
    }

    fn refine(
        &self,
        state: &mut State,
        _: &Loaded,
        alternative: &DecisionAlternative,
        context: &ExecutionContext,
    ) -> Result<()> {
        refine_reference(state, alternative, context)
    }

    fn update(
        &self,
        state: &mut State,
        operands: &Loaded,
        alternative: DecisionAlternative,
        context: &ExecutionContext,
    ) -> Result<Continuation> {
        update_load(state, alternative, operands.offset, context)
    }
}

fn read_local(
    state: &mut State,
    category: Category,
    slot: Option<u8>,
) -> Result<Operands<Loaded>> {
    let (slot, offset) = match slot {
        Some(slot) => (slot, SINGLE_BYTE_OFFSET),
        None => match state.current_frame()?.byte_at(1) {
            Some(slot) => (slot, LOCAL_INDEXED_OFFSET),
            None => return Ok(raise(state, Throwable::Verify)),
        },
    };

    let value = match state.local(usize::from(slot)) {
        Ok(Some(value)) => value.clone(),
        Ok(None) | Err(Error::NoSuchLocal { .. }) => return Ok(raise(state, Throwable::Verify)),
        Err(error) => return Err(error),
    };
    if value.category() != category {
        return Ok(raise(state, Throwable::Verify));
    }

    Ok(Operands::Ready(Loaded { value, offset }))
}

fn read_field(state: &mut State, context: &ExecutionContext) -> Result<Operands<Loaded>> {
    let field = match resolve_field_operand(state, context.classes())? {
        Ok(field) => field,
        Err(kind) => return Ok(raise(state, kind)),
    };
    match is_static_field(context.classes(), &field) {
        Ok(false) => {}
        Ok(true) => return Ok(raise(state, Throwable::IncompatibleClassChange)),
        Err(error) => return Err(error.into()),
    }

    let Some(receiver) = pop_checked(state)? else {
        return Ok(raise(state, Throwable::Verify));
    };
    let id = match target_of(state, &receiver)?.object() {
        Ok(id) => id,
        Err(kind) => return Ok(raise(state, kind)),
    };

    let value = state
        .heap()
        .read(id, &field.name)?
        .cloned()
        .ok_or_else(|| Error::TypeMismatch {
            expected: format!("an object with field {field}"),
            found:    format!("{id}"),
        })?;

    Ok(Operands::Ready(Loaded {
        value,
        offset: FIELD_ACCESS_OFFSET,
    }))
}

fn read_static(state: &mut State, context: &ExecutionContext) -> Result<Operands<Loaded>> {
    let field = match resolve_field_operand(state, context.classes())? {
        Ok(field) => field,
        Err(kind) => return Ok(raise(state, kind)),
    };
    match is_static_field(context.classes(), &field) {
        Ok(true) => {}
        Ok(false) => return Ok(raise(state, Throwable::IncompatibleClassChange)),
        Err(error) => return Err(error.into()),
    }

    match state.ensure_class_initialized(&field.class, context.classes())? {
        ClassInit::Ready => {}
        ClassInit::Suspended => return Ok(Operands::Done(Continuation::Suspend { frames: 1 })),
        ClassInit::Raised => return Ok(Operands::Done(Continuation::Halt)),
    }

    let statics = state
        .statics_of(&field.class)
        .ok_or_else(|| Error::NoSuchStaticArea {
            class: field.class.to_string(),
        })?;
    let value = state
        .heap()
        .read(statics, &field.name)?
        .cloned()
        .ok_or_else(|| Error::TypeMismatch {
            expected: format!("a static area with field {field}"),
            found:    field.class.to_string(),
        })?;

    Ok(Operands::Ready(Loaded {
        value,
        offset: FIELD_ACCESS_OFFSET,
    }))
}

/// Reads the field reference after the opcode and resolves it from the
/// executing class, yielding the exception kind to raise on failure.
pub(crate) fn resolve_field_operand(
    state: &State,
    classes: &dyn ClassHierarchy,
) -> Result<std::result::Result<FieldSignature, Throwable>> {
    let Some(index) = pool_index(state)? else {
        return Ok(Err(Throwable::Verify));
    };
    let accessor = state.current_method()?.class.clone();
    let resolved = classes
        .field_ref(&accessor, index)
        .and_then(|field| classes.resolve_field(&accessor, &field));
    Ok(resolved.map_err(|error| error.throwable()))
}

/// Checks whether the resolved `field` is a static field of its class.
pub(crate) fn is_static_field(
    classes: &dyn ClassHierarchy,
    field: &FieldSignature,
) -> resolution::Result<bool> {
    Ok(classes
        .static_fields(&field.class)?
        .iter()
        .any(|f| f.name == field.name))
}

/// Enumerates the alternatives for loading `value`.
///
/// Only a symbolic reference that is still unresolved gives the decision
/// procedure something to decide. Anything else loads as itself, with
/// references resolved earlier on the path replaced by what they denote.
pub(crate) fn decide_value(
    state: &State,
    value: &Value,
    context: &ExecutionContext,
) -> Result<BTreeSet<DecisionAlternative>> {
    if let Some(reference) = value.as_symbolic_reference() {
        match state.resolution(reference) {
            None => {
                return context.decision_procedure().reference_alternatives(
                    reference,
                    state,
                    context.classes(),
                )
            }
            Some(target) => {
                return Ok(BTreeSet::from([DecisionAlternative::Resolved {
                    value: Value::Reference(target),
                }]))
            }
        }
    }

    Ok(BTreeSet::from([DecisionAlternative::Resolved {
        value: value.clone(),
    }]))
}

/// Records the assumptions of a reference alternative.
///
/// Expanding to an array class also assumes that the array's length is not
/// negative. Running out of heap raises an out-of-memory error in the state.
///
/// # Errors
///
/// [`Error::Contradiction`] if the length of an expanded array cannot be
/// non-negative, and internal errors otherwise.
pub(crate) fn refine_reference(
    state: &mut State,
    alternative: &DecisionAlternative,
    context: &ExecutionContext,
) -> Result<()> {
    match alternative {
        DecisionAlternative::Null { reference } => state.assume_null(reference),
        DecisionAlternative::Aliases { object, reference } => {
            state.assume_aliases(reference, *object)
        }
        DecisionAlternative::Expands { class, reference } => {
            let Some(id) = state.assume_expands(reference, class, context.classes())? else {
                state.raise(Throwable::OutOfMemory);
                return Ok(());
            };
            if class.is_array() {
                let length = state
                    .object(id)?
                    .array_length()
                    .cloned()
                    .ok_or_else(|| Error::TypeMismatch {
                        expected: "an array".into(),
                        found:    class.to_string(),
                    })?;
                let non_negative = context.decision_procedure().simplify(Primitive::binary(
                    Operator::Ge,
                    length,
                    Primitive::int(0),
                ));
                match non_negative.as_const() {
                    Some(0) => return Err(Error::Contradiction),
                    Some(_) => {}
                    None => state.assume(non_negative),
                }
            }
            Ok(())
        }
        DecisionAlternative::Resolved { .. } => Ok(()),
    }
}

/// Pushes the value that `alternative` loads and runs the trigger rules that
/// fire on it.
///
/// If any trigger frame was pushed, the load is suspended: the frame that
/// executed it continues `offset` bytes further on once they have returned.
pub(crate) fn update_load(
    state: &mut State,
    alternative: DecisionAlternative,
    offset: u32,
    context: &ExecutionContext,
) -> Result<Continuation> {
    let value = match &alternative {
        DecisionAlternative::Resolved { value } => value.clone(),
        DecisionAlternative::Null { reference }
        | DecisionAlternative::Aliases { reference, .. }
        | DecisionAlternative::Expands { reference, .. } => {
            let target =
                state
                    .resolution(reference)
                    .ok_or_else(|| Error::UnresolvedReference {
                        reference: reference.to_string(),
                    })?;
            Value::Reference(target)
        }
    };
    trace!(target: "lazy_symex::algo::load", state = %state.identifier(), %value, "loaded");
    state.push_operand(value.widen())?;

    let depth = state.call_depth();
    let pushed = context.trigger_manager().load_trigger_frames(
        state,
        &alternative,
        offset,
        context.classes(),
    )?;
    if !pushed {
        return Ok(Continuation::Advance(offset));
    }
    if state.is_halted() {
        return Ok(Continuation::Halt);
    }
    Ok(Continuation::Suspend {
        frames: state.call_depth().saturating_sub(depth),
    })
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        algo::{load::Load, run, Continuation},
        classes::{
            signature::{ClassName, FieldSignature, MethodSignature},
            table::{ClassBuilder, ClassTable, PoolEntry},
            MethodFlags,
            MethodInfo,
        },
        opcode::{ALOAD_0, ARETURN, GETFIELD, GETSTATIC, ILOAD},
        vm::{
            context::ExecutionContext,
            state::{frame::FrameKind, path_condition::Clause, Outcome, State, Throwable},
            value::{Category, ObjectId, Origin, Reference, Value},
        },
    };

    fn classes() -> ClassTable {
        ClassTable::new()
            .with(
                ClassBuilder::new("pkg/Node")
                    .field("next", "Lpkg/Node;")
                    .field("value", "I")
                    .static_field("count", "I")
                    .pool(PoolEntry::Field(FieldSignature::new("pkg/Node", "Lpkg/Node;", "next")))
                    .pool(PoolEntry::Field(FieldSignature::new("pkg/Node", "I", "count")))
                    .build(),
            )
            .with(ClassBuilder::new("pkg/Leaf").extends("pkg/Node").build())
    }

    fn context() -> ExecutionContext {
        ExecutionContext::with_defaults(Arc::new(classes()))
    }

    /// A state running `code` in `pkg/Node` with an expanded `this` in slot 0.
    fn state_running(code: Vec<u8>) -> anyhow::Result<State> {
        let method = MethodInfo {
            signature:  MethodSignature::new("pkg/Node", "()V", "run"),
            flags:      MethodFlags::default(),
            max_locals: 2,
            code:       Arc::from(code),
        };
        let mut state = State::default();
        let this = state.fresh_reference(ClassName::new("pkg/Node"), Origin::root("this"));
        state.assume_expands(&this, &ClassName::new("pkg/Node"), &classes())?;
        state.push_frame(
            &method,
            FrameKind::Method,
            vec![Value::Reference(Reference::Symbolic(this))],
            0,
        );
        Ok(state)
    }

    #[test]
    fn loading_an_unresolved_field_forks_per_alternative() -> anyhow::Result<()> {
        let context = context();
        let mut state = state_running(vec![ALOAD_0, GETFIELD, 0x00, 0x01, ARETURN])?;

        let first = run(&Load::local(Category::Reference, Some(0)), state, &context)?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].continuation, Continuation::Advance(1));
        state = first.into_iter().next().expect("one successor").state;
        state.advance(1)?;

        let successors = run(&Load::field(), state, &context)?;
        let labels: Vec<String> = successors
            .iter()
            .map(|s| s.state.labels().join(","))
            .collect();
        assert_eq!(labels, vec!["L_NULL", "L_ALIAS Object[1]", "L_EXP pkg/Leaf", "L_EXP pkg/Node"]);
        assert!(successors
            .iter()
            .all(|s| s.continuation == Continuation::Advance(3)));

        // The null branch pushed null and recorded why.
        let null = &successors[0].state;
        assert_eq!(null.peek_operand(0)?, &Value::null());
        assert!(matches!(null.path_condition().clauses()[1], Clause::AssumeNull(_)));

        // The expansion pushed the new object, which read back is itself.
        let expanded = &successors[3].state;
        let Value::Reference(Reference::Concrete(id)) = expanded.peek_operand(0)?.clone() else {
            anyhow::bail!("expected a concrete reference");
        };
        assert_eq!(expanded.object(id)?.class(), &ClassName::new("pkg/Node"));

        Ok(())
    }

    #[test]
    fn resolved_references_load_without_forking() -> anyhow::Result<()> {
        let context = context();
        let state = state_running(vec![ALOAD_0, ARETURN])?;

        let successors = run(&Load::local(Category::Reference, Some(0)), state, &context)?;
        assert_eq!(successors.len(), 1);
        assert!(successors[0].state.labels().is_empty());
        assert_eq!(successors[0].state.peek_operand(0)?, &Value::object(ObjectId::new(1)));

        Ok(())
    }

    #[test]
    fn loading_the_wrong_category_is_a_verify_error() -> anyhow::Result<()> {
        let context = context();
        let state = state_running(vec![ILOAD, 0x00, ARETURN])?;

        let successors = run(&Load::local(Category::Int, None), state, &context)?;
        assert_eq!(successors[0].continuation, Continuation::Halt);
        assert!(matches!(
            successors[0].state.outcome(),
            Some(Outcome::Uncaught {
                kind: Some(Throwable::Verify),
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn static_loads_initialize_the_class_first() -> anyhow::Result<()> {
        let context = context();
        let state = state_running(vec![GETSTATIC, 0x00, 0x02, ARETURN])?;

        let successors = run(&Load::static_field(), state, &context)?;
        assert_eq!(successors.len(), 1);
        let state = &successors[0].state;
        assert_eq!(successors[0].continuation, Continuation::Advance(3));
        assert!(state.statics_of(&ClassName::new("pkg/Node")).is_some());
        assert!(matches!(
            state.peek_operand(0)?,
            Value::Primitive(p) if p.as_symbol().is_some()
        ));

        Ok(())
    }

    #[test]
    fn loading_a_static_field_through_getfield_is_incompatible() -> anyhow::Result<()> {
        let context = context();
        let state = state_running(vec![ALOAD_0, GETFIELD, 0x00, 0x02, ARETURN])?;
        let mut state = run(&Load::local(Category::Reference, Some(0)), state, &context)?
            .remove(0)
            .state;
        state.advance(1)?;

        let successors = run(&Load::field(), state, &context)?;
        assert!(matches!(
            successors[0].state.outcome(),
            Some(Outcome::Uncaught {
                kind: Some(Throwable::IncompatibleClassChange),
                ..
            })
        ));

        Ok(())
    }
}
