//! This module tests method invocation end to end, from the lazily resolved
//! receiver to the frame that runs the selected implementation.
#![cfg(test)]

use lazy_symex::{
    algo::meta::{MetaAlgorithm, Overrides},
    bytecode,
    classes::{
        signature::{ClassName, FieldSignature, MethodSignature},
        table::{ClassBuilder, ClassTable, PoolEntry},
        MethodFlags,
    },
    decision::{
        procedure::{DecisionAlgorithms, DecisionProcedure},
        solver::IntervalSolver,
    },
    opcode::{
        macros::Index,
        ALOAD_0,
        ALOAD_1,
        BIPUSH,
        GETFIELD,
        ICONST_0,
        ICONST_1,
        ICONST_2,
        ICONST_3,
        ICONST_4,
        ILOAD_0,
        INVOKESPECIAL,
        INVOKESTATIC,
        INVOKEVIRTUAL,
        IRETURN,
        LRETURN,
        PUTSTATIC,
        RETURN,
    },
    vm::{
        state::{Outcome, Throwable},
        value::{Operator, Primitive, PrimitiveType, Value},
        Config,
        InitializationPolicy,
        SpecialDispatchPolicy,
    },
};

mod common;

/// `pkg/Holder` measures the `pkg/Shape` it holds, which is either a
/// `pkg/Circle` or a `pkg/Square`.
fn shapes() -> ClassTable {
    ClassTable::new()
        .with(
            ClassBuilder::new("pkg/Shape")
                .abstract_class()
                .abstract_method("area", "()I")
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Circle")
                .extends("pkg/Shape")
                .method("area", "()I", MethodFlags::default(), 1, vec![ICONST_3, IRETURN])
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Square")
                .extends("pkg/Shape")
                .method("area", "()I", MethodFlags::default(), 1, vec![ICONST_4, IRETURN])
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Holder")
                .field("shape", "Lpkg/Shape;")
                .pool(PoolEntry::Field(FieldSignature::new(
                    "pkg/Holder",
                    "Lpkg/Shape;",
                    "shape",
                )))
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Shape", "()I", "area")))
                .method(
                    "measure",
                    "()I",
                    MethodFlags::default(),
                    1,
                    bytecode![ALOAD_0, GETFIELD, Index(1), INVOKEVIRTUAL, Index(2), IRETURN],
                )
                .build(),
        )
}

/// `pkg/App` calls into the other classes through its constant pool.
fn application() -> ClassTable {
    ClassTable::new()
        .with(
            ClassBuilder::new("pkg/Util")
                .static_field("count", "I")
                .method("<clinit>", "()V", common::statics(), 0, vec![RETURN])
                .method("helper", "()V", common::statics(), 0, vec![RETURN])
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Widget")
                .static_field("pings", "I")
                .pool(PoolEntry::Field(FieldSignature::new("pkg/Widget", "I", "pings")))
                .method(
                    "<clinit>",
                    "()V",
                    common::statics(),
                    0,
                    bytecode![ICONST_1, PUTSTATIC, Index(1), RETURN],
                )
                .method("ping", "()V", MethodFlags::default(), 1, vec![RETURN])
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Analysis")
                .native_method("assume", "(I)V", true)
                .build(),
        )
        .with(ClassBuilder::new("pkg/Clock").native_method("now", "()J", true).build())
        .with(
            ClassBuilder::new("pkg/Lib")
                .method("slow", "()I", common::statics(), 0, vec![ICONST_1, IRETURN])
                .method("fast", "()I", common::statics(), 0, vec![ICONST_2, IRETURN])
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/App")
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Util", "()V", "helper")))
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Widget", "()V", "ping")))
                .pool(PoolEntry::Method(MethodSignature::new(
                    "pkg/Analysis",
                    "(I)V",
                    "assume",
                )))
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Clock", "()J", "now")))
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Lib", "()I", "slow")))
                .method(
                    "misuse",
                    "()V",
                    common::statics(),
                    0,
                    bytecode![INVOKEVIRTUAL, Index(1), RETURN],
                )
                .method(
                    "poke",
                    "(Lpkg/Widget;)V",
                    common::statics(),
                    1,
                    bytecode![ALOAD_0, INVOKEVIRTUAL, Index(2), RETURN],
                )
                .method(
                    "checked",
                    "(I)I",
                    common::statics(),
                    1,
                    bytecode![ILOAD_0, INVOKESTATIC, Index(3), ILOAD_0, IRETURN],
                )
                .method(
                    "rejected",
                    "()I",
                    common::statics(),
                    0,
                    bytecode![ICONST_0, INVOKESTATIC, Index(3), ICONST_1, IRETURN],
                )
                .method(
                    "time",
                    "()J",
                    common::statics(),
                    0,
                    bytecode![INVOKESTATIC, Index(4), LRETURN],
                )
                .method(
                    "compute",
                    "()I",
                    common::statics(),
                    0,
                    bytecode![INVOKESTATIC, Index(5), IRETURN],
                )
                .build(),
        )
}

/// `pkg/Derived` calls the method it inherits from `pkg/Base` directly, and
/// so does `pkg/Stranger` even though it is unrelated to either.
fn specials() -> ClassTable {
    ClassTable::new()
        .with(
            ClassBuilder::new("pkg/Base")
                .method("hello", "()I", MethodFlags::default(), 1, vec![BIPUSH, 7, IRETURN])
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Derived")
                .extends("pkg/Base")
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Base", "()I", "hello")))
                .method(
                    "greet",
                    "()I",
                    MethodFlags::default(),
                    1,
                    bytecode![ALOAD_0, INVOKESPECIAL, Index(1), IRETURN],
                )
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Stranger")
                .pool(PoolEntry::Method(MethodSignature::new("pkg/Base", "()I", "hello")))
                .method(
                    "poke",
                    "(Lpkg/Base;)I",
                    MethodFlags::default(),
                    2,
                    bytecode![ALOAD_1, INVOKESPECIAL, Index(1), IRETURN],
                )
                .build(),
        )
}

fn app(descriptor: &str, name: &str) -> MethodSignature {
    MethodSignature::new("pkg/App", descriptor, name)
}

#[test]
fn virtual_calls_dispatch_on_the_expanded_class() -> anyhow::Result<()> {
    let root = MethodSignature::new("pkg/Holder", "()I", "measure");
    let result = common::explore(shapes(), &root, |c| c)?;

    assert_eq!(
        common::labels(&result),
        vec!["L_NULL", "L_EXP pkg/Circle", "L_EXP pkg/Square"]
    );
    assert_eq!(
        common::raised(&result.states[0]),
        Some(Throwable::NullPointer)
    );
    assert_eq!(common::returned(&result.states[1]), Some(&Value::int(3)));
    assert_eq!(common::returned(&result.states[2]), Some(&Value::int(4)));

    Ok(())
}

#[test]
fn staticness_mismatches_raise_without_initializing() -> anyhow::Result<()> {
    let result = common::explore(application(), &app("()V", "misuse"), |c| c)?;

    assert_eq!(result.states.len(), 1);
    let state = &result.states[0];
    assert_eq!(
        common::raised(state),
        Some(Throwable::IncompatibleClassChange)
    );
    assert!(state.statics_of(&ClassName::new("pkg/Util")).is_none());

    Ok(())
}

#[test]
fn instance_calls_leave_classes_alone_by_default() -> anyhow::Result<()> {
    let widget = ClassName::new("pkg/Widget");
    let result = common::explore(application(), &app("(Lpkg/Widget;)V", "poke"), |c| c)?;

    assert_eq!(common::labels(&result), vec!["L_NULL", "L_EXP pkg/Widget"]);
    assert_eq!(
        common::raised(&result.states[0]),
        Some(Throwable::NullPointer)
    );
    assert_eq!(result.states[1].outcome(), Some(&Outcome::Returned(None)));
    assert!(result.states[1].statics_of(&widget).is_none());

    Ok(())
}

#[test]
fn instance_calls_initialize_under_the_eager_policy() -> anyhow::Result<()> {
    let widget = ClassName::new("pkg/Widget");
    let result = common::explore(application(), &app("(Lpkg/Widget;)V", "poke"), |c| {
        c.with_config(
            Config::default().with_initialization_policy(InitializationPolicy::AllDispatchKinds),
        )
    })?;

    assert_eq!(common::labels(&result), vec!["L_NULL", "L_EXP pkg/Widget"]);

    // The null check comes before initialization.
    assert_eq!(
        common::raised(&result.states[0]),
        Some(Throwable::NullPointer)
    );
    assert!(result.states[0].statics_of(&widget).is_none());

    let expanded = &result.states[1];
    let statics = expanded
        .statics_of(&widget)
        .ok_or_else(|| anyhow::anyhow!("pkg/Widget was not initialized"))?;
    assert_eq!(expanded.heap().read(statics, "pings")?, Some(&Value::int(1)));

    Ok(())
}

#[test]
fn special_calls_within_the_hierarchy_are_always_allowed() -> anyhow::Result<()> {
    let root = MethodSignature::new("pkg/Derived", "()I", "greet");
    let result = common::explore(specials(), &root, |c| {
        c.with_config(
            Config::default()
                .with_special_dispatch_policy(SpecialDispatchPolicy::SuperclassRequired),
        )
    })?;

    assert_eq!(result.states.len(), 1);
    assert_eq!(common::returned(&result.states[0]), Some(&Value::int(7)));

    Ok(())
}

#[test]
fn special_calls_from_unrelated_classes_depend_on_the_policy() -> anyhow::Result<()> {
    let root = MethodSignature::new("pkg/Stranger", "(Lpkg/Base;)I", "poke");

    let lenient = common::explore(specials(), &root, |c| c)?;
    assert_eq!(
        common::labels(&lenient),
        vec!["L_NULL", "L_EXP pkg/Base", "L_EXP pkg/Derived"]
    );
    assert_eq!(
        common::raised(&lenient.states[0]),
        Some(Throwable::NullPointer)
    );
    assert_eq!(common::returned(&lenient.states[1]), Some(&Value::int(7)));
    assert_eq!(common::returned(&lenient.states[2]), Some(&Value::int(7)));

    let strict = common::explore(specials(), &root, |c| {
        c.with_config(
            Config::default()
                .with_special_dispatch_policy(SpecialDispatchPolicy::SuperclassRequired),
        )
    })?;
    assert_eq!(strict.states.len(), 3);
    assert!(strict
        .states
        .iter()
        .all(|s| common::raised(s) == Some(Throwable::IllegalAccess)));

    Ok(())
}

#[test]
fn assumptions_constrain_the_path() -> anyhow::Result<()> {
    let assume = MethodSignature::new("pkg/Analysis", "(I)V", "assume");
    let overrides = Overrides::standard().with_meta(assume, MetaAlgorithm::Assume);
    let result = common::explore(application(), &app("(I)I", "checked"), |c| {
        c.with_overrides(overrides)
    })?;

    assert_eq!(result.states.len(), 1);
    let state = &result.states[0];
    let Some(Value::Primitive(argument)) = common::returned(state) else {
        anyhow::bail!("the method did not return its argument");
    };

    let mut zero = state.clone();
    zero.assume(Primitive::binary(
        Operator::Eq,
        argument.clone(),
        Primitive::int(0),
    ));
    let procedure = DecisionAlgorithms::new(IntervalSolver::new());
    assert!(procedure.is_satisfiable(state.path_condition()));
    assert!(!procedure.is_satisfiable(zero.path_condition()));

    Ok(())
}

#[test]
fn failed_assumptions_prune_the_branch() -> anyhow::Result<()> {
    let assume = MethodSignature::new("pkg/Analysis", "(I)V", "assume");
    let overrides = Overrides::standard().with_meta(assume, MetaAlgorithm::Assume);
    let result = common::explore(application(), &app("()I", "rejected"), |c| {
        c.with_overrides(overrides)
    })?;

    assert!(result.states.is_empty());
    assert!(result.errors.is_empty());

    Ok(())
}

#[test]
fn native_methods_return_fresh_symbols() -> anyhow::Result<()> {
    let result = common::explore(application(), &app("()J", "time"), |c| c)?;

    assert_eq!(result.states.len(), 1);
    let Some(Value::Primitive(time)) = common::returned(&result.states[0]) else {
        anyhow::bail!("the native call produced no value");
    };
    assert_eq!(time.ty(), PrimitiveType::Long);
    assert!(time.as_symbol().is_some());

    Ok(())
}

#[test]
fn base_overrides_substitute_the_implementation() -> anyhow::Result<()> {
    let overrides = Overrides::standard().with_base(
        MethodSignature::new("pkg/Lib", "()I", "slow"),
        MethodSignature::new("pkg/Lib", "()I", "fast"),
    );
    let result = common::explore(application(), &app("()I", "compute"), |c| {
        c.with_overrides(overrides)
    })?;

    assert_eq!(result.states.len(), 1);
    assert_eq!(common::returned(&result.states[0]), Some(&Value::int(2)));

    Ok(())
}
