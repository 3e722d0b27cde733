//! This module tests that trigger rules run when the references they watch are
//! resolved, and that they finish before the resolving frame continues.
#![cfg(test)]

use lazy_symex::{
    bytecode,
    classes::{
        signature::{ClassName, FieldSignature, MethodSignature},
        table::{ClassBuilder, ClassTable, PoolEntry},
    },
    opcode::{macros::Index, ALOAD_0, GETSTATIC, ICONST_1, ICONST_2, IRETURN, PUTSTATIC, RETURN},
    trigger::rule::{TriggerEvent, TriggerRule, TriggerRules},
    vm::value::Value,
};

mod common;

/// `pkg/Monitor` records the last node a rule saw and which marking rule ran
/// last.
fn monitored() -> ClassTable {
    ClassTable::new()
        .with(
            common::node()
                .pool(PoolEntry::Field(FieldSignature::new("pkg/Monitor", "I", "seen")))
                .method(
                    "seen",
                    "()I",
                    Default::default(),
                    1,
                    bytecode![GETSTATIC, Index(2), IRETURN],
                )
                .build(),
        )
        .with(
            ClassBuilder::new("pkg/Monitor")
                .static_field("last", "Lpkg/Node;")
                .static_field("seen", "I")
                .pool(PoolEntry::Field(FieldSignature::new(
                    "pkg/Monitor",
                    "Lpkg/Node;",
                    "last",
                )))
                .pool(PoolEntry::Field(FieldSignature::new("pkg/Monitor", "I", "seen")))
                .method(
                    "record",
                    "(Lpkg/Node;)V",
                    common::statics(),
                    1,
                    bytecode![ALOAD_0, PUTSTATIC, Index(1), RETURN],
                )
                .method(
                    "mark",
                    "()V",
                    common::statics(),
                    0,
                    bytecode![ICONST_1, PUTSTATIC, Index(2), RETURN],
                )
                .method(
                    "remark",
                    "()V",
                    common::statics(),
                    0,
                    bytecode![ICONST_2, PUTSTATIC, Index(2), RETURN],
                )
                .build(),
        )
}

fn monitor() -> ClassName {
    ClassName::new("pkg/Monitor")
}

#[test]
fn expansion_rules_run_before_the_load_completes() -> anyhow::Result<()> {
    let rule = TriggerRule::new(
        TriggerEvent::OnExpansion,
        r"\{ROOT\}:this\.next",
        MethodSignature::new("pkg/Monitor", "(Lpkg/Node;)V", "record"),
    )?;
    let result = common::explore(monitored(), &common::node_next(), |c| {
        c.with_triggers(TriggerRules::new().with(rule))
    })?;

    assert_eq!(
        common::labels(&result),
        vec!["L_NULL", "L_ALIAS Object[1]", "L_EXP pkg/Node"]
    );

    // Only the expansion fires the rule.
    assert!(result.states[0].statics_of(&monitor()).is_none());
    assert!(result.states[1].statics_of(&monitor()).is_none());

    // The rule saw the same object the method went on to return.
    let expanded = &result.states[2];
    let statics = expanded
        .statics_of(&monitor())
        .ok_or_else(|| anyhow::anyhow!("the rule did not run"))?;
    let recorded = expanded.heap().read(statics, "last")?;
    assert!(recorded.is_some());
    assert_eq!(recorded, common::returned(expanded));

    Ok(())
}

#[test]
fn rules_ignore_origins_they_do_not_match() -> anyhow::Result<()> {
    let rule = TriggerRule::new(
        TriggerEvent::Any,
        r"\{ROOT\}:this\.next\.next",
        MethodSignature::new("pkg/Monitor", "(Lpkg/Node;)V", "record"),
    )?;
    let result = common::explore(monitored(), &common::node_next(), |c| {
        c.with_triggers(TriggerRules::new().with(rule))
    })?;

    assert_eq!(result.states.len(), 3);
    assert!(result
        .states
        .iter()
        .all(|s| s.statics_of(&monitor()).is_none()));

    Ok(())
}

#[test]
fn null_rules_receive_null() -> anyhow::Result<()> {
    let rule = TriggerRule::new(
        TriggerEvent::OnNull,
        r"\{ROOT\}:this\.next",
        MethodSignature::new("pkg/Monitor", "(Lpkg/Node;)V", "record"),
    )?;
    let result = common::explore(monitored(), &common::node_next(), |c| {
        c.with_triggers(TriggerRules::new().with(rule))
    })?;

    let nulled = &result.states[0];
    let statics = nulled
        .statics_of(&monitor())
        .ok_or_else(|| anyhow::anyhow!("the rule did not run"))?;
    assert_eq!(nulled.heap().read(statics, "last")?, Some(&Value::null()));
    assert!(result.states[2].statics_of(&monitor()).is_none());

    Ok(())
}

#[test]
fn root_receiver_rules_run_before_the_first_instruction() -> anyhow::Result<()> {
    let rule = TriggerRule::new(
        TriggerEvent::OnExpansion,
        r"\{ROOT\}:this",
        MethodSignature::new("pkg/Monitor", "()V", "mark"),
    )?;
    let root = MethodSignature::new("pkg/Node", "()I", "seen");
    let result = common::explore(monitored(), &root, |c| {
        c.with_triggers(TriggerRules::new().with(rule))
    })?;

    // Without the rule the method would return a fresh symbol.
    assert_eq!(result.states.len(), 1);
    assert_eq!(common::returned(&result.states[0]), Some(&Value::int(1)));

    Ok(())
}

#[test]
fn target_class_restrictions_filter_bindings() -> anyhow::Result<()> {
    let classes = monitored().with(ClassBuilder::new("pkg/Tail").extends("pkg/Node").build());
    let rule = TriggerRule::new(
        TriggerEvent::OnExpansion,
        r"\{ROOT\}:this\.next",
        MethodSignature::new("pkg/Monitor", "(Lpkg/Node;)V", "record"),
    )?
    .with_target_class("pkg/Tail");
    let result = common::explore(classes, &common::node_next(), |c| {
        c.with_triggers(TriggerRules::new().with(rule))
    })?;

    assert_eq!(
        common::labels(&result),
        vec![
            "L_NULL",
            "L_ALIAS Object[1]",
            "L_EXP pkg/Node",
            "L_EXP pkg/Tail"
        ]
    );
    assert!(result.states[2].statics_of(&monitor()).is_none());
    assert!(result.states[3].statics_of(&monitor()).is_some());

    Ok(())
}

#[test]
fn the_first_declared_rule_runs_last() -> anyhow::Result<()> {
    let one = TriggerRule::new(
        TriggerEvent::OnExpansion,
        r"\{ROOT\}:this\.next",
        MethodSignature::new("pkg/Monitor", "()V", "mark"),
    )?;
    let two = TriggerRule::new(
        TriggerEvent::OnExpansion,
        r"\{ROOT\}:this\.next",
        MethodSignature::new("pkg/Monitor", "()V", "remark"),
    )?;
    let result = common::explore(monitored(), &common::node_next(), |c| {
        c.with_triggers(TriggerRules::new().with(one).with(two))
    })?;

    assert_eq!(
        common::labels(&result),
        vec!["L_NULL", "L_ALIAS Object[1]", "L_EXP pkg/Node"]
    );
    let expanded = &result.states[2];
    let statics = expanded
        .statics_of(&monitor())
        .ok_or_else(|| anyhow::anyhow!("no rule ran"))?;
    assert_eq!(expanded.heap().read(statics, "seen")?, Some(&Value::int(1)));
    assert!(common::returned(expanded).is_some());

    Ok(())
}
