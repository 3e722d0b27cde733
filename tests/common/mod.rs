//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.

#![cfg(test)]

use std::sync::Arc;

use anyhow::anyhow;
use lazy_symex::{
    bytecode,
    classes::{
        signature::{FieldSignature, MethodSignature},
        table::{ClassBuilder, ClassTable, PoolEntry},
        MethodFlags,
    },
    opcode::{macros::Index, ALOAD_0, ARETURN, GETFIELD},
    vm::{
        context::ExecutionContext,
        state::{Outcome, State, Throwable},
        value::Value,
        Engine,
        ExecutionResult,
    },
    watchdog::{DynWatchdog, LazyWatchdog},
};
use tracing_subscriber::EnvFilter;

/// Installs a subscriber that prints the engine's logs for the test, filtered
/// by `RUST_LOG`.
///
/// Installing it more than once is harmless.
#[allow(unused)] // It is actually
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The flags of a static method.
#[allow(unused)] // It is actually
pub fn statics() -> MethodFlags {
    MethodFlags {
        is_static: true,
        ..MethodFlags::default()
    }
}

/// A singly-linked list node: `pkg/Node` with a `next` field and a method
/// `next()` that returns it.
#[allow(unused)] // It is actually
pub fn node() -> ClassBuilder {
    ClassBuilder::new("pkg/Node")
        .field("next", "Lpkg/Node;")
        .pool(PoolEntry::Field(FieldSignature::new(
            "pkg/Node",
            "Lpkg/Node;",
            "next",
        )))
        .method(
            "next",
            "()Lpkg/Node;",
            MethodFlags::default(),
            1,
            bytecode![ALOAD_0, GETFIELD, Index(1), ARETURN],
        )
}

/// The signature of `pkg/Node.next()`.
#[allow(unused)] // It is actually
pub fn node_next() -> MethodSignature {
    MethodSignature::new("pkg/Node", "()Lpkg/Node;", "next")
}

/// Explores `root` over `classes` to completion, using the context produced
/// by `configure` from the default one.
///
/// # Errors
///
/// If the exploration cannot start, or if any branch fails internally.
#[allow(unused)] // It is actually
pub fn explore(
    classes: ClassTable,
    root: &MethodSignature,
    configure: impl FnOnce(ExecutionContext) -> ExecutionContext,
) -> anyhow::Result<ExecutionResult> {
    explore_with_watchdog(classes, root, configure, LazyWatchdog.in_rc())
}

/// Explores `root` over `classes` as [`explore`] does, polling `watchdog`.
///
/// # Errors
///
/// If the exploration cannot start, or if any branch fails internally.
#[allow(unused)] // It is actually
pub fn explore_with_watchdog(
    classes: ClassTable,
    root: &MethodSignature,
    configure: impl FnOnce(ExecutionContext) -> ExecutionContext,
    watchdog: DynWatchdog,
) -> anyhow::Result<ExecutionResult> {
    init_logging();

    let context = configure(ExecutionContext::with_defaults(Arc::new(classes)));
    let mut engine = Engine::new(context, watchdog);
    engine.start(root)?;
    engine
        .execute()
        .map_err(|errors| anyhow!("Exploration failed: {errors:?}"))?;

    Ok(engine.consume())
}

/// Renders the decisions taken by each final state, in the order the states
/// finished.
#[allow(unused)] // It is actually
pub fn labels(result: &ExecutionResult) -> Vec<String> {
    result
        .states
        .iter()
        .map(|state| state.labels().join(","))
        .collect()
}

/// Gets the kind of the exception the engine raised in `state`, if any.
#[allow(unused)] // It is actually
pub fn raised(state: &State) -> Option<Throwable> {
    match state.outcome() {
        Some(Outcome::Uncaught { kind, .. }) => *kind,
        _ => None,
    }
}

/// Gets the value returned by the root method in `state`, if it returned one.
#[allow(unused)] // It is actually
pub fn returned(state: &State) -> Option<&Value> {
    match state.outcome() {
        Some(Outcome::Returned(value)) => value.as_ref(),
        _ => None,
    }
}
