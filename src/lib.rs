//! This library implements the core of a symbolic execution engine for
//! stack-based bytecode, in the style of a JVM interpreter that runs on
//! symbolic rather than concrete inputs.
//!
//! Inputs that are references are not given a shape up front. Instead, the
//! engine initializes them _lazily_: the first time the program loads a
//! symbolic reference, the exploration splits into one branch per feasible
//! shape. The reference is null, it aliases an object that an earlier
//! resolution created, or it denotes a fresh object of some compatible class.
//!
//! # How it Works
//!
//! 1. An [`vm::Engine`] is given the class hierarchy of the program as a
//!    [`classes::ClassHierarchy`], and a root method to explore. Its
//!    parameters become fresh symbols.
//! 2. The engine repeatedly takes a pending [`vm::state::State`], looks up the
//!    algorithm for the opcode at its program counter in the
//!    [`algo::dispatch::DispatchTable`], and executes it.
//! 3. Algorithms that load values ask a [`decision::procedure::DecisionProcedure`] which
//!    [`decision::DecisionAlternative`]s are feasible, and produce one
//!    successor state per alternative, each refined with the assumptions of
//!    its alternative.
//! 4. Resolving a reference may fire user-declared
//!    [`trigger::rule::TriggerRule`]s, which run as extra frames before the
//!    load completes.
//! 5. Every branch ends in an [`vm::state::Outcome`], and the final states are
//!    handed over as an [`vm::ExecutionResult`].
//!
//! # Basic Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use lazy_symex::{
//!     bytecode,
//!     classes::{
//!         signature::{FieldSignature, MethodSignature},
//!         table::{ClassBuilder, ClassTable, PoolEntry},
//!         MethodFlags,
//!     },
//!     opcode::{macros::Index, ALOAD_0, ARETURN, GETFIELD},
//!     vm::{context::ExecutionContext, Engine},
//!     watchdog::LazyWatchdog,
//! };
//!
//! let classes = ClassTable::new().with(
//!     ClassBuilder::new("pkg/Node")
//!         .field("next", "Lpkg/Node;")
//!         .pool(PoolEntry::Field(FieldSignature::new("pkg/Node", "Lpkg/Node;", "next")))
//!         .method(
//!             "next",
//!             "()Lpkg/Node;",
//!             MethodFlags::default(),
//!             1,
//!             bytecode![ALOAD_0, GETFIELD, Index(1), ARETURN],
//!         )
//!         .build(),
//! );
//!
//! let context = ExecutionContext::with_defaults(Arc::new(classes));
//! let mut engine = Engine::new(context, LazyWatchdog.in_rc());
//! engine
//!     .start(&MethodSignature::new("pkg/Node", "()Lpkg/Node;", "next"))
//!     .unwrap();
//! engine.execute().unwrap();
//!
//! // `this.next` is null, `this` itself, or a fresh node.
//! assert_eq!(engine.consume().states.len(), 3);
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod algo;
pub mod classes;
pub mod constant;
pub mod decision;
pub mod error;
pub mod opcode;
pub mod trigger;
pub mod vm;
pub mod watchdog;

// Re-exports to provide the library interface.
pub use vm::{Engine, ExecutionResult};
