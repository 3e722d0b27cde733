//! The read-only inputs that every branch of an exploration consults.

use std::sync::Arc;

use crate::{
    algo::{
        dispatch::DispatchTable,
        meta::Overrides,
        native::{DynNativeExecutor, HavocNativeExecutor},
    },
    classes::{ClassHierarchy, DynClassHierarchy},
    decision::{
        procedure::{DecisionAlgorithms, DecisionProcedure, DynDecisionProcedure},
        solver::IntervalSolver,
    },
    trigger::{rule::TriggerRules, TriggerManager},
    vm::Config,
};

/// Everything an algorithm needs besides the state it executes on.
///
/// The context is built once before exploration starts and never changes
/// afterwards. Cloning it only clones handles.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    classes:            DynClassHierarchy,
    decision_procedure: DynDecisionProcedure,
    trigger_manager:    TriggerManager,
    dispatcher:         Arc<DispatchTable>,
    overrides:          Arc<Overrides>,
    native_executor:    DynNativeExecutor,
    config:             Config,
}

impl ExecutionContext {
    /// Creates a context from its collaborators, with no trigger rules, the
    /// standard overrides and the havoc native executor.
    #[must_use]
    pub fn new(classes: DynClassHierarchy, decision_procedure: DynDecisionProcedure) -> Self {
        Self {
            classes,
            decision_procedure,
            trigger_manager: TriggerManager::default(),
            dispatcher: Arc::new(DispatchTable::new()),
            overrides: Arc::new(Overrides::standard()),
            native_executor: Arc::new(HavocNativeExecutor),
            config: Config::default(),
        }
    }

    /// Creates a context for `classes` that decides with the standard
    /// decision algorithms over an [`IntervalSolver`].
    #[must_use]
    pub fn with_defaults(classes: DynClassHierarchy) -> Self {
        let procedure = DecisionAlgorithms::new(IntervalSolver::new());
        Self::new(classes, Arc::new(procedure))
    }

    #[must_use]
    pub fn with_decision_procedure(mut self, procedure: DynDecisionProcedure) -> Self {
        self.decision_procedure = procedure;
        self
    }

    #[must_use]
    pub fn with_triggers(mut self, rules: TriggerRules) -> Self {
        self.trigger_manager = TriggerManager::new(rules);
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = Arc::new(overrides);
        self
    }

    #[must_use]
    pub fn with_native_executor(mut self, executor: DynNativeExecutor) -> Self {
        self.native_executor = executor;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn classes(&self) -> &dyn ClassHierarchy {
        self.classes.as_ref()
    }

    #[must_use]
    pub fn decision_procedure(&self) -> &dyn DecisionProcedure {
        self.decision_procedure.as_ref()
    }

    #[must_use]
    pub fn trigger_manager(&self) -> &TriggerManager {
        &self.trigger_manager
    }

    #[must_use]
    pub fn dispatcher(&self) -> &DispatchTable {
        &self.dispatcher
    }

    #[must_use]
    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    #[must_use]
    pub fn native_executor(&self) -> &DynNativeExecutor {
        &self.native_executor
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}
