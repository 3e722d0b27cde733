//! This module contains the engine that explores the states of a method.

pub mod context;
pub mod state;
pub mod value;

use std::collections::VecDeque;

use tracing::{debug, error, trace, warn};

use crate::{
    algo::{Continuation, Successor},
    classes::signature::MethodSignature,
    constant::{
        DEFAULT_MAXIMUM_CALL_DEPTH,
        DEFAULT_MAXIMUM_HEAP_SIZE,
        DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH,
        DEFAULT_MAXIMUM_STATES,
        DEFAULT_MAXIMUM_STEPS_PER_STATE,
        ROOT_THIS_NAME,
    },
    decision::DecisionAlternative,
    error::{
        container::Locatable,
        execution::{Error, Errors, Result},
    },
    opcode::mnemonic,
    vm::{
        context::ExecutionContext,
        state::{frame::FrameKind, ClassInit, Limits, State, Throwable},
        value::{Origin, Reference, Value},
    },
    watchdog::DynWatchdog,
};

/// The engine that symbolically executes a root method.
///
/// Exploration keeps a work list of pending states. Each iteration takes one
/// state, executes the instruction at its program counter, and puts the
/// successors back, so that every branch of every decision is eventually
/// explored unless a limit cuts it short.
#[derive(Debug)]
pub struct Engine {
    /// The read-only inputs shared by every state.
    context: ExecutionContext,

    /// The states that still have instructions to execute.
    pending: VecDeque<State>,

    /// The states whose branch has ended.
    finished: Vec<State>,

    /// The internal failures that aborted branches.
    errors: Errors,

    /// Polled at intervals to check whether exploration needs to stop.
    watchdog: DynWatchdog,
}

impl Engine {
    /// Constructs an engine with nothing to explore yet.
    #[must_use]
    pub fn new(context: ExecutionContext, watchdog: DynWatchdog) -> Self {
        Self {
            context,
            pending: VecDeque::new(),
            finished: Vec::new(),
            errors: Errors::new(),
            watchdog,
        }
    }

    /// Creates the initial state for exploring `root`, and queues it.
    ///
    /// Every parameter of `root` becomes a fresh symbol. An instance method's
    /// receiver is a symbolic reference that is expanded to an object of the
    /// declaring class straight away, which fires the triggers that match
    /// it. The declaring class is initialized last, so its initializer runs
    /// before anything else.
    ///
    /// # Errors
    ///
    /// If `root` is not declared or its descriptor is malformed.
    pub fn start(&mut self, root: &MethodSignature) -> Result<()> {
        let classes = self.context.classes();
        let info = classes.method(root)?;
        let mut state = State::new(self.context.config().limits());

        let receiver = (!info.flags.is_static)
            .then(|| state.fresh_reference(root.class.clone(), Origin::root(ROOT_THIS_NAME)));
        let mut arguments: Vec<Value> = receiver
            .iter()
            .map(|this| Value::Reference(Reference::Symbolic(this.clone())))
            .collect();
        for (i, ty) in root.parameter_types()?.iter().enumerate() {
            let value = state.fresh_value(ty, Origin::root(format!("arg{i}")));
            arguments.push(value);
        }

        debug!(target: "lazy_symex::vm", %root, arguments = arguments.len(), "starting exploration");
        if !state.push_frame(&info, FrameKind::Method, arguments, 0) {
            self.finished.push(state);
            return Ok(());
        }

        if let Some(this) = receiver {
            if state.assume_expands(&this, &root.class, classes)?.is_none() {
                state.raise(Throwable::OutOfMemory);
                self.finished.push(state);
                return Ok(());
            }
            let alternative = DecisionAlternative::Expands {
                class:     root.class.clone(),
                reference: this,
            };
            self.context
                .trigger_manager()
                .load_trigger_frames_root(&mut state, &alternative, classes)?;
        }

        match state.ensure_class_initialized(&root.class, classes)? {
            ClassInit::Ready | ClassInit::Suspended => self.pending.push_back(state),
            ClassInit::Raised => self.finished.push(state),
        }
        Ok(())
    }

    /// Explores every pending state until none remain.
    ///
    /// Internal failures only abort the branch they occur on; they are
    /// collected and exploration carries on with the other branches.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] with every collected failure if any branch failed, or if
    /// the watchdog stopped the exploration.
    pub fn execute(&mut self) -> std::result::Result<(), Errors> {
        let poll_interval = self.watchdog.poll_every().max(1);
        let mut counter: usize = 0;

        while let Some(state) = self.pending.pop_front() {
            // If we have been told to stop, keep the state for inspection and
            // return.
            if counter % poll_interval == 0 && self.watchdog.should_stop() {
                let location = state.program_counter().unwrap_or_default();
                let stopped = Error::StoppedByWatchdog
                    .locate(location)
                    .on_branch(state.identifier());
                self.pending.push_front(state);
                self.errors.add_sorted(stopped);
                return Err(self.errors.clone());
            }
            counter += 1;

            self.step(state);
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.clone())
        }
    }

    /// Executes one instruction of `state` and schedules its successors.
    fn step(&mut self, mut state: State) {
        if state.is_halted() || state.frames().is_empty() {
            self.finished.push(state);
            return;
        }

        let location = state.program_counter().unwrap_or_default();
        let branch = state.identifier();
        let limit = self.context.config().maximum_steps_per_state;
        if state.steps() >= limit {
            self.fail(Error::StepLimitExceeded { limit }, location, branch);
            return;
        }
        state.count_step();

        let opcode = match state.current_frame().map(|frame| frame.byte_at(0)) {
            Ok(Some(opcode)) => opcode,
            Ok(None) => {
                let available = state.current_frame().map(|f| f.code().len()).unwrap_or(0);
                let error = Error::ProgramCounterOutOfBounds {
                    requested: location,
                    available,
                };
                self.fail(error, location, branch);
                return;
            }
            Err(error) => {
                self.fail(error, location, branch);
                return;
            }
        };
        trace!(
            target: "lazy_symex::vm",
            state = %branch,
            pc = location,
            opcode = mnemonic(opcode),
            "executing"
        );

        let algorithm = self.context.dispatcher().algorithm(opcode);
        match algorithm.execute(state, &self.context) {
            Ok(successors) => self.schedule(successors),
            Err(error) if error.is_contradiction() => {
                debug!(target: "lazy_symex::vm", state = %branch, "pruned by contradiction");
            }
            Err(error) => self.fail(error, location, branch),
        }
    }

    /// Applies the continuation of each successor and queues those that still
    /// have instructions to execute.
    fn schedule(&mut self, successors: Vec<Successor>) {
        let mut runnable = Vec::with_capacity(successors.len());
        for Successor {
            mut state,
            continuation,
        } in successors
        {
            match continuation {
                Continuation::Halt => {
                    self.finished.push(state);
                    continue;
                }
                Continuation::Advance(offset) => {
                    let location = state.program_counter().unwrap_or_default();
                    if let Err(error) = state.advance(offset) {
                        let branch = state.identifier();
                        self.fail(error, location, branch);
                        continue;
                    }
                }
                Continuation::Transfer | Continuation::Suspend { .. } => {}
            }

            if state.is_halted() {
                self.finished.push(state);
            } else {
                runnable.push(state);
            }
        }

        let maximum = self.context.config().maximum_states;
        let order = self.context.config().exploration_order;
        let mut admitted = Vec::with_capacity(runnable.len());
        for state in runnable {
            if self.retained_state_count() + admitted.len() >= maximum {
                warn!(
                    target: "lazy_symex::vm",
                    state = %state.identifier(),
                    maximum,
                    "state limit reached, dropping state"
                );
                continue;
            }
            admitted.push(state);
        }

        match order {
            ExplorationOrder::DepthFirst => {
                for state in admitted.into_iter().rev() {
                    self.pending.push_front(state);
                }
            }
            ExplorationOrder::BreadthFirst => self.pending.extend(admitted),
        }
    }

    /// Records an internal failure that aborted the branch `branch`.
    fn fail(&mut self, error: Error, location: u32, branch: String) {
        error!(target: "lazy_symex::vm", state = %branch, pc = location, %error, "branch aborted");
        self.errors.add_sorted(error.locate(location).on_branch(branch));
    }

    /// Gets the number of states the engine currently holds.
    #[must_use]
    pub fn retained_state_count(&self) -> usize {
        self.pending.len() + self.finished.len()
    }

    /// Gets the number of states still waiting to be explored.
    #[must_use]
    pub fn remaining_state_count(&self) -> usize {
        self.pending.len()
    }

    /// Gets the states still waiting to be explored.
    #[must_use]
    pub fn pending_states(&self) -> &VecDeque<State> {
        &self.pending
    }

    /// Gets the states whose branch has ended.
    #[must_use]
    pub fn finished_states(&self) -> &[State] {
        &self.finished
    }

    /// Checks if there is nothing left to explore.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    #[must_use]
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.context.config()
    }

    #[must_use]
    pub fn watchdog(&self) -> &DynWatchdog {
        &self.watchdog
    }

    /// Consumes the engine to hand over the results of the exploration.
    #[must_use]
    pub fn consume(self) -> ExecutionResult {
        ExecutionResult {
            states:  self.finished,
            errors:  self.errors,
            pending: self.pending.into(),
        }
    }
}

/// The results of an exploration.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// The states whose branch ended, in the order they ended.
    pub states: Vec<State>,

    /// The internal failures that aborted branches.
    ///
    /// If `errors` is not empty, the states do not cover every path.
    pub errors: Errors,

    /// The states that were still pending when exploration stopped early.
    pub pending: Vec<State>,
}

/// Which classes an invocation initializes before calling.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum InitializationPolicy {
    /// Only static invocations initialize the class of the method.
    #[default]
    StaticOnly,

    /// Every invocation initializes the class of the resolved method.
    AllDispatchKinds,
}

/// What a special invocation checks about the method it calls.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SpecialDispatchPolicy {
    /// Only that the method is not static.
    #[default]
    StaticnessOnly,

    /// Also that the method is declared by the calling class or one of its
    /// superclasses, apart from instance initializers.
    SuperclassRequired,
}

/// The order in which pending states are explored.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ExplorationOrder {
    /// Follow each branch to its end before starting on its siblings.
    #[default]
    DepthFirst,

    /// Explore the states in the order they were created.
    BreadthFirst,
}

/// The configuration for the engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The maximum number of instructions executed along a single branch.
    /// A branch that reaches it is aborted with an error.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_STEPS_PER_STATE`].
    pub maximum_steps_per_state: usize,

    /// The maximum number of states the engine holds at once. Successors
    /// beyond it are dropped.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_STATES`].
    pub maximum_states: usize,

    /// The maximum depth of the call stack.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_CALL_DEPTH`].
    pub maximum_call_depth: usize,

    /// The maximum number of objects in the heap of one state.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_HEAP_SIZE`].
    pub maximum_heap_size: usize,

    /// The maximum depth of each operand stack.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH`].
    pub maximum_operand_stack_depth: usize,

    pub initialization_policy: InitializationPolicy,

    pub special_dispatch_policy: SpecialDispatchPolicy,

    pub exploration_order: ExplorationOrder,
}

impl Config {
    /// Sets the `maximum_steps_per_state` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_steps_per_state(mut self, value: usize) -> Self {
        self.maximum_steps_per_state = value;
        self
    }

    /// Sets the `maximum_states` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_states(mut self, value: usize) -> Self {
        self.maximum_states = value;
        self
    }

    /// Sets the `maximum_call_depth` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_call_depth(mut self, value: usize) -> Self {
        self.maximum_call_depth = value;
        self
    }

    /// Sets the `maximum_heap_size` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_heap_size(mut self, value: usize) -> Self {
        self.maximum_heap_size = value;
        self
    }

    /// Sets the `maximum_operand_stack_depth` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_operand_stack_depth(mut self, value: usize) -> Self {
        self.maximum_operand_stack_depth = value;
        self
    }

    #[must_use]
    pub fn with_initialization_policy(mut self, policy: InitializationPolicy) -> Self {
        self.initialization_policy = policy;
        self
    }

    #[must_use]
    pub fn with_special_dispatch_policy(mut self, policy: SpecialDispatchPolicy) -> Self {
        self.special_dispatch_policy = policy;
        self
    }

    #[must_use]
    pub fn with_exploration_order(mut self, order: ExplorationOrder) -> Self {
        self.exploration_order = order;
        self
    }

    /// Gets the bounds that each state enforces on itself.
    #[must_use]
    pub fn limits(&self) -> Limits {
        Limits {
            call_depth:          self.maximum_call_depth,
            heap_size:           self.maximum_heap_size,
            operand_stack_depth: self.maximum_operand_stack_depth,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maximum_steps_per_state:     DEFAULT_MAXIMUM_STEPS_PER_STATE,
            maximum_states:              DEFAULT_MAXIMUM_STATES,
            maximum_call_depth:          DEFAULT_MAXIMUM_CALL_DEPTH,
            maximum_heap_size:           DEFAULT_MAXIMUM_HEAP_SIZE,
            maximum_operand_stack_depth: DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH,
            initialization_policy:       InitializationPolicy::default(),
            special_dispatch_policy:     SpecialDispatchPolicy::default(),
            exploration_order:           ExplorationOrder::default(),
        }
    }
}
