//! The state of one branch of the exploration.
//!
//! A [`State`] owns a call stack, a heap, a path condition and the record of
//! which symbolic references have been resolved. Everything that is not tiny
//! is structurally shared, so [`State::fork`] is cheap whatever the heap
//! size, and a fork never observes writes made by its siblings.

pub mod frame;
pub mod heap;
pub mod object;
pub mod path_condition;
pub mod stack;

use std::{collections::BTreeMap, sync::Arc};

use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    classes::{
        descriptor::TypeDescriptor,
        signature::{ClassName, MethodSignature},
        ClassHierarchy,
        MethodInfo,
    },
    constant::{
        DEFAULT_MAXIMUM_CALL_DEPTH,
        DEFAULT_MAXIMUM_HEAP_SIZE,
        DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH,
        STACK_TRACE_FIELD_NAME,
    },
    error::execution::{Error, Result},
    vm::{
        state::{
            frame::{Frame, FrameKind},
            heap::Heap,
            object::Object,
            path_condition::{Clause, PathCondition},
        },
        value::{ObjectId, Origin, Primitive, PrimitiveType, Reference, SymbolId, SymbolicRef, Value},
    },
};

/// A logical clock that advances with every instruction and every fork.
///
/// Objects record the point at which they were created, which orders them
/// along a path.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct HistoryPoint(u64);

impl HistoryPoint {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The kinds of exception that the engine itself raises inside the
/// interpreted program.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Throwable {
    Verify,
    NullPointer,
    AbstractMethod,
    IncompatibleClassChange,
    NoSuchMethod,
    NoSuchField,
    IllegalAccess,
    NoClassDefFound,
    OutOfMemory,
    ArrayIndexOutOfBounds,
    StackOverflow,
}

impl Throwable {
    /// Gets the class of the exception object that is raised.
    #[must_use]
    pub fn class_name(self) -> ClassName {
        let name = match self {
            Self::Verify => "java/lang/VerifyError",
            Self::NullPointer => "java/lang/NullPointerException",
            Self::AbstractMethod => "java/lang/AbstractMethodError",
            Self::IncompatibleClassChange => "java/lang/IncompatibleClassChangeError",
            Self::NoSuchMethod => "java/lang/NoSuchMethodError",
            Self::NoSuchField => "java/lang/NoSuchFieldError",
            Self::IllegalAccess => "java/lang/IllegalAccessError",
            Self::NoClassDefFound => "java/lang/NoClassDefFoundError",
            Self::OutOfMemory => "java/lang/OutOfMemoryError",
            Self::ArrayIndexOutOfBounds => "java/lang/ArrayIndexOutOfBoundsException",
            Self::StackOverflow => "java/lang/StackOverflowError",
        };
        ClassName::new(name)
    }
}

/// How a branch ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The root method returned.
    Returned(Option<Value>),

    /// An exception escaped the root method.
    Uncaught {
        class:  ClassName,
        object: ObjectId,

        /// The kind, when the engine raised it.
        kind: Option<Throwable>,
    },

    /// The program signalled that an assertion failed.
    AssertionFailed,

    /// The program signalled that the branch is uninteresting but fine.
    Succeeded,
}

/// The resource bounds of a single state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Limits {
    pub call_depth:          usize,
    pub heap_size:           usize,
    pub operand_stack_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            call_depth:          DEFAULT_MAXIMUM_CALL_DEPTH,
            heap_size:           DEFAULT_MAXIMUM_HEAP_SIZE,
            operand_stack_depth: DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH,
        }
    }
}

/// The result of asking for a class to be initialized.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClassInit {
    /// The class is initialized and its static area exists.
    Ready,

    /// The class initializer's frame was pushed. The requesting instruction
    /// runs again once it returns.
    Suspended,

    /// Initialization raised an exception and the branch has halted.
    Raised,
}

/// One node of the exploration tree.
#[derive(Clone, Debug)]
pub struct State {
    /// Which alternative was taken at each fork, counting from 1.
    branch: Vec<u32>,

    /// A readable label for each of the alternatives in `branch`.
    labels: Vec<String>,

    frames:         Vec<Frame>,
    heap:           Heap,
    path_condition: PathCondition,

    /// What each resolved symbolic reference denotes. `None` stands for null.
    resolutions: Arc<BTreeMap<SymbolId, Option<ObjectId>>>,

    /// The static area object of every initialized class.
    statics: Arc<BTreeMap<ClassName, ObjectId>>,

    history_point: HistoryPoint,
    next_symbol:   u32,
    steps:         usize,
    outcome:       Option<Outcome>,
    limits:        Limits,
}

impl State {
    /// Creates a state with no frames and an empty heap.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            branch: Vec::new(),
            labels: Vec::new(),
            frames: Vec::new(),
            heap: Heap::new(),
            path_condition: PathCondition::new(),
            resolutions: Arc::default(),
            statics: Arc::default(),
            history_point: HistoryPoint::default(),
            next_symbol: 0,
            steps: 0,
            outcome: None,
            limits,
        }
    }

    /// Gets the position of the state in the exploration tree, such as `.1.2`
    /// for the second alternative of a fork inside the first alternative of an
    /// earlier one. The root is `.`.
    #[must_use]
    pub fn identifier(&self) -> String {
        if self.branch.is_empty() {
            ".".to_string()
        } else {
            format!(".{}", self.branch.iter().join("."))
        }
    }

    /// Gets the labels of the alternatives taken to reach this state.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Creates the successor for alternative `index` (counting from 1) of a
    /// fork.
    #[must_use]
    pub fn fork(&self, index: u32, label: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.enter_branch(index, label);
        child
    }

    /// Records that this state takes alternative `index` of a fork, reusing
    /// the state itself as the successor.
    pub fn enter_branch(&mut self, index: u32, label: impl Into<String>) {
        self.branch.push(index);
        self.labels.push(label.into());
        self.history_point = self.history_point.next();
    }

    #[must_use]
    pub fn history_point(&self) -> HistoryPoint {
        self.history_point
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Gets the number of instructions executed on this path.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Records that an instruction is about to execute.
    pub fn count_step(&mut self) {
        self.steps += 1;
        self.history_point = self.history_point.next();
    }

    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Gets the frame that is executing.
    ///
    /// # Errors
    ///
    /// If the call stack is empty.
    pub fn current_frame(&self) -> Result<&Frame> {
        self.frames.last().ok_or(Error::NoFrame)
    }

    /// Gets the frame that is executing.
    ///
    /// # Errors
    ///
    /// If the call stack is empty.
    pub fn current_frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames.last_mut().ok_or(Error::NoFrame)
    }

    /// Gets the program counter of the executing frame.
    ///
    /// # Errors
    ///
    /// If the call stack is empty.
    pub fn program_counter(&self) -> Result<u32> {
        self.current_frame().map(Frame::program_counter)
    }

    /// Gets the method of the executing frame.
    ///
    /// # Errors
    ///
    /// If the call stack is empty.
    pub fn current_method(&self) -> Result<&MethodSignature> {
        self.current_frame().map(Frame::method)
    }

    /// Moves the executing frame's program counter `offset` bytes forward.
    ///
    /// # Errors
    ///
    /// If the call stack is empty or the target is outside of the code.
    pub fn advance(&mut self, offset: u32) -> Result<()> {
        let frame = self.current_frame_mut()?;
        let target = frame.program_counter() + offset;
        frame.set_program_counter(target)
    }

    /// Pushes a frame running `method` on `arguments`. When it returns, the
    /// caller continues `return_offset` bytes past its current instruction.
    ///
    /// Returns `false`, having raised a stack overflow, if the call stack is
    /// already as deep as allowed.
    pub fn push_frame(
        &mut self,
        method: &MethodInfo,
        kind: FrameKind,
        arguments: Vec<Value>,
        return_offset: u32,
    ) -> bool {
        if self.frames.len() >= self.limits.call_depth {
            self.raise(Throwable::StackOverflow);
            return false;
        }
        if let Some(caller) = self.frames.last_mut() {
            caller.set_return_offset(return_offset);
        }
        let frame = Frame::new(method, kind, arguments, self.limits.operand_stack_depth);
        self.frames.push(frame);
        true
    }

    /// Removes the executing frame.
    ///
    /// # Errors
    ///
    /// If the call stack is empty.
    pub fn pop_frame(&mut self) -> Result<Frame> {
        self.frames.pop().ok_or(Error::NoFrame)
    }

    /// Pushes `value` onto the executing frame's operand stack.
    ///
    /// # Errors
    ///
    /// If there is no frame or its stack is full.
    pub fn push_operand(&mut self, value: Value) -> Result<()> {
        self.current_frame_mut()?.operands_mut().push(value)
    }

    /// Pops the top of the executing frame's operand stack.
    ///
    /// # Errors
    ///
    /// If there is no frame or its stack is empty.
    pub fn pop_operand(&mut self) -> Result<Value> {
        self.current_frame_mut()?.operands_mut().pop()
    }

    /// Pops the top `count` operands, returning them in the order they were
    /// pushed.
    ///
    /// # Errors
    ///
    /// If there is no frame or fewer than `count` operands.
    pub fn pop_operands(&mut self, count: usize) -> Result<Vec<Value>> {
        self.current_frame_mut()?.operands_mut().pop_many(count)
    }

    /// Reads the operand `depth` entries below the top without popping.
    ///
    /// # Errors
    ///
    /// If there is no frame or no such operand.
    pub fn peek_operand(&self, depth: usize) -> Result<&Value> {
        self.current_frame()?.operands().peek(depth)
    }

    /// Reads local `slot` of the executing frame.
    ///
    /// # Errors
    ///
    /// If there is no frame or no such slot.
    pub fn local(&self, slot: usize) -> Result<Option<&Value>> {
        self.current_frame()?.local(slot)
    }

    /// Writes local `slot` of the executing frame.
    ///
    /// # Errors
    ///
    /// If there is no frame or no such slot.
    pub fn set_local(&mut self, slot: usize, value: Value) -> Result<()> {
        self.current_frame_mut()?.set_local(slot, value)
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[must_use]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Adds `object` to the heap, or returns [`None`] if the heap is full.
    pub fn allocate(&mut self, object: Object) -> Option<ObjectId> {
        if self.heap.len() >= self.limits.heap_size {
            return None;
        }
        Some(self.heap.allocate(object))
    }

    /// Gets the object with identity `id`.
    ///
    /// # Errors
    ///
    /// If there is no such object.
    pub fn object(&self, id: ObjectId) -> Result<&Object> {
        self.heap.get(id)
    }

    /// Gets the object that `reference` denotes, or [`None`] for null.
    ///
    /// # Errors
    ///
    /// If `reference` is symbolic and has not been resolved on this path.
    pub fn dereference(&self, reference: &Reference) -> Result<Option<ObjectId>> {
        match reference {
            Reference::Null => Ok(None),
            Reference::Concrete(id) => Ok(Some(*id)),
            Reference::Symbolic(symbolic) => self.resolutions.get(&symbolic.id).copied().ok_or(
                Error::UnresolvedReference {
                    reference: symbolic.to_string(),
                },
            ),
        }
    }

    /// Creates a fresh symbol identity.
    pub fn fresh_symbol(&mut self) -> SymbolId {
        self.next_symbol += 1;
        SymbolId::new(self.next_symbol)
    }

    /// Creates a fresh primitive symbol of type `ty` read from `origin`.
    pub fn fresh_primitive(&mut self, ty: PrimitiveType, origin: Origin) -> Primitive {
        Primitive::Symbol {
            ty,
            id: self.fresh_symbol(),
            origin: Arc::new(origin),
        }
    }

    /// Creates a fresh symbolic reference of declared type `static_type` read
    /// from `origin`.
    pub fn fresh_reference(&mut self, static_type: ClassName, origin: Origin) -> SymbolicRef {
        SymbolicRef {
            id: self.fresh_symbol(),
            static_type,
            origin: Arc::new(origin),
        }
    }

    /// Creates a fresh symbolic value of type `ty` read from `origin`.
    pub fn fresh_value(&mut self, ty: &TypeDescriptor, origin: Origin) -> Value {
        match ty {
            TypeDescriptor::Primitive(p) => Value::Primitive(self.fresh_primitive(*p, origin)),
            TypeDescriptor::Reference(class) => {
                Value::Reference(Reference::Symbolic(self.fresh_reference(class.clone(), origin)))
            }
            TypeDescriptor::Void => Value::null(),
        }
    }

    /// Gets what `reference` was resolved to on this path, if it was.
    #[must_use]
    pub fn resolution(&self, reference: &SymbolicRef) -> Option<Reference> {
        self.resolutions.get(&reference.id).map(|target| match target {
            Some(id) => Reference::Concrete(*id),
            None => Reference::Null,
        })
    }

    #[must_use]
    pub fn path_condition(&self) -> &PathCondition {
        &self.path_condition
    }

    /// Conjoins the boolean `condition` to the path condition.
    pub fn assume(&mut self, condition: Primitive) {
        self.path_condition.push(Clause::Assume(condition));
    }

    /// Assumes that `reference` is null.
    ///
    /// # Errors
    ///
    /// If `reference` has already been resolved on this path.
    pub fn assume_null(&mut self, reference: &SymbolicRef) -> Result<()> {
        self.record_resolution(reference, None)?;
        self.path_condition.push(Clause::AssumeNull(reference.clone()));
        Ok(())
    }

    /// Assumes that `reference` denotes the existing object `object`.
    ///
    /// # Errors
    ///
    /// If `reference` has already been resolved or `object` does not exist.
    pub fn assume_aliases(&mut self, reference: &SymbolicRef, object: ObjectId) -> Result<()> {
        self.heap.get(object)?;
        self.record_resolution(reference, Some(object))?;
        self.path_condition.push(Clause::AssumeAliases {
            reference: reference.clone(),
            object,
        });
        Ok(())
    }

    /// Assumes that `reference` denotes a fresh object of class `class`, and
    /// creates that object with a fresh symbol for each of its fields, or for
    /// its length if it is an array.
    ///
    /// Returns [`None`] without changing anything if the heap is full.
    ///
    /// # Errors
    ///
    /// If `reference` has already been resolved or the class is unknown.
    pub fn assume_expands(
        &mut self,
        reference: &SymbolicRef,
        class: &ClassName,
        classes: &dyn ClassHierarchy,
    ) -> Result<Option<ObjectId>> {
        if self.resolutions.contains_key(&reference.id) {
            return Err(Error::AlreadyResolved {
                reference: reference.to_string(),
            });
        }
        if self.heap.len() >= self.limits.heap_size {
            return Ok(None);
        }

        let object = if class.is_array() {
            let origin = Origin::array_length(reference.origin.clone());
            let length = self.fresh_primitive(PrimitiveType::Int, origin);
            Object::array(class.clone(), length, self.history_point)
        } else {
            let mut fields = BTreeMap::new();
            for field in classes.instance_fields(class)? {
                let ty = field.field_type()?;
                let origin = Origin::field(reference.origin.clone(), field.name.clone());
                let value = self.fresh_value(&ty, origin);
                fields.insert(field.name, value);
            }
            Object::instance(class.clone(), fields, self.history_point)
        };

        let id = self.heap.allocate(object.with_origin(reference.clone()));
        self.record_resolution(reference, Some(id))?;
        self.path_condition.push(Clause::AssumeExpands {
            reference: reference.clone(),
            object:    id,
            class:     class.clone(),
        });
        Ok(Some(id))
    }

    fn record_resolution(&mut self, reference: &SymbolicRef, target: Option<ObjectId>) -> Result<()> {
        if self.resolutions.contains_key(&reference.id) {
            return Err(Error::AlreadyResolved {
                reference: reference.to_string(),
            });
        }
        Arc::make_mut(&mut self.resolutions).insert(reference.id, target);
        Ok(())
    }

    /// Gets the static area of `class`, if the class has been initialized.
    #[must_use]
    pub fn statics_of(&self, class: &ClassName) -> Option<ObjectId> {
        self.statics.get(class).copied()
    }

    /// Makes sure `class` is initialized on this path.
    ///
    /// A class with an initializer gets default static values and its
    /// initializer frame pushed. A class without one is taken to have been
    /// initialized before exploration started, so its static fields hold
    /// fresh symbols.
    ///
    /// # Errors
    ///
    /// If the class description is inconsistent.
    pub fn ensure_class_initialized(
        &mut self,
        class: &ClassName,
        classes: &dyn ClassHierarchy,
    ) -> Result<ClassInit> {
        if self.statics.contains_key(class) {
            return Ok(ClassInit::Ready);
        }

        let fields = match classes.static_fields(class) {
            Ok(fields) => fields,
            Err(error) => {
                self.raise(error.throwable());
                return Ok(ClassInit::Raised);
            }
        };
        let initializer = classes.class_initializer(class);

        let mut values = BTreeMap::new();
        for field in fields {
            let ty = field.field_type()?;
            let value = if initializer.is_some() {
                Value::default_for(&ty)
            } else {
                let origin = Origin::Static {
                    class: class.clone(),
                    field: field.name.clone(),
                };
                self.fresh_value(&ty, origin)
            };
            values.insert(field.name, value);
        }

        let Some(id) = self.allocate(Object::statics(class.clone(), values, self.history_point))
        else {
            self.raise(Throwable::OutOfMemory);
            return Ok(ClassInit::Raised);
        };
        Arc::make_mut(&mut self.statics).insert(class.clone(), id);
        debug!(target: "lazy_symex::vm::state", state = %self.identifier(), %class, "class initialized");

        match initializer {
            None => {
                self.path_condition
                    .push(Clause::AssumeClassInitialized(class.clone()));
                Ok(ClassInit::Ready)
            }
            Some(method) => {
                let info = classes.method(&method)?;
                if self.push_frame(&info, FrameKind::ClassInitializer, Vec::new(), 0) {
                    Ok(ClassInit::Suspended)
                } else {
                    Ok(ClassInit::Raised)
                }
            }
        }
    }

    /// Raises an exception of kind `kind` inside the interpreted program.
    ///
    /// Handler search is not modelled, so the exception escapes and the
    /// branch halts. The exception object is allocated even if the heap is
    /// full.
    pub fn raise(&mut self, kind: Throwable) -> ObjectId {
        let mut fields = BTreeMap::new();
        fields.insert(STACK_TRACE_FIELD_NAME.to_string(), Value::null());
        let object = Object::instance(kind.class_name(), fields, self.history_point);
        let id = self.heap.allocate(object);

        warn!(
            target: "lazy_symex::vm::state",
            state = %self.identifier(),
            pc = self.program_counter().unwrap_or_default(),
            ?kind,
            "exception raised"
        );
        self.frames.clear();
        self.outcome = Some(Outcome::Uncaught {
            class: kind.class_name(),
            object: id,
            kind: Some(kind),
        });
        id
    }

    /// Throws the existing exception object `object`.
    ///
    /// # Errors
    ///
    /// If `object` does not exist.
    pub fn throw(&mut self, object: ObjectId) -> Result<()> {
        let class = self.heap.get(object)?.class().clone();
        warn!(
            target: "lazy_symex::vm::state",
            state = %self.identifier(),
            %class,
            "exception thrown"
        );
        self.frames.clear();
        self.outcome = Some(Outcome::Uncaught {
            class,
            object,
            kind: None,
        });
        Ok(())
    }

    /// Ends the branch with `outcome`.
    pub fn halt(&mut self, outcome: Outcome) {
        self.frames.clear();
        self.outcome = Some(outcome);
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Checks whether the branch has ended.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.outcome.is_some()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
