//! This module contains constants that are needed throughout the codebase.

/// The length in bytes of the `invokevirtual`, `invokespecial` and
/// `invokestatic` instructions, including their two-byte pool index.
pub const INVOKE_SPECIAL_STATIC_VIRTUAL_OFFSET: u32 = 3;

/// The length in bytes of the `invokeinterface` and `invokedynamic`
/// instructions, including their index and trailing operand bytes.
pub const INVOKE_DYNAMIC_INTERFACE_OFFSET: u32 = 5;

/// The length in bytes of the field access instructions (`getfield`,
/// `getstatic`, `putfield` and `putstatic`).
pub const FIELD_ACCESS_OFFSET: u32 = 3;

/// The length in bytes of the `new` instruction.
pub const NEW_OFFSET: u32 = 3;

/// The length in bytes of a load or store that carries an explicit one-byte
/// local slot index.
pub const LOCAL_INDEXED_OFFSET: u32 = 2;

/// The length in bytes of any single-byte instruction.
pub const SINGLE_BYTE_OFFSET: u32 = 1;

/// The first of the opcode bytes that are reserved and never appear in valid
/// bytecode.
pub const RESERVED_OPCODE_FIRST: u8 = 0xcb;

/// The last of the opcode bytes that are reserved and never appear in valid
/// bytecode.
pub const RESERVED_OPCODE_LAST: u8 = 0xfd;

/// The name of the instance initialization method.
pub const INSTANCE_INITIALIZER_NAME: &str = "<init>";

/// The name of the class initialization method.
pub const CLASS_INITIALIZER_NAME: &str = "<clinit>";

/// The descriptor of the class initialization method.
pub const CLASS_INITIALIZER_DESCRIPTOR: &str = "()V";

/// The name of the field holding the stack trace of a throwable object.
pub const STACK_TRACE_FIELD_NAME: &str = "stackTrace";

/// The prefix used when rendering the origin of the root method's symbolic
/// arguments.
pub const ROOT_ORIGIN_PREFIX: &str = "{ROOT}";

/// The name of the symbolic receiver of the root method.
pub const ROOT_THIS_NAME: &str = "this";

/// The default maximum number of instructions executed along one branch
/// before it is abandoned.
pub const DEFAULT_MAXIMUM_STEPS_PER_STATE: usize = 100_000;

/// The default maximum number of states that the engine retains across the
/// whole exploration.
pub const DEFAULT_MAXIMUM_STATES: usize = 10_000;

/// The default maximum depth of the call stack of a single state.
pub const DEFAULT_MAXIMUM_CALL_DEPTH: usize = 256;

/// The default maximum number of objects that may live in the heap of a single
/// state.
pub const DEFAULT_MAXIMUM_HEAP_SIZE: usize = 100_000;

/// The default maximum depth of the operand stack of a single frame.
pub const DEFAULT_MAXIMUM_OPERAND_STACK_DEPTH: usize = 1024;

/// The default number of loop iterations the engine will wait before polling
/// the watchdog.
pub const DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS: usize = 100;
