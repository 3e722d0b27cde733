//! The dispatch table mapping each opcode to the algorithm that executes it.

use crate::{
    algo::{
        array::ArrayLoad,
        invoke::Invoke,
        load::Load,
        run,
        simple::Simple,
        step,
        store::{PutField, PutStatic, StoreLocal},
        Continuation,
        Successor,
    },
    constant::{RESERVED_OPCODE_FIRST, RESERVED_OPCODE_LAST},
    error::execution::{Error, Result},
    opcode::{
        AALOAD,
        ACONST_NULL,
        ALOAD,
        ALOAD_0,
        ALOAD_3,
        ARETURN,
        ARRAYLENGTH,
        ASTORE,
        ASTORE_0,
        ATHROW,
        BALOAD,
        BIPUSH,
        CALOAD,
        DALOAD,
        DLOAD,
        DLOAD_0,
        DLOAD_3,
        DRETURN,
        DSTORE,
        DSTORE_0,
        DUP,
        FALOAD,
        FLOAD,
        FLOAD_0,
        FLOAD_3,
        FRETURN,
        FSTORE,
        FSTORE_0,
        GETFIELD,
        GETSTATIC,
        IADD,
        IALOAD,
        ICONST_0,
        ICONST_5,
        ICONST_M1,
        ILOAD,
        ILOAD_0,
        ILOAD_3,
        IMUL,
        INVOKEINTERFACE,
        INVOKESPECIAL,
        INVOKESTATIC,
        INVOKEVIRTUAL,
        IRETURN,
        ISTORE,
        ISTORE_0,
        ISUB,
        LADD,
        LALOAD,
        LCONST_0,
        LCONST_1,
        LLOAD,
        LLOAD_0,
        LLOAD_3,
        LMUL,
        LRETURN,
        LSTORE,
        LSTORE_0,
        LSUB,
        NEW,
        NOP,
        POP,
        PUTFIELD,
        PUTSTATIC,
        RETURN,
        SALOAD,
        SIPUSH,
    },
    vm::{
        context::ExecutionContext,
        state::{State, Throwable},
        value::{Category, Operator, Primitive, PrimitiveType},
    },
};

/// The number of implicit-slot variants per XLOAD and XSTORE opcode.
const IMPLICIT_SLOTS: u8 = 4;

/// The algorithm that executes an opcode.
///
/// The set of algorithms is closed, so the table holds them by value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Algorithm {
    Load(Load),
    ArrayLoad(ArrayLoad),
    StoreLocal(StoreLocal),
    PutField,
    PutStatic,
    Invoke(Invoke),
    Simple(Simple),

    /// A reserved opcode, which no valid class file contains.
    NotAllowed,

    /// An opcode that this engine does not implement.
    Unsupported { opcode: u8 },
}

impl Algorithm {
    /// Executes the algorithm on `state`, returning its successors.
    ///
    /// # Errors
    ///
    /// If the opcode is unsupported, or if the algorithm fails internally.
    pub fn execute(&self, state: State, context: &ExecutionContext) -> Result<Vec<Successor>> {
        match self {
            Self::Load(load) => run(load, state, context),
            Self::ArrayLoad(load) => run(load, state, context),
            Self::StoreLocal(store) => step(store, state, context),
            Self::PutField => step(&PutField, state, context),
            Self::PutStatic => step(&PutStatic, state, context),
            Self::Invoke(invoke) => step(invoke, state, context),
            Self::Simple(simple) => step(simple, state, context),
            Self::NotAllowed => {
                let mut state = state;
                state.raise(Throwable::Verify);
                Ok(vec![Successor::new(state, Continuation::Halt)])
            }
            Self::Unsupported { opcode } => Err(Error::UnsupportedOpcode { opcode: *opcode }),
        }
    }

    /// Selects the algorithm for `opcode`.
    #[must_use]
    pub fn for_opcode(opcode: u8) -> Self {
        match opcode {
            NOP => Self::Simple(Simple::Nop),
            ACONST_NULL => Self::Simple(Simple::AconstNull),
            ICONST_M1..=ICONST_5 => {
                let value = i32::from(opcode) - i32::from(ICONST_0);
                Self::Simple(Simple::Constant(Primitive::int(value)))
            }
            LCONST_0 | LCONST_1 => {
                let value = i64::from(opcode - LCONST_0);
                Self::Simple(Simple::Constant(Primitive::constant(PrimitiveType::Long, value)))
            }
            BIPUSH => Self::Simple(Simple::BiPush),
            SIPUSH => Self::Simple(Simple::SiPush),

            ILOAD => Self::Load(Load::local(Category::Int, None)),
            LLOAD => Self::Load(Load::local(Category::Long, None)),
            FLOAD => Self::Load(Load::local(Category::Float, None)),
            DLOAD => Self::Load(Load::local(Category::Double, None)),
            ALOAD => Self::Load(Load::local(Category::Reference, None)),
            ILOAD_0..=ILOAD_3 => Self::Load(Load::local(Category::Int, Some(opcode - ILOAD_0))),
            LLOAD_0..=LLOAD_3 => Self::Load(Load::local(Category::Long, Some(opcode - LLOAD_0))),
            FLOAD_0..=FLOAD_3 => Self::Load(Load::local(Category::Float, Some(opcode - FLOAD_0))),
            DLOAD_0..=DLOAD_3 => Self::Load(Load::local(Category::Double, Some(opcode - DLOAD_0))),
            ALOAD_0..=ALOAD_3 => {
                Self::Load(Load::local(Category::Reference, Some(opcode - ALOAD_0)))
            }

            IALOAD | BALOAD | CALOAD | SALOAD => Self::ArrayLoad(ArrayLoad::new(Category::Int)),
            LALOAD => Self::ArrayLoad(ArrayLoad::new(Category::Long)),
            FALOAD => Self::ArrayLoad(ArrayLoad::new(Category::Float)),
            DALOAD => Self::ArrayLoad(ArrayLoad::new(Category::Double)),
            AALOAD => Self::ArrayLoad(ArrayLoad::new(Category::Reference)),

            ISTORE => store(Category::Int, None),
            LSTORE => store(Category::Long, None),
            FSTORE => store(Category::Float, None),
            DSTORE => store(Category::Double, None),
            ASTORE => store(Category::Reference, None),
            _ if implicit_slot(opcode, ISTORE_0).is_some() => {
                store(Category::Int, implicit_slot(opcode, ISTORE_0))
            }
            _ if implicit_slot(opcode, LSTORE_0).is_some() => {
                store(Category::Long, implicit_slot(opcode, LSTORE_0))
            }
            _ if implicit_slot(opcode, FSTORE_0).is_some() => {
                store(Category::Float, implicit_slot(opcode, FSTORE_0))
            }
            _ if implicit_slot(opcode, DSTORE_0).is_some() => {
                store(Category::Double, implicit_slot(opcode, DSTORE_0))
            }
            _ if implicit_slot(opcode, ASTORE_0).is_some() => {
                store(Category::Reference, implicit_slot(opcode, ASTORE_0))
            }

            POP => Self::Simple(Simple::Pop),
            DUP => Self::Simple(Simple::Dup),
            IADD => arithmetic(Operator::Add, Category::Int),
            LADD => arithmetic(Operator::Add, Category::Long),
            ISUB => arithmetic(Operator::Sub, Category::Int),
            LSUB => arithmetic(Operator::Sub, Category::Long),
            IMUL => arithmetic(Operator::Mul, Category::Int),
            LMUL => arithmetic(Operator::Mul, Category::Long),

            IRETURN => Self::Simple(Simple::Return(Some(Category::Int))),
            LRETURN => Self::Simple(Simple::Return(Some(Category::Long))),
            FRETURN => Self::Simple(Simple::Return(Some(Category::Float))),
            DRETURN => Self::Simple(Simple::Return(Some(Category::Double))),
            ARETURN => Self::Simple(Simple::Return(Some(Category::Reference))),
            RETURN => Self::Simple(Simple::Return(None)),

            GETSTATIC => Self::Load(Load::static_field()),
            PUTSTATIC => Self::PutStatic,
            GETFIELD => Self::Load(Load::field()),
            PUTFIELD => Self::PutField,
            INVOKEVIRTUAL => Self::Invoke(Invoke::VIRTUAL),
            INVOKESPECIAL => Self::Invoke(Invoke::SPECIAL),
            INVOKESTATIC => Self::Invoke(Invoke::STATIC),
            INVOKEINTERFACE => Self::Invoke(Invoke::INTERFACE),
            NEW => Self::Simple(Simple::New),
            ARRAYLENGTH => Self::Simple(Simple::ArrayLength),
            ATHROW => Self::Simple(Simple::AThrow),

            RESERVED_OPCODE_FIRST..=RESERVED_OPCODE_LAST => Self::NotAllowed,
            _ => Self::Unsupported { opcode },
        }
    }
}

fn store(category: Category, slot: Option<u8>) -> Algorithm {
    Algorithm::StoreLocal(StoreLocal { category, slot })
}

fn arithmetic(op: Operator, category: Category) -> Algorithm {
    Algorithm::Simple(Simple::Arithmetic { op, category })
}

/// Gets the slot that `opcode` implies if it is one of the four variants
/// starting at `first`.
fn implicit_slot(opcode: u8, first: u8) -> Option<u8> {
    opcode
        .checked_sub(first)
        .filter(|slot| *slot < IMPLICIT_SLOTS)
}

/// The table of algorithms, indexed by opcode.
///
/// It is built once per exploration and shared read-only by every state.
#[derive(Clone, Debug)]
pub struct DispatchTable {
    algorithms: Box<[Algorithm; 256]>,
}

impl DispatchTable {
    /// Builds the table covering every opcode.
    #[must_use]
    pub fn new() -> Self {
        let algorithms = Box::new(std::array::from_fn(|opcode| {
            Algorithm::for_opcode(u8::try_from(opcode).unwrap_or(u8::MAX))
        }));
        Self { algorithms }
    }

    /// Gets the algorithm that executes `opcode`.
    #[must_use]
    pub fn algorithm(&self, opcode: u8) -> &Algorithm {
        &self.algorithms[usize::from(opcode)]
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        algo::{
            dispatch::{Algorithm, DispatchTable},
            invoke::Invoke,
            load::Load,
            simple::Simple,
            store::StoreLocal,
        },
        classes::{signature::MethodSignature, table::ClassTable, MethodFlags, MethodInfo},
        error::execution::Error,
        opcode::{
            ALOAD_2,
            ALOAD_3,
            ASTORE,
            DLOAD_3,
            DSTORE_0,
            FLOAD_3,
            IALOAD,
            ICONST_M1,
            ILOAD_3,
            INVOKEINTERFACE,
            LCONST_1,
            LLOAD_3,
        },
        vm::{
            context::ExecutionContext,
            state::{frame::FrameKind, Outcome, State, Throwable},
            value::{Category, Primitive, PrimitiveType},
        },
    };

    #[test]
    fn covers_the_implemented_opcodes() {
        let table = DispatchTable::new();
        assert_eq!(
            table.algorithm(ALOAD_2),
            &Algorithm::Load(Load::local(Category::Reference, Some(2)))
        );
        assert_eq!(
            table.algorithm(DSTORE_0 + 3),
            &Algorithm::StoreLocal(StoreLocal {
                category: Category::Double,
                slot:     Some(3),
            })
        );
        assert_eq!(
            table.algorithm(ASTORE),
            &Algorithm::StoreLocal(StoreLocal {
                category: Category::Reference,
                slot:     None,
            })
        );
        assert_eq!(
            table.algorithm(ICONST_M1),
            &Algorithm::Simple(Simple::Constant(Primitive::int(-1)))
        );
        assert_eq!(
            table.algorithm(LCONST_1),
            &Algorithm::Simple(Simple::Constant(Primitive::constant(PrimitiveType::Long, 1)))
        );
        assert_eq!(table.algorithm(INVOKEINTERFACE), &Algorithm::Invoke(Invoke::INTERFACE));
    }

    #[test]
    fn implicit_local_loads_end_at_slot_three() {
        let table = DispatchTable::new();
        let last = [
            (ILOAD_3, Category::Int),
            (LLOAD_3, Category::Long),
            (FLOAD_3, Category::Float),
            (DLOAD_3, Category::Double),
            (ALOAD_3, Category::Reference),
        ];
        for (opcode, category) in last {
            assert_eq!(
                table.algorithm(opcode),
                &Algorithm::Load(Load::local(category, Some(3)))
            );
        }
        assert!(matches!(table.algorithm(IALOAD), Algorithm::ArrayLoad(_)));
    }

    #[test]
    fn reserved_opcodes_are_not_allowed() {
        let table = DispatchTable::new();
        assert!((0xcb..=0xfd).all(|opcode| table.algorithm(opcode) == &Algorithm::NotAllowed));
        assert_eq!(table.algorithm(0xca), &Algorithm::Unsupported { opcode: 0xca });
        assert_eq!(table.algorithm(0xff), &Algorithm::Unsupported { opcode: 0xff });
    }

    #[test]
    fn executing_opcodes_outside_the_table() -> anyhow::Result<()> {
        let context = ExecutionContext::with_defaults(Arc::new(ClassTable::new()));
        let method = MethodInfo {
            signature:  MethodSignature::new("pkg/Main", "()V", "run"),
            flags:      MethodFlags::default(),
            max_locals: 0,
            code:       Arc::from(vec![0xcb]),
        };
        let mut state = State::default();
        state.push_frame(&method, FrameKind::Method, vec![], 0);

        let successors = Algorithm::NotAllowed.execute(state.clone(), &context)?;
        assert!(matches!(
            successors[0].state.outcome(),
            Some(Outcome::Uncaught {
                kind: Some(Throwable::Verify),
                ..
            })
        ));

        let result = Algorithm::Unsupported { opcode: 0xa7 }.execute(state, &context);
        assert!(matches!(result, Err(Error::UnsupportedOpcode { opcode: 0xa7 })));

        Ok(())
    }
}
