//! This module contains useful macros for working with bytecode and opcodes.

/// Something that can be written into a bytecode sequence.
pub trait Encode {
    fn encode(&self) -> Vec<u8>;
}

impl Encode for u8 {
    fn encode(&self) -> Vec<u8> {
        vec![*self]
    }
}

/// A two-byte constant pool index operand, written big-endian.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Index(pub u16);

impl Encode for Index {
    fn encode(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }
}

/// A two-byte signed immediate operand, written big-endian.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Short(pub i16);

impl Encode for Short {
    fn encode(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }
}

/// Constructs a bytecode input from opcodes and their operands.
///
/// # Usage
///
/// ```
/// use lazy_symex::{
///     bytecode,
///     opcode::{macros::Index, ALOAD_0, ARETURN, GETFIELD},
/// };
///
/// let bytes = bytecode![ALOAD_0, GETFIELD, Index(1), ARETURN];
/// assert_eq!(bytes, vec![0x2a, 0xb4, 0x00, 0x01, 0xb0]);
/// ```
#[macro_export]
macro_rules! bytecode {
    ($($item:expr),*$(,)?) => {{
        use $crate::opcode::macros::Encode;
        let mut vec: Vec<u8> = vec![];
        $(vec.extend($item.encode());)*
        vec
    }};
}

// Export it scoped
pub use bytecode;
