//! Parsing of field and method type descriptors.

use std::fmt;

use crate::{
    classes::signature::ClassName,
    error::resolution::{Error, Result},
    vm::value::{Category, PrimitiveType},
};

/// The type named by a descriptor.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TypeDescriptor {
    Primitive(PrimitiveType),

    /// A class or array class.
    Reference(ClassName),

    /// Only valid as a method return type.
    Void,
}

impl TypeDescriptor {
    /// Gets the operand stack category of values of this type, or [`None`]
    /// for [`Self::Void`].
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Primitive(ty) => Some(ty.category()),
            Self::Reference(_) => Some(Category::Reference),
            Self::Void => None,
        }
    }

    /// Checks whether the type is a reference type.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(ty) => write!(f, "{}", ty.descriptor()),
            Self::Reference(class) if class.is_array() => write!(f, "{class}"),
            Self::Reference(class) => write!(f, "L{class};"),
            Self::Void => f.write_str("V"),
        }
    }
}

/// Parses a complete field descriptor such as `I` or `[Lpkg/Node;`.
///
/// # Errors
///
/// Returns [`Err`] if `descriptor` is not exactly one field type.
pub fn parse_field(descriptor: &str) -> Result<TypeDescriptor> {
    match parse_one(descriptor, 0)? {
        (TypeDescriptor::Void, _) => Err(malformed(descriptor)),
        (ty, end) if end == descriptor.len() => Ok(ty),
        _ => Err(malformed(descriptor)),
    }
}

/// Parses a method descriptor such as `(ILpkg/Node;)V` into its parameter
/// types and return type.
///
/// # Errors
///
/// Returns [`Err`] if `descriptor` is malformed.
pub fn parse_method(descriptor: &str) -> Result<(Vec<TypeDescriptor>, TypeDescriptor)> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(malformed(descriptor));
    }

    let mut parameters = Vec::new();
    let mut position = 1;
    loop {
        match bytes.get(position) {
            Some(b')') => break,
            Some(_) => {
                let (ty, end) = parse_one(descriptor, position)?;
                if ty == TypeDescriptor::Void {
                    return Err(malformed(descriptor));
                }
                parameters.push(ty);
                position = end;
            }
            None => return Err(malformed(descriptor)),
        }
    }

    let (ret, end) = parse_one(descriptor, position + 1)?;
    if end != descriptor.len() {
        return Err(malformed(descriptor));
    }

    Ok((parameters, ret))
}

/// Parses one type starting at byte `start`, returning it with the offset just
/// past it.
fn parse_one(descriptor: &str, start: usize) -> Result<(TypeDescriptor, usize)> {
    let bytes = descriptor.as_bytes();
    let Some(&first) = bytes.get(start) else {
        return Err(malformed(descriptor));
    };

    match first {
        b'V' => Ok((TypeDescriptor::Void, start + 1)),
        b'L' => {
            let end = descriptor[start..]
                .find(';')
                .map(|offset| start + offset)
                .ok_or_else(|| malformed(descriptor))?;
            if end == start + 1 {
                return Err(malformed(descriptor));
            }
            let class = ClassName::new(&descriptor[start + 1..end]);
            Ok((TypeDescriptor::Reference(class), end + 1))
        }
        b'[' => {
            let (member, end) = parse_one(descriptor, start + 1)?;
            if member == TypeDescriptor::Void {
                return Err(malformed(descriptor));
            }
            let class = ClassName::new(&descriptor[start..end]);
            Ok((TypeDescriptor::Reference(class), end))
        }
        other => PrimitiveType::from_descriptor(other as char)
            .map(|ty| (TypeDescriptor::Primitive(ty), start + 1))
            .ok_or_else(|| malformed(descriptor)),
    }
}

fn malformed(descriptor: &str) -> Error {
    Error::MalformedDescriptor {
        descriptor: descriptor.to_string(),
    }
}
