//! The values that the symbolic machine manipulates.
//!
//! A [`Value`] is either a [`Primitive`] or a [`Reference`]. Primitives are
//! expression trees over constants and symbols. References are null, a
//! concrete heap identity, or a [`SymbolicRef`] that has to be resolved before
//! anything can be read through it.

pub mod origin;

use std::{fmt, sync::Arc};

pub use origin::Origin;

use crate::classes::{descriptor::TypeDescriptor, signature::ClassName};

/// The identity of an object in a heap.
///
/// Identities are handed out in increasing order and never reused, so they
/// also record the order in which objects came to exist on a path.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ObjectId(u64);

impl ObjectId {
    #[must_use]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object[{}]", self.0)
    }
}

/// The identity of a symbol, unique along a path.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SymbolId(u32);

impl SymbolId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{V{}}}", self.0)
    }
}

/// The primitive types of the machine.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    /// Gets the type for a descriptor character such as `I`.
    #[must_use]
    pub fn from_descriptor(c: char) -> Option<Self> {
        let ty = match c {
            'Z' => Self::Boolean,
            'B' => Self::Byte,
            'C' => Self::Char,
            'S' => Self::Short,
            'I' => Self::Int,
            'J' => Self::Long,
            'F' => Self::Float,
            'D' => Self::Double,
            _ => return None,
        };
        Some(ty)
    }

    #[must_use]
    pub fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    /// Checks whether values of the type are stored narrower than an int.
    #[must_use]
    pub fn is_sub_int(self) -> bool {
        matches!(self, Self::Boolean | Self::Byte | Self::Char | Self::Short)
    }

    /// Checks whether the type is an integral type.
    #[must_use]
    pub fn is_integral(self) -> bool {
        !matches!(self, Self::Float | Self::Double)
    }

    /// Gets the type that values of this type have on the operand stack.
    #[must_use]
    pub fn widened(self) -> Self {
        if self.is_sub_int() {
            Self::Int
        } else {
            self
        }
    }

    #[must_use]
    pub fn category(self) -> Category {
        match self.widened() {
            Self::Long => Category::Long,
            Self::Float => Category::Float,
            Self::Double => Category::Double,
            _ => Category::Int,
        }
    }
}

/// The native categories of operand stack entries.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Category {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// Operators over primitives.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl Operator {
    /// Checks whether the operator yields a boolean.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        !matches!(self, Self::Add | Self::Sub | Self::Mul)
    }

    /// Gets the comparison that holds exactly when `self` does not.
    #[must_use]
    pub fn negated(self) -> Option<Self> {
        let op = match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Lt => Self::Ge,
            Self::Le => Self::Gt,
            Self::Gt => Self::Le,
            Self::Ge => Self::Lt,
            Self::Add | Self::Sub | Self::Mul | Self::And | Self::Or => return None,
        };
        Some(op)
    }

    /// Gets the comparison with its operands swapped, so that `a op b` holds
    /// exactly when `b op.flipped() a` does.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    /// Applies the operator to integral constants of type `ty`, wrapping on
    /// overflow as the machine does.
    #[must_use]
    pub fn fold(self, ty: PrimitiveType, left: i64, right: i64) -> i64 {
        let wrap = |v: i64| {
            if ty == PrimitiveType::Long {
                v
            } else {
                i64::from(v as i32)
            }
        };
        match self {
            Self::Add => wrap(left.wrapping_add(right)),
            Self::Sub => wrap(left.wrapping_sub(right)),
            Self::Mul => wrap(left.wrapping_mul(right)),
            Self::Eq => i64::from(left == right),
            Self::Ne => i64::from(left != right),
            Self::Lt => i64::from(left < right),
            Self::Le => i64::from(left <= right),
            Self::Gt => i64::from(left > right),
            Self::Ge => i64::from(left >= right),
            Self::And => i64::from(left != 0 && right != 0),
            Self::Or => i64::from(left != 0 || right != 0),
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

/// A primitive value, concrete or symbolic.
///
/// Floating point constants are stored as their bit patterns so that
/// primitives stay totally ordered. Folding only happens for integral types.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Primitive {
    Const {
        ty:    PrimitiveType,
        value: i64,
    },
    Symbol {
        ty:     PrimitiveType,
        id:     SymbolId,
        origin: Arc<Origin>,
    },
    Widen {
        ty:      PrimitiveType,
        operand: Box<Primitive>,
    },
    Binary {
        ty:    PrimitiveType,
        op:    Operator,
        left:  Box<Primitive>,
        right: Box<Primitive>,
    },
}

impl Primitive {
    #[must_use]
    pub fn constant(ty: PrimitiveType, value: i64) -> Self {
        Self::Const { ty, value }
    }

    #[must_use]
    pub fn int(value: i32) -> Self {
        Self::constant(PrimitiveType::Int, i64::from(value))
    }

    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::constant(PrimitiveType::Boolean, i64::from(value))
    }

    /// The zero value of `ty`.
    #[must_use]
    pub fn default_for(ty: PrimitiveType) -> Self {
        Self::constant(ty, 0)
    }

    #[must_use]
    pub fn ty(&self) -> PrimitiveType {
        match self {
            Self::Const { ty, .. }
            | Self::Symbol { ty, .. }
            | Self::Widen { ty, .. }
            | Self::Binary { ty, .. } => *ty,
        }
    }

    /// Gets the value if the primitive is a constant.
    #[must_use]
    pub fn as_const(&self) -> Option<i64> {
        match self {
            Self::Const { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Gets the symbol and its origin if the primitive is a bare symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<(SymbolId, &Origin)> {
        match self {
            Self::Symbol { id, origin, .. } => Some((*id, origin)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_concrete(&self) -> bool {
        matches!(self, Self::Const { .. })
    }

    /// Converts the value to the type it has on the operand stack.
    ///
    /// Sub-int constants become int constants; sub-int symbolic terms are
    /// wrapped in a widening conversion.
    #[must_use]
    pub fn widen(self) -> Self {
        let ty = self.ty();
        if !ty.is_sub_int() {
            return self;
        }
        match self {
            Self::Const { value, .. } => Self::int(value as i32),
            other => Self::Widen {
                ty:      PrimitiveType::Int,
                operand: Box::new(other),
            },
        }
    }

    /// Builds `left op right`, folding integral constants.
    #[must_use]
    pub fn binary(op: Operator, left: Self, right: Self) -> Self {
        let operand_ty = left.ty();
        let ty = if op.is_comparison() {
            PrimitiveType::Boolean
        } else {
            operand_ty
        };
        match (&left, &right) {
            (Self::Const { value: l, .. }, Self::Const { value: r, .. })
                if operand_ty.is_integral() =>
            {
                Self::constant(ty, op.fold(operand_ty, *l, *r))
            }
            _ => Self::Binary {
                ty,
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// Builds the negation of a comparison, or [`None`] if `self` is not a
    /// comparison or boolean constant.
    #[must_use]
    pub fn negate(&self) -> Option<Self> {
        match self {
            Self::Const {
                ty: PrimitiveType::Boolean,
                value,
            } => Some(Self::boolean(*value == 0)),
            Self::Binary {
                op, left, right, ..
            } => op
                .negated()
                .map(|neg| Self::binary(neg, (**left).clone(), (**right).clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const {
                ty: PrimitiveType::Boolean,
                value,
            } => write!(f, "{}", *value != 0),
            Self::Const { value, .. } => write!(f, "{value}"),
            Self::Symbol { id, .. } => write!(f, "{id}"),
            Self::Widen { ty, operand } => write!(f, "{}({operand})", ty.descriptor()),
            Self::Binary {
                op, left, right, ..
            } => write!(f, "({left} {} {right})", op.symbol()),
        }
    }
}

/// A reference whose resolution is deferred until it is first used.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SymbolicRef {
    pub id: SymbolId,

    /// The declared type of the location the reference was read from. Every
    /// object the reference may denote is a subtype of it.
    pub static_type: ClassName,

    /// Where the reference was read from.
    pub origin: Arc<Origin>,
}

impl fmt::Display for SymbolicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Reference {
    Null,
    Concrete(ObjectId),
    Symbolic(SymbolicRef),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Concrete(id) => write!(f, "{id}"),
            Self::Symbolic(symbolic) => write!(f, "{symbolic}"),
        }
    }
}

/// A value held in a local slot, operand stack entry, field or array member.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Primitive(Primitive),
    Reference(Reference),
}

impl Value {
    #[must_use]
    pub fn null() -> Self {
        Self::Reference(Reference::Null)
    }

    #[must_use]
    pub fn object(id: ObjectId) -> Self {
        Self::Reference(Reference::Concrete(id))
    }

    #[must_use]
    pub fn int(value: i32) -> Self {
        Self::Primitive(Primitive::int(value))
    }

    /// The value that a field or array member of type `ty` holds before
    /// anything is written to it.
    #[must_use]
    pub fn default_for(ty: &TypeDescriptor) -> Self {
        match ty {
            TypeDescriptor::Primitive(p) => Self::Primitive(Primitive::default_for(*p)),
            TypeDescriptor::Reference(_) | TypeDescriptor::Void => Self::null(),
        }
    }

    /// Gets the operand stack category the value belongs to.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Primitive(p) => p.ty().category(),
            Self::Reference(_) => Category::Reference,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            Self::Primitive(_) => None,
        }
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Self::Primitive(p) => Some(p),
            Self::Reference(_) => None,
        }
    }

    /// Gets the symbolic reference if the value is one.
    #[must_use]
    pub fn as_symbolic_reference(&self) -> Option<&SymbolicRef> {
        match self {
            Self::Reference(Reference::Symbolic(s)) => Some(s),
            _ => None,
        }
    }

    /// Converts sub-int primitives to their operand stack width.
    #[must_use]
    pub fn widen(self) -> Self {
        match self {
            Self::Primitive(p) => Self::Primitive(p.widen()),
            reference => reference,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => write!(f, "{p}"),
            Self::Reference(r) => write!(f, "{r}"),
        }
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        Self::Primitive(value)
    }
}

impl From<Reference> for Value {
    fn from(value: Reference) -> Self {
        Self::Reference(value)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::vm::value::{
        Category,
        Operator,
        Origin,
        Primitive,
        PrimitiveType,
        SymbolId,
        Value,
    };

    fn symbol(ty: PrimitiveType) -> Primitive {
        Primitive::Symbol {
            ty,
            id: SymbolId::new(1),
            origin: Arc::new(Origin::root("x")),
        }
    }

    #[test]
    fn sub_int_values_widen_to_int() {
        let byte = Primitive::constant(PrimitiveType::Byte, -3);
        assert_eq!(byte.widen(), Primitive::int(-3));

        let widened = symbol(PrimitiveType::Char).widen();
        assert_eq!(widened.ty(), PrimitiveType::Int);
        assert!(matches!(widened, Primitive::Widen { .. }));

        let long = symbol(PrimitiveType::Long);
        assert_eq!(long.clone().widen(), long);
    }

    #[test]
    fn folds_integral_constants_with_wrapping() {
        let sum = Primitive::binary(Operator::Add, Primitive::int(i32::MAX), Primitive::int(1));
        assert_eq!(sum, Primitive::int(i32::MIN));

        let less = Primitive::binary(Operator::Lt, Primitive::int(1), Primitive::int(2));
        assert_eq!(less, Primitive::boolean(true));
    }

    #[test]
    fn keeps_symbolic_terms_symbolic() {
        let term = Primitive::binary(Operator::Ge, symbol(PrimitiveType::Int), Primitive::int(0));
        assert_eq!(term.ty(), PrimitiveType::Boolean);
        assert_eq!(term.to_string(), "({V1} >= 0)");

        let negated = term.negate().expect("comparisons negate");
        assert_eq!(negated.to_string(), "({V1} < 0)");
    }

    #[test]
    fn values_report_their_stack_category() {
        assert_eq!(Value::int(1).category(), Category::Int);
        assert_eq!(
            Value::Primitive(Primitive::constant(PrimitiveType::Short, 1)).category(),
            Category::Int
        );
        assert_eq!(Value::null().category(), Category::Reference);
    }
}
