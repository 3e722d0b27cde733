//! Origins record where a symbol was first read from.
//!
//! They render as access paths such as `{ROOT}:this.next.value`, which is
//! also the text that trigger rule patterns are matched against.

use std::{fmt, sync::Arc};

use crate::{
    classes::signature::{ClassName, MethodSignature},
    constant::ROOT_ORIGIN_PREFIX,
    vm::value::Primitive,
};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Origin {
    /// A receiver or argument of the root method.
    Root { name: String },

    /// An instance field of the object that `container` resolved to.
    Field {
        container: Arc<Origin>,
        field:     String,
    },

    /// A static field of a class that was initialized before exploration.
    Static { class: ClassName, field: String },

    /// A member of the array that `array` resolved to.
    ArrayMember {
        array: Arc<Origin>,
        index: Box<Primitive>,
    },

    /// The length of the array that `array` resolved to.
    ArrayLength { array: Arc<Origin> },

    /// The result of a native call that was not executed.
    NativeResult {
        method:   MethodSignature,
        sequence: u32,
    },
}

impl Origin {
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self::Root { name: name.into() }
    }

    #[must_use]
    pub fn field(container: Arc<Origin>, field: impl Into<String>) -> Self {
        Self::Field {
            container,
            field: field.into(),
        }
    }

    #[must_use]
    pub fn array_member(array: Arc<Origin>, index: Primitive) -> Self {
        Self::ArrayMember {
            array,
            index: Box::new(index),
        }
    }

    #[must_use]
    pub fn array_length(array: Arc<Origin>) -> Self {
        Self::ArrayLength { array }
    }

    /// Gets the name of the field this origin reads, if it reads one.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::Field { field, .. } | Self::Static { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root { name } => write!(f, "{ROOT_ORIGIN_PREFIX}:{name}"),
            Self::Field { container, field } => write!(f, "{container}.{field}"),
            Self::Static { class, field } => write!(f, "[{class}].{field}"),
            Self::ArrayMember { array, index } => write!(f, "{array}[{index}]"),
            Self::ArrayLength { array } => write!(f, "{array}.length"),
            Self::NativeResult { method, sequence } => write!(f, "{method}@{sequence}"),
        }
    }
}
