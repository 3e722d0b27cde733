//! Objects stored in the heap.

use std::collections::BTreeMap;

use crate::{
    classes::signature::ClassName,
    vm::{
        state::HistoryPoint,
        value::{Primitive, SymbolicRef, Value},
    },
};

/// The contents of an object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObjectKind {
    /// An instance, with its fields keyed by name.
    Instance { fields: BTreeMap<String, Value> },

    /// An array. Members are keyed by the index term they were written or read
    /// at, so symbolic indices get their own entries.
    Array {
        length:  Primitive,
        members: BTreeMap<Primitive, Value>,
    },

    /// The static fields of a class.
    Statics { fields: BTreeMap<String, Value> },
}

/// An object in the heap.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Object {
    class: ClassName,
    kind:  ObjectKind,

    /// The symbolic reference this object was created to resolve, if any.
    origin: Option<SymbolicRef>,

    /// When the object was created.
    history_point: HistoryPoint,
}

impl Object {
    /// Creates an instance of `class` with the given field values.
    #[must_use]
    pub fn instance(
        class: ClassName,
        fields: BTreeMap<String, Value>,
        history_point: HistoryPoint,
    ) -> Self {
        let kind = ObjectKind::Instance { fields };
        Self {
            class,
            kind,
            origin: None,
            history_point,
        }
    }

    /// Creates an array of `class` with the given `length` and no members.
    #[must_use]
    pub fn array(class: ClassName, length: Primitive, history_point: HistoryPoint) -> Self {
        let kind = ObjectKind::Array {
            length,
            members: BTreeMap::new(),
        };
        Self {
            class,
            kind,
            origin: None,
            history_point,
        }
    }

    /// Creates the static area of `class`.
    #[must_use]
    pub fn statics(
        class: ClassName,
        fields: BTreeMap<String, Value>,
        history_point: HistoryPoint,
    ) -> Self {
        let kind = ObjectKind::Statics { fields };
        Self {
            class,
            kind,
            origin: None,
            history_point,
        }
    }

    /// Marks the object as the resolution of `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: SymbolicRef) -> Self {
        self.origin = Some(origin);
        self
    }

    #[must_use]
    pub fn class(&self) -> &ClassName {
        &self.class
    }

    #[must_use]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    #[must_use]
    pub fn origin(&self) -> Option<&SymbolicRef> {
        self.origin.as_ref()
    }

    /// Checks whether the object was created by resolving a symbolic
    /// reference.
    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        self.origin.is_some()
    }

    #[must_use]
    pub fn history_point(&self) -> HistoryPoint {
        self.history_point
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array { .. })
    }

    #[must_use]
    pub fn is_statics(&self) -> bool {
        matches!(self.kind, ObjectKind::Statics { .. })
    }

    /// Gets the value of the field `name`, if the object has fields and the
    /// field has been set.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match &self.kind {
            ObjectKind::Instance { fields } | ObjectKind::Statics { fields } => fields.get(name),
            ObjectKind::Array { .. } => None,
        }
    }

    /// Sets the field `name`, returning `false` if the object has no fields.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) -> bool {
        match &mut self.kind {
            ObjectKind::Instance { fields } | ObjectKind::Statics { fields } => {
                fields.insert(name.into(), value);
                true
            }
            ObjectKind::Array { .. } => false,
        }
    }

    /// Gets the length if the object is an array.
    #[must_use]
    pub fn array_length(&self) -> Option<&Primitive> {
        match &self.kind {
            ObjectKind::Array { length, .. } => Some(length),
            _ => None,
        }
    }

    /// Gets the member stored under exactly the index term `index`, if the
    /// object is an array.
    #[must_use]
    pub fn member(&self, index: &Primitive) -> Option<&Value> {
        match &self.kind {
            ObjectKind::Array { members, .. } => members.get(index),
            _ => None,
        }
    }

    /// Sets the member under `index`, returning `false` if the object is not
    /// an array.
    pub fn set_member(&mut self, index: Primitive, value: Value) -> bool {
        match &mut self.kind {
            ObjectKind::Array { members, .. } => {
                members.insert(index, value);
                true
            }
            _ => false,
        }
    }
}
