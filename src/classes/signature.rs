//! Names and signatures of classes, fields and methods.

use std::{fmt, sync::Arc};

use crate::{
    classes::descriptor::{self, TypeDescriptor},
    error::resolution::Result,
};

/// The internal name of a class, such as `pkg/Node`, or of an array class,
/// such as `[I` or `[Lpkg/Node;`.
///
/// Cloning is cheap as the name is shared.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ClassName(Arc<str>);

impl ClassName {
    /// Creates a class name from its internal form.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Gets the internal form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks whether the name denotes an array class.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.0.starts_with('[')
    }

    /// Gets the type of the members of an array class, or [`None`] if `self`
    /// is not an array class.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the array class name is malformed.
    pub fn component_type(&self) -> Result<Option<TypeDescriptor>> {
        match self.0.strip_prefix('[') {
            Some(member) => descriptor::parse_field(member).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A field, identified by its declaring class, descriptor and name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FieldSignature {
    pub class:      ClassName,
    pub descriptor: String,
    pub name:       String,
}

impl FieldSignature {
    #[must_use]
    pub fn new(
        class: impl Into<ClassName>,
        descriptor: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            class:      class.into(),
            descriptor: descriptor.into(),
            name:       name.into(),
        }
    }

    /// Gets the declared type of the field.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the descriptor is malformed.
    pub fn field_type(&self) -> Result<TypeDescriptor> {
        descriptor::parse_field(&self.descriptor)
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.class, self.descriptor, self.name)
    }
}

/// A method, identified by its declaring class, descriptor and name.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MethodSignature {
    pub class:      ClassName,
    pub descriptor: String,
    pub name:       String,
}

impl MethodSignature {
    #[must_use]
    pub fn new(
        class: impl Into<ClassName>,
        descriptor: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            class:      class.into(),
            descriptor: descriptor.into(),
            name:       name.into(),
        }
    }

    /// Gets the same method as declared in `class`.
    #[must_use]
    pub fn in_class(&self, class: ClassName) -> Self {
        Self {
            class,
            descriptor: self.descriptor.clone(),
            name: self.name.clone(),
        }
    }

    /// Checks whether `self` and `other` have the same name and descriptor,
    /// regardless of the declaring class.
    #[must_use]
    pub fn same_selector(&self, other: &Self) -> bool {
        self.name == other.name && self.descriptor == other.descriptor
    }

    /// Gets the parameter types, not counting any receiver.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the descriptor is malformed.
    pub fn parameter_types(&self) -> Result<Vec<TypeDescriptor>> {
        descriptor::parse_method(&self.descriptor).map(|(params, _)| params)
    }

    /// Gets the return type, which is [`TypeDescriptor::Void`] for methods
    /// that return nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the descriptor is malformed.
    pub fn return_type(&self) -> Result<TypeDescriptor> {
        descriptor::parse_method(&self.descriptor).map(|(_, ret)| ret)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.class, self.descriptor, self.name)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        classes::{
            descriptor::TypeDescriptor,
            signature::{ClassName, MethodSignature},
        },
        vm::value::PrimitiveType,
    };

    #[test]
    fn array_class_names_know_their_members() -> anyhow::Result<()> {
        let ints = ClassName::new("[I");
        assert!(ints.is_array());
        assert_eq!(
            ints.component_type()?,
            Some(TypeDescriptor::Primitive(PrimitiveType::Int))
        );

        let nodes = ClassName::new("[Lpkg/Node;");
        assert_eq!(
            nodes.component_type()?,
            Some(TypeDescriptor::Reference(ClassName::new("pkg/Node")))
        );

        assert_eq!(ClassName::new("pkg/Node").component_type()?, None);

        Ok(())
    }

    #[test]
    fn method_signatures_expose_their_types() -> anyhow::Result<()> {
        let method = MethodSignature::new("pkg/A", "(ILpkg/B;[J)Z", "check");
        assert_eq!(method.parameter_types()?.len(), 3);
        assert_eq!(
            method.return_type()?,
            TypeDescriptor::Primitive(PrimitiveType::Boolean)
        );
        assert_eq!(method.to_string(), "pkg/A:(ILpkg/B;[J)Z:check");

        let moved = method.in_class(ClassName::new("pkg/Sub"));
        assert!(moved.same_selector(&method));
        assert_ne!(moved, method);

        Ok(())
    }
}
