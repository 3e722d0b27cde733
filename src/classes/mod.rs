//! The engine's view of the program's classes.
//!
//! Loading and linking classes is the job of a [`ClassHierarchy`]
//! implementation supplied by the embedder. The engine only asks it questions:
//! what a constant pool entry refers to, which declaration a reference
//! resolves to, which override a receiver selects, and which types are
//! subtypes of which. [`table::ClassTable`] answers them from an in-memory
//! description of the classes.

pub mod descriptor;
pub mod signature;
pub mod table;

use std::{fmt::Debug, sync::Arc};

use crate::{
    classes::signature::{ClassName, FieldSignature, MethodSignature},
    error::resolution::Result,
};

/// The class at the root of every hierarchy.
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// The properties of a method that the engine dispatches on.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct MethodFlags {
    pub is_static:   bool,
    pub is_abstract: bool,
    pub is_native:   bool,
    pub is_private:  bool,
}

/// A method declaration together with its body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodInfo {
    /// The declaring class, descriptor and name.
    pub signature: MethodSignature,

    pub flags: MethodFlags,

    /// The number of local variable slots the body uses, including those
    /// taken by the receiver and the parameters.
    pub max_locals: u16,

    /// The bytecode of the body. Empty for abstract and native methods.
    pub code: Arc<[u8]>,
}

/// Answers the questions about the program's classes that execution needs.
///
/// Implementations are shared by every branch of an exploration and must not
/// change once exploration starts.
pub trait ClassHierarchy
where
    Self: Debug + Send + Sync,
{
    /// Gets the method referenced by the constant pool entry `index` of
    /// `class`. `is_interface` tells whether an interface method reference is
    /// expected.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if there is no such entry.
    fn method_ref(&self, class: &ClassName, index: u16, is_interface: bool)
        -> Result<MethodSignature>;

    /// Gets the field referenced by the constant pool entry `index` of
    /// `class`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if there is no such entry.
    fn field_ref(&self, class: &ClassName, index: u16) -> Result<FieldSignature>;

    /// Gets the class referenced by the constant pool entry `index` of
    /// `class`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if there is no such entry.
    fn class_ref(&self, class: &ClassName, index: u16) -> Result<ClassName>;

    /// Resolves `method` as referenced from code in `accessor`, returning the
    /// signature of the declaration it denotes.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] describing why resolution failed.
    fn resolve_method(
        &self,
        accessor: &ClassName,
        method: &MethodSignature,
        is_interface: bool,
    ) -> Result<MethodSignature>;

    /// Resolves `field` as referenced from code in `accessor`, returning the
    /// signature of the declaration it denotes.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] describing why resolution failed.
    fn resolve_field(&self, accessor: &ClassName, field: &FieldSignature)
        -> Result<FieldSignature>;

    /// Gets the declaration of the method with exactly the signature
    /// `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `method` is not declared by its class.
    fn method(&self, method: &MethodSignature) -> Result<MethodInfo>;

    /// Selects the implementation of `method` that a receiver of runtime class
    /// `receiver` executes, or [`None`] if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `receiver` is unknown or the selection is
    /// incompatible with the class structure.
    fn method_implementation(
        &self,
        receiver: &ClassName,
        method: &MethodSignature,
    ) -> Result<Option<MethodSignature>>;

    /// Checks whether `sub` is `sup` or one of its subtypes.
    fn is_subclass(&self, sub: &ClassName, sup: &ClassName) -> bool;

    /// Gets every instantiable class that is a subtype of `class`, itself
    /// included, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `class` is unknown.
    fn concrete_subclasses(&self, class: &ClassName) -> Result<Vec<ClassName>>;

    /// Gets the instance fields of `class`, inherited ones first.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `class` is unknown.
    fn instance_fields(&self, class: &ClassName) -> Result<Vec<FieldSignature>>;

    /// Gets the static fields declared by `class`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `class` is unknown.
    fn static_fields(&self, class: &ClassName) -> Result<Vec<FieldSignature>>;

    /// Gets the class initializer of `class`, if it declares one.
    fn class_initializer(&self, class: &ClassName) -> Option<MethodSignature>;

    /// Checks whether `method` is static.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `method` is not declared by its class.
    fn is_method_static(&self, method: &MethodSignature) -> Result<bool> {
        self.method(method).map(|info| info.flags.is_static)
    }

    /// Checks whether `method` is abstract.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `method` is not declared by its class.
    fn is_method_abstract(&self, method: &MethodSignature) -> Result<bool> {
        self.method(method).map(|info| info.flags.is_abstract)
    }

    /// Checks whether `method` is native.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `method` is not declared by its class.
    fn is_method_native(&self, method: &MethodSignature) -> Result<bool> {
        self.method(method).map(|info| info.flags.is_native)
    }
}

/// A dynamically dispatched, shareable [`ClassHierarchy`].
pub type DynClassHierarchy = Arc<dyn ClassHierarchy>;
