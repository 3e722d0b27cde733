//! An in-memory [`ClassHierarchy`] built from class descriptions.
//!
//! Classes are described with [`ClassBuilder`] and collected into a
//! [`ClassTable`]. Resolution follows the usual rules for a single-inheritance
//! hierarchy with interfaces: members are looked up in the class, then its
//! superclasses, then its superinterfaces, and private members are only
//! accessible from their declaring class.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    classes::{
        descriptor::TypeDescriptor,
        signature::{ClassName, FieldSignature, MethodSignature},
        ClassHierarchy,
        MethodFlags,
        MethodInfo,
        OBJECT_CLASS,
    },
    constant::{CLASS_INITIALIZER_DESCRIPTOR, CLASS_INITIALIZER_NAME},
    error::resolution::{Error, Result},
};

/// An entry in a class's constant pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PoolEntry {
    Class(ClassName),
    Field(FieldSignature),
    Method(MethodSignature),
    InterfaceMethod(MethodSignature),
}

/// A field declared by a class.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldInfo {
    pub name:       String,
    pub descriptor: String,
    pub is_static:  bool,
    pub is_private: bool,
}

/// The description of one class or interface.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassInfo {
    pub name:         ClassName,
    pub superclass:   Option<ClassName>,
    pub interfaces:   Vec<ClassName>,
    pub is_interface: bool,
    pub is_abstract:  bool,
    pub fields:       Vec<FieldInfo>,
    pub methods:      Vec<MethodInfo>,

    /// Constant pool entries, where entry `i` has index `i + 1`.
    pub pool: Vec<PoolEntry>,
}

impl ClassInfo {
    fn declared_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.signature.name == name && m.signature.descriptor == descriptor)
    }

    fn declared_field(&self, name: &str, descriptor: &str) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
    }

    fn pool_entry(&self, index: u16) -> Result<&PoolEntry> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.pool.get(i))
            .ok_or_else(|| Error::InvalidPoolIndex {
                class: self.name.to_string(),
                index,
            })
    }

    fn is_instantiable(&self) -> bool {
        !self.is_interface && !self.is_abstract
    }
}

/// Builds a [`ClassInfo`].
#[derive(Clone, Debug)]
pub struct ClassBuilder {
    info: ClassInfo,
}

impl ClassBuilder {
    /// Starts describing a concrete class named `name` that extends the root
    /// class.
    #[must_use]
    pub fn new(name: impl Into<ClassName>) -> Self {
        let name = name.into();
        let superclass = (name.as_str() != OBJECT_CLASS).then(|| ClassName::new(OBJECT_CLASS));
        let info = ClassInfo {
            name,
            superclass,
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            fields: Vec::new(),
            methods: Vec::new(),
            pool: Vec::new(),
        };
        Self { info }
    }

    #[must_use]
    pub fn extends(mut self, superclass: impl Into<ClassName>) -> Self {
        self.info.superclass = Some(superclass.into());
        self
    }

    #[must_use]
    pub fn implements(mut self, interface: impl Into<ClassName>) -> Self {
        self.info.interfaces.push(interface.into());
        self
    }

    /// Marks the class as an interface, which makes it abstract too.
    #[must_use]
    pub fn interface(mut self) -> Self {
        self.info.is_interface = true;
        self.info.is_abstract = true;
        self
    }

    #[must_use]
    pub fn abstract_class(mut self) -> Self {
        self.info.is_abstract = true;
        self
    }

    /// Declares an instance field.
    #[must_use]
    pub fn field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.field_with(name, descriptor, false, false)
    }

    /// Declares a static field.
    #[must_use]
    pub fn static_field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.field_with(name, descriptor, true, false)
    }

    /// Declares a private instance field.
    #[must_use]
    pub fn private_field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.field_with(name, descriptor, false, true)
    }

    fn field_with(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        is_static: bool,
        is_private: bool,
    ) -> Self {
        self.info.fields.push(FieldInfo {
            name: name.into(),
            descriptor: descriptor.into(),
            is_static,
            is_private,
        });
        self
    }

    /// Declares a method with the given `flags`, `max_locals` and body.
    #[must_use]
    pub fn method(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        flags: MethodFlags,
        max_locals: u16,
        code: impl Into<Arc<[u8]>>,
    ) -> Self {
        let signature = MethodSignature::new(self.info.name.clone(), descriptor, name);
        self.info.methods.push(MethodInfo {
            signature,
            flags,
            max_locals,
            code: code.into(),
        });
        self
    }

    /// Declares an abstract method.
    #[must_use]
    pub fn abstract_method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        let flags = MethodFlags {
            is_abstract: true,
            ..MethodFlags::default()
        };
        self.method(name, descriptor, flags, 0, Vec::<u8>::new())
    }

    /// Declares a native method.
    #[must_use]
    pub fn native_method(
        self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        is_static: bool,
    ) -> Self {
        let flags = MethodFlags {
            is_native: true,
            is_static,
            ..MethodFlags::default()
        };
        self.method(name, descriptor, flags, 0, Vec::<u8>::new())
    }

    /// Appends `entry` to the constant pool. The first entry has index 1.
    #[must_use]
    pub fn pool(mut self, entry: PoolEntry) -> Self {
        self.info.pool.push(entry);
        self
    }

    #[must_use]
    pub fn build(self) -> ClassInfo {
        self.info
    }
}

/// A [`ClassHierarchy`] over a fixed set of classes.
///
/// The root class is always present.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassTable {
    classes: BTreeMap<ClassName, ClassInfo>,
}

impl ClassTable {
    /// Creates a table containing only the root class.
    #[must_use]
    pub fn new() -> Self {
        let mut classes = BTreeMap::new();
        let object = ClassBuilder::new(OBJECT_CLASS).build();
        classes.insert(object.name.clone(), object);
        Self { classes }
    }

    /// Adds `class`, replacing any class with the same name.
    pub fn add(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Adds `class`, returning the table.
    #[must_use]
    pub fn with(mut self, class: ClassInfo) -> Self {
        self.add(class);
        self
    }

    /// Gets the description of `class`.
    #[must_use]
    pub fn class(&self, class: &ClassName) -> Option<&ClassInfo> {
        self.classes.get(class)
    }

    fn get(&self, class: &ClassName) -> Result<&ClassInfo> {
        self.classes.get(class).ok_or_else(|| Error::ClassNotFound {
            class: class.to_string(),
        })
    }

    /// The chain made of `class` and its superclasses, most derived first.
    fn superclass_chain(&self, class: &ClassName) -> Vec<&ClassInfo> {
        let mut chain = Vec::new();
        let mut current = self.classes.get(class);
        while let Some(info) = current {
            chain.push(info);
            current = info.superclass.as_ref().and_then(|s| self.classes.get(s));
        }
        chain
    }

    /// Every interface that `class` implements, directly or not, in
    /// breadth-first order without duplicates.
    fn superinterfaces(&self, class: &ClassName) -> Vec<&ClassInfo> {
        let mut seen = BTreeSet::new();
        let mut queue: Vec<&ClassName> = self
            .superclass_chain(class)
            .into_iter()
            .flat_map(|c| c.interfaces.iter())
            .collect();
        let mut result = Vec::new();
        while !queue.is_empty() {
            let name = queue.remove(0);
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(info) = self.classes.get(name) {
                queue.extend(info.interfaces.iter());
                result.push(info);
            }
        }
        result
    }

    fn lookup_method(&self, class: &ClassName, method: &MethodSignature) -> Option<&MethodInfo> {
        let in_classes = self
            .superclass_chain(class)
            .into_iter()
            .find_map(|c| c.declared_method(&method.name, &method.descriptor));
        in_classes.or_else(|| {
            self.superinterfaces(class)
                .into_iter()
                .find_map(|c| c.declared_method(&method.name, &method.descriptor))
        })
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassHierarchy for ClassTable {
    fn method_ref(
        &self,
        class: &ClassName,
        index: u16,
        is_interface: bool,
    ) -> Result<MethodSignature> {
        let info = self.get(class)?;
        match (info.pool_entry(index)?, is_interface) {
            (PoolEntry::Method(method), false) | (PoolEntry::InterfaceMethod(method), true) => {
                Ok(method.clone())
            }
            _ => Err(Error::InvalidPoolIndex {
                class: class.to_string(),
                index,
            }),
        }
    }

    fn field_ref(&self, class: &ClassName, index: u16) -> Result<FieldSignature> {
        let info = self.get(class)?;
        match info.pool_entry(index)? {
            PoolEntry::Field(field) => Ok(field.clone()),
            _ => Err(Error::InvalidPoolIndex {
                class: class.to_string(),
                index,
            }),
        }
    }

    fn class_ref(&self, class: &ClassName, index: u16) -> Result<ClassName> {
        let info = self.get(class)?;
        match info.pool_entry(index)? {
            PoolEntry::Class(name) => Ok(name.clone()),
            _ => Err(Error::InvalidPoolIndex {
                class: class.to_string(),
                index,
            }),
        }
    }

    fn resolve_method(
        &self,
        accessor: &ClassName,
        method: &MethodSignature,
        is_interface: bool,
    ) -> Result<MethodSignature> {
        let target = self.get(&method.class)?;
        if target.is_interface != is_interface {
            return Err(Error::IncompatibleClassChange {
                class:  method.class.to_string(),
                member: method.to_string(),
            });
        }

        let found = self
            .lookup_method(&method.class, method)
            .ok_or_else(|| Error::MethodNotFound {
                method: method.to_string(),
            })?;

        if found.flags.is_private && &found.signature.class != accessor {
            return Err(Error::MethodNotAccessible {
                method:   found.signature.to_string(),
                accessor: accessor.to_string(),
            });
        }

        Ok(found.signature.clone())
    }

    fn resolve_field(
        &self,
        accessor: &ClassName,
        field: &FieldSignature,
    ) -> Result<FieldSignature> {
        self.get(&field.class)?;

        let candidates = self
            .superclass_chain(&field.class)
            .into_iter()
            .chain(self.superinterfaces(&field.class));
        for class in candidates {
            if let Some(found) = class.declared_field(&field.name, &field.descriptor) {
                if found.is_private && &class.name != accessor {
                    return Err(Error::FieldNotAccessible {
                        field:    field.to_string(),
                        accessor: accessor.to_string(),
                    });
                }
                return Ok(FieldSignature::new(
                    class.name.clone(),
                    found.descriptor.clone(),
                    found.name.clone(),
                ));
            }
        }

        Err(Error::FieldNotFound {
            field: field.to_string(),
        })
    }

    fn method(&self, method: &MethodSignature) -> Result<MethodInfo> {
        self.get(&method.class)?
            .declared_method(&method.name, &method.descriptor)
            .cloned()
            .ok_or_else(|| Error::MethodNotFound {
                method: method.to_string(),
            })
    }

    fn method_implementation(
        &self,
        receiver: &ClassName,
        method: &MethodSignature,
    ) -> Result<Option<MethodSignature>> {
        let receiver = if receiver.is_array() {
            ClassName::new(OBJECT_CLASS)
        } else {
            receiver.clone()
        };
        let info = self.get(&receiver)?;
        if info.is_interface {
            return Err(Error::IncompatibleClassChange {
                class:  receiver.to_string(),
                member: method.to_string(),
            });
        }

        // Overrides in the class chain win over interface defaults.
        let in_classes = self
            .superclass_chain(&receiver)
            .into_iter()
            .find_map(|c| c.declared_method(&method.name, &method.descriptor))
            .filter(|m| !m.flags.is_static);
        if let Some(found) = in_classes {
            return Ok(Some(found.signature.clone()));
        }

        let default = self
            .superinterfaces(&receiver)
            .into_iter()
            .filter_map(|c| c.declared_method(&method.name, &method.descriptor))
            .find(|m| !m.flags.is_abstract && !m.flags.is_static);
        Ok(default.map(|m| m.signature.clone()))
    }

    fn is_subclass(&self, sub: &ClassName, sup: &ClassName) -> bool {
        if sub == sup || sup.as_str() == OBJECT_CLASS {
            return true;
        }

        if sub.is_array() || sup.is_array() {
            return match (sub.component_type(), sup.component_type()) {
                (Ok(Some(sub_member)), Ok(Some(sup_member))) => {
                    match (sub_member, sup_member) {
                        (TypeDescriptor::Reference(a), TypeDescriptor::Reference(b)) => {
                            self.is_subclass(&a, &b)
                        }
                        (a, b) => a == b,
                    }
                }
                _ => false,
            };
        }

        self.superclass_chain(sub).iter().any(|c| &c.name == sup)
            || self.superinterfaces(sub).iter().any(|c| &c.name == sup)
    }

    fn concrete_subclasses(&self, class: &ClassName) -> Result<Vec<ClassName>> {
        if class.is_array() {
            return Ok(vec![class.clone()]);
        }
        self.get(class)?;

        Ok(self
            .classes
            .values()
            .filter(|c| c.is_instantiable() && self.is_subclass(&c.name, class))
            .map(|c| c.name.clone())
            .collect())
    }

    fn instance_fields(&self, class: &ClassName) -> Result<Vec<FieldSignature>> {
        if class.is_array() {
            return Ok(Vec::new());
        }
        self.get(class)?;

        let mut chain = self.superclass_chain(class);
        chain.reverse();
        Ok(chain
            .into_iter()
            .flat_map(|c| {
                c.fields.iter().filter(|f| !f.is_static).map(|f| {
                    FieldSignature::new(c.name.clone(), f.descriptor.clone(), f.name.clone())
                })
            })
            .collect())
    }

    fn static_fields(&self, class: &ClassName) -> Result<Vec<FieldSignature>> {
        let info = self.get(class)?;
        Ok(info
            .fields
            .iter()
            .filter(|f| f.is_static)
            .map(|f| FieldSignature::new(class.clone(), f.descriptor.clone(), f.name.clone()))
            .collect())
    }

    fn class_initializer(&self, class: &ClassName) -> Option<MethodSignature> {
        self.classes
            .get(class)?
            .declared_method(CLASS_INITIALIZER_NAME, CLASS_INITIALIZER_DESCRIPTOR)
            .map(|m| m.signature.clone())
    }
}
