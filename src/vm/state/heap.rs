//! The copy-on-write heap.
//!
//! A [`Heap`] is an arena of shared object cells. Cloning a heap only bumps a
//! reference count. The first write to an object after a clone copies the
//! arena's table of cells and then that one object. Every other object stays
//! shared between the snapshots, so a write is never visible through any other
//! snapshot.
//!
//! Copying the table costs one pointer per object in the heap, and a branch
//! pays it once, on its first write or allocation. Later writes on the same
//! branch only copy the objects they touch for the first time.

use std::sync::Arc;

use crate::{
    error::execution::{Error, Result},
    vm::{
        state::object::Object,
        value::{ObjectId, Value},
    },
};

/// A mapping from object identities to objects, shared structurally between
/// the states of an exploration.
///
/// Identities start at 1 and are assigned in increasing order. They are never
/// reused, so the heap never shrinks.
#[derive(Clone, Debug, Default)]
pub struct Heap {
    objects: Arc<Vec<Arc<Object>>>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `object` under a fresh identity.
    pub fn allocate(&mut self, object: Object) -> ObjectId {
        let objects = Arc::make_mut(&mut self.objects);
        objects.push(Arc::new(object));
        ObjectId::new(objects.len() as u64)
    }

    /// Gets the identity that the next allocation will receive.
    #[must_use]
    pub fn next_id(&self) -> ObjectId {
        ObjectId::new(self.objects.len() as u64 + 1)
    }

    /// Gets the object with identity `id`.
    ///
    /// # Errors
    ///
    /// If there is no such object.
    pub fn get(&self, id: ObjectId) -> Result<&Object> {
        Self::index(id)
            .and_then(|i| self.objects.get(i))
            .map(|object| &**object)
            .ok_or(Error::NoSuchObject { id })
    }

    /// Gets the object with identity `id` for writing, copying it first if any
    /// other snapshot still shares it.
    ///
    /// # Errors
    ///
    /// If there is no such object.
    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        let index = Self::index(id)
            .filter(|i| *i < self.objects.len())
            .ok_or(Error::NoSuchObject { id })?;
        let objects = Arc::make_mut(&mut self.objects);
        Ok(Arc::make_mut(&mut objects[index]))
    }

    /// Reads the field `name` of the object `id`, if it has been set.
    ///
    /// # Errors
    ///
    /// If there is no such object.
    pub fn read(&self, id: ObjectId, name: &str) -> Result<Option<&Value>> {
        self.get(id).map(|object| object.field(name))
    }

    /// Writes `value` to the field `name` of the object `id`.
    ///
    /// # Errors
    ///
    /// If there is no such object or it has no fields.
    pub fn write(&mut self, id: ObjectId, name: &str, value: Value) -> Result<()> {
        let object = self.get_mut(id)?;
        if object.set_field(name, value) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: "an object with fields".into(),
                found:    object.class().to_string(),
            })
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over the objects in order of identity.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, object)| (ObjectId::new(i as u64 + 1), &**object))
    }

    /// Checks whether `self` and `other` still share the storage of object
    /// `id`.
    #[must_use]
    pub fn shares_object_with(&self, other: &Heap, id: ObjectId) -> bool {
        let Some(index) = Self::index(id) else {
            return false;
        };
        match (self.objects.get(index), other.objects.get(index)) {
            (Some(mine), Some(theirs)) => Arc::ptr_eq(mine, theirs),
            _ => false,
        }
    }

    fn index(id: ObjectId) -> Option<usize> {
        usize::try_from(id.raw()).ok()?.checked_sub(1)
    }
}

#[cfg(test)]
mod test {
    use std::{collections::BTreeMap, sync::Arc};

    use crate::{
        classes::signature::ClassName,
        error::execution::Error,
        vm::{
            state::{heap::Heap, object::Object, HistoryPoint},
            value::{ObjectId, Value},
        },
    };

    fn node() -> Object {
        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), Value::int(0));
        Object::instance(ClassName::new("pkg/Node"), fields, HistoryPoint::default())
    }

    #[test]
    fn identities_are_fresh_and_start_at_one() {
        let mut heap = Heap::new();
        let first = heap.allocate(node());
        let second = heap.allocate(node());
        assert_eq!(first, ObjectId::new(1));
        assert_eq!(second, ObjectId::new(2));
        assert_eq!(heap.next_id(), ObjectId::new(3));
    }

    #[test]
    fn writes_are_invisible_to_earlier_clones() -> anyhow::Result<()> {
        let mut original = Heap::new();
        let id = original.allocate(node());
        let other = original.allocate(node());

        let mut clone = original.clone();
        clone.write(id, "value", Value::int(7))?;

        assert_eq!(original.read(id, "value")?, Some(&Value::int(0)));
        assert_eq!(clone.read(id, "value")?, Some(&Value::int(7)));

        // Only the written object was copied.
        assert!(!clone.shares_object_with(&original, id));
        assert!(clone.shares_object_with(&original, other));

        Ok(())
    }

    #[test]
    fn branches_copy_the_table_only_once() -> anyhow::Result<()> {
        let mut original = Heap::new();
        let first = original.allocate(node());
        let second = original.allocate(node());

        let mut clone = original.clone();
        assert!(Arc::ptr_eq(&clone.objects, &original.objects));

        clone.write(first, "value", Value::int(1))?;
        let table = Arc::as_ptr(&clone.objects);
        clone.write(second, "value", Value::int(2))?;
        clone.allocate(node());
        assert_eq!(Arc::as_ptr(&clone.objects), table);
        assert_eq!(original.read(second, "value")?, Some(&Value::int(0)));

        Ok(())
    }

    #[test]
    fn isolation_holds_along_chains_of_clones() -> anyhow::Result<()> {
        let mut heap = Heap::new();
        let id = heap.allocate(node());

        let mut snapshots = vec![heap.clone()];
        for i in 1..=16 {
            let mut next = snapshots[snapshots.len() - 1].clone();
            next.write(id, "value", Value::int(i))?;
            next.allocate(node());
            snapshots.push(next);
        }

        for (i, snapshot) in snapshots.iter().enumerate() {
            let expected = Value::int(i32::try_from(i)?);
            assert_eq!(snapshot.read(id, "value")?, Some(&expected));
            assert_eq!(snapshot.len(), i + 1);
        }

        Ok(())
    }

    #[test]
    fn allocation_after_clone_does_not_leak() {
        let mut original = Heap::new();
        original.allocate(node());
        let mut clone = original.clone();
        let fresh = clone.allocate(node());

        assert_eq!(clone.len(), 2);
        assert_eq!(original.len(), 1);
        assert!(original.get(fresh).is_err());
    }

    #[test]
    fn writing_to_a_missing_object_is_an_internal_error() {
        let mut heap = Heap::new();
        let missing = ObjectId::new(4);
        assert_eq!(
            heap.write(missing, "value", Value::int(1)),
            Err(Error::NoSuchObject { id: missing })
        );
        assert_eq!(
            heap.get(ObjectId::new(0)).err(),
            Some(Error::NoSuchObject {
                id: ObjectId::new(0),
            })
        );
    }
}
