//! Shared entity handles.

use crate::entity::schema::{Entity, TypeDescriptor};
use crate::types::EntityKey;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A shared, lockable handle to an entity.
///
/// Cloning a `Tracked` clones the handle, not the entity. Equality and
/// hashing use reference identity: two handles are equal only when they
/// point at the same allocation, whatever the entity's fields say.
///
/// Entities reference each other by holding `Option<Tracked<C>>` or
/// `Vec<Tracked<C>>` fields declared in [`Entity::describe`]. Cycles are
/// allowed; the store keeps every tracked allocation alive until it is
/// removed or pruned.
pub struct Tracked<T>(Arc<RwLock<T>>);

impl<T: Entity> Tracked<T> {
    /// Wraps a value in a new handle.
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Returns true if both handles point at the same entity.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the reference identity of the entity.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey(Arc::as_ptr(&self.0) as *const () as usize)
    }

    /// Returns a type-erased handle to the same entity.
    pub(crate) fn erase(&self) -> AnyEntity {
        AnyEntity {
            cell: self.0.clone(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            describe: TypeDescriptor::of::<T>,
        }
    }
}

impl<T> Clone for Tracked<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for Tracked<T> {}

impl<T> Hash for Tracked<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl<T> fmt::Debug for Tracked<T> {
    // Never prints the entity: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tracked<{}>({:#x})",
            std::any::type_name::<T>(),
            Arc::as_ptr(&self.0) as *const () as usize
        )
    }
}

/// A type-erased [`Tracked`] handle.
#[derive(Clone)]
pub(crate) struct AnyEntity {
    /// Always an `RwLock<T>` where `TypeId::of::<T>() == type_id`.
    cell: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    describe: fn() -> TypeDescriptor,
}

impl AnyEntity {
    pub(crate) fn key(&self) -> EntityKey {
        EntityKey(Arc::as_ptr(&self.cell) as *const () as usize)
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Builds the descriptor of the concrete type.
    pub(crate) fn describe(&self) -> TypeDescriptor {
        (self.describe)()
    }

    pub(crate) fn downcast<T: Entity>(&self) -> Option<Tracked<T>> {
        Arc::clone(&self.cell)
            .downcast::<RwLock<T>>()
            .ok()
            .map(Tracked)
    }

    /// Runs `f` under a read lock if the entity is a `T`.
    pub(crate) fn with_ref<T: Entity, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        (*self.cell)
            .downcast_ref::<RwLock<T>>()
            .map(|lock| f(&lock.read()))
    }

    /// Runs `f` under a write lock if the entity is a `T`.
    pub(crate) fn with_mut<T: Entity, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        (*self.cell)
            .downcast_ref::<RwLock<T>>()
            .map(|lock| f(&mut lock.write()))
    }
}

impl fmt::Debug for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.type_name, self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        text: String,
    }

    impl Entity for Note {}

    #[derive(Debug, Clone)]
    struct Other;

    impl Entity for Other {}

    fn note(text: &str) -> Tracked<Note> {
        Tracked::new(Note { text: text.into() })
    }

    #[test]
    fn equality_is_reference_identity() {
        let a = note("same");
        let b = note("same");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn hash_follows_identity() {
        let a = note("x");
        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(note("x"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn erased_key_matches_typed_key() {
        let a = note("x");
        let erased = a.erase();
        assert_eq!(erased.key(), a.key());
        assert_eq!(erased.type_id(), TypeId::of::<Note>());
        assert!(erased.type_name().ends_with("Note"));
    }

    #[test]
    fn downcast_checks_type() {
        let erased = note("x").erase();
        assert!(erased.downcast::<Note>().is_some());
        assert!(erased.downcast::<Other>().is_none());
        assert!(erased.with_ref(|_: &Other| ()).is_none());
    }

    #[test]
    fn with_mut_writes_through() {
        let a = note("before");
        a.erase().with_mut(|n: &mut Note| n.text = "after".into());
        assert_eq!(a.read().text, "after");
    }
}
