//! Session-scoped identity registrations.

use crate::entity::schema::{Entity, TypeDescriptor};
use crate::entity::tracked::AnyEntity;
use crate::entity::EntityId;
use crate::error::CoreResult;
use crate::identity::strategy::{
    AssignIdentity, IdentityGenerator, IdentityKey, NumericIdentity, TokenIdentity,
};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

type ErasedAssigner = Arc<dyn Fn(&AnyEntity) -> CoreResult<bool> + Send + Sync>;

/// Identity assigners applied during commit.
///
/// Two kinds of registration exist:
/// - a strategy for one concrete entity type;
/// - a generator for a key type `K`, used by every entity declaring the
///   `Identifiable<K>` marker.
///
/// A concrete-type strategy is more specific than any marker and wins.
/// Among markers, the entity's declaration order decides.
#[derive(Default)]
pub struct IdentityRegistry {
    by_type: HashMap<TypeId, ErasedAssigner>,
    /// Values are `Arc<dyn IdentityGenerator<Key = K>>` keyed by `TypeId::of::<K>()`.
    by_key: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl IdentityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with sequential `i16`/`i32`/`i64` and random
    /// `EntityId`/`Uuid` generators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_generator(NumericIdentity::<i16>::new());
        registry.register_generator(NumericIdentity::<i32>::new());
        registry.register_generator(NumericIdentity::<i64>::new());
        registry.register_generator(TokenIdentity::<EntityId>::new());
        registry.register_generator(TokenIdentity::<Uuid>::new());
        registry
    }

    /// Registers (or replaces) the strategy for entity type `T`.
    pub fn register_strategy<T, S>(&mut self, strategy: S)
    where
        T: Entity,
        S: AssignIdentity<T> + 'static,
    {
        let assign: ErasedAssigner = Arc::new(move |entity: &AnyEntity| {
            entity
                .with_mut(|e: &mut T| strategy.assign(e))
                .unwrap_or(Ok(false))
        });
        self.by_type.insert(TypeId::of::<T>(), assign);
    }

    /// Registers (or replaces) the generator for key type `G::Key`.
    pub fn register_generator<G>(&mut self, generator: G)
    where
        G: IdentityGenerator + 'static,
    {
        let generator: Arc<dyn IdentityGenerator<Key = G::Key>> = Arc::new(generator);
        self.by_key
            .insert(TypeId::of::<G::Key>(), Box::new(generator));
    }

    /// Returns true if a strategy is registered for `T`.
    pub fn has_strategy<T: Entity>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Returns true if a generator is registered for key type `K`.
    pub fn has_generator<K: IdentityKey>(&self) -> bool {
        self.by_key.contains_key(&TypeId::of::<K>())
    }

    pub(crate) fn generator<K: IdentityKey>(&self) -> Option<Arc<dyn IdentityGenerator<Key = K>>> {
        self.by_key
            .get(&TypeId::of::<K>())
            .and_then(|boxed| (**boxed).downcast_ref::<Arc<dyn IdentityGenerator<Key = K>>>())
            .cloned()
    }

    /// Applies the most specific registration to `entity`.
    pub(crate) fn apply(&self, entity: &AnyEntity, descriptor: &TypeDescriptor) -> CoreResult<bool> {
        if let Some(assign) = self.by_type.get(&descriptor.type_id) {
            return assign(entity);
        }
        for hook in &descriptor.identities {
            if self.by_key.contains_key(&hook.key_type) {
                tracing::trace!(entity = ?entity, key = hook.key_name, "applying identity marker");
                return (hook.apply)(entity, self);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("strategies", &self.by_type.len())
            .field("generators", &self.by_key.len())
            .finish()
    }
}
