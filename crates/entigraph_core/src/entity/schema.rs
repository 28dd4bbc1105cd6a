//! Static relationship declarations.
//!
//! Every entity type lists the fields through which it references other
//! entities. The store walks these declarations instead of inspecting
//! values at runtime, so a field that is not declared is invisible to
//! discovery, orphan pruning and cloning.
//!
//! ```rust,ignore
//! #[derive(Clone, Default)]
//! struct Blog {
//!     id: i64,
//!     posts: Vec<Tracked<Post>>,
//!     featured: Option<Tracked<Post>>,
//! }
//!
//! impl Entity for Blog {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema
//!             .plural("posts", |b| &b.posts, |b| &mut b.posts)
//!             .singular("featured", |b| &b.featured, |b| &mut b.featured)
//!             .identified_by::<i64>();
//!     }
//! }
//! ```

use crate::entity::tracked::{AnyEntity, Tracked};
use crate::error::CoreResult;
use crate::identity::{IdentityKey, IdentityRegistry};
use crate::types::EntityKey;
use std::any::{Any, TypeId};
use std::marker::PhantomData;

/// A type the store can track.
///
/// `Clone` is used by isolated sessions to create working and shadow
/// copies; relationship fields of the clone are rewired afterwards, so a
/// derived `Clone` is all that is needed.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Declares the entity's reference fields and identity markers.
    ///
    /// The default declares nothing: the entity is a leaf.
    fn describe(schema: &mut Schema<Self>) {
        let _ = schema;
    }
}

/// Marker for an entity with a single identity field of type `K`.
///
/// Declaring it through [`Schema::identified_by`] lets the session's
/// registered generator for `K` fill the field on commit.
pub trait Identifiable<K> {
    /// Returns the current identity value.
    fn id(&self) -> K;

    /// Replaces the identity value.
    fn set_id(&mut self, id: K);
}

/// Shape of a declared relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// `Option<Tracked<C>>`
    Singular,
    /// `Vec<Tracked<C>>`
    Plural,
}

/// Builder collecting the declarations of one entity type.
pub struct Schema<T> {
    relations: Vec<Box<dyn Relation>>,
    identities: Vec<IdentityHook>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Schema<T> {
    fn new() -> Self {
        Self {
            relations: Vec::new(),
            identities: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Declares an owning single-valued reference.
    pub fn singular<C: Entity>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Option<Tracked<C>>,
        get_mut: fn(&mut T) -> &mut Option<Tracked<C>>,
    ) -> &mut Self {
        self.relations.push(Box::new(SingularRelation {
            name,
            back_reference: false,
            get,
            get_mut,
        }));
        self
    }

    /// Declares an owning collection of references.
    pub fn plural<C: Entity>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<Tracked<C>>,
        get_mut: fn(&mut T) -> &mut Vec<Tracked<C>>,
    ) -> &mut Self {
        self.relations.push(Box::new(PluralRelation {
            name,
            back_reference: false,
            get,
            get_mut,
        }));
        self
    }

    /// Declares an inverse single-valued reference.
    ///
    /// Back references are never followed by discovery. When a `C` is added
    /// and this entity is one of its direct children, the field is pointed
    /// at the new `C`.
    pub fn back_reference<C: Entity>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Option<Tracked<C>>,
        get_mut: fn(&mut T) -> &mut Option<Tracked<C>>,
    ) -> &mut Self {
        self.relations.push(Box::new(SingularRelation {
            name,
            back_reference: true,
            get,
            get_mut,
        }));
        self
    }

    /// Declares an inverse collection of references. See [`Self::back_reference`].
    pub fn back_references<C: Entity>(
        &mut self,
        name: &'static str,
        get: fn(&T) -> &Vec<Tracked<C>>,
        get_mut: fn(&mut T) -> &mut Vec<Tracked<C>>,
    ) -> &mut Self {
        self.relations.push(Box::new(PluralRelation {
            name,
            back_reference: true,
            get,
            get_mut,
        }));
        self
    }

    /// Declares the [`Identifiable<K>`] marker.
    ///
    /// Markers are tried in declaration order when no assigner is
    /// registered for the concrete type.
    pub fn identified_by<K: IdentityKey>(&mut self) -> &mut Self
    where
        T: Identifiable<K>,
    {
        self.identities.push(IdentityHook {
            key_type: TypeId::of::<K>(),
            key_name: std::any::type_name::<K>(),
            apply: apply_marker::<T, K>,
        });
        self
    }
}

/// Erased operations on one declared relationship field.
pub(crate) trait Relation: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> RelationKind;

    fn is_back_reference(&self) -> bool;

    fn target_type(&self) -> TypeId;

    /// Entities the field holds right now.
    fn targets(&self, parent: &AnyEntity) -> Vec<AnyEntity>;

    /// Whether the field currently holds `child`.
    fn references(&self, parent: &AnyEntity, child: EntityKey) -> bool;

    /// Drops `child` from the field; other values are left alone.
    fn sever(&self, parent: &AnyEntity, child: EntityKey);

    /// Sets the field to `child` when it is empty (singular) or appends
    /// `child` when absent (plural).
    ///
    /// Returns true if the field was written.
    fn attach(&self, parent: &AnyEntity, child: &AnyEntity) -> bool;

    /// Replaces the field's content with `children`.
    fn replace(&self, parent: &AnyEntity, children: &[AnyEntity]);

    /// Copies this field from `from` into `into`; both must be the owning type.
    fn carry_over(&self, from: &dyn Any, into: &mut dyn Any);
}

struct SingularRelation<T, C> {
    name: &'static str,
    back_reference: bool,
    get: fn(&T) -> &Option<Tracked<C>>,
    get_mut: fn(&mut T) -> &mut Option<Tracked<C>>,
}

impl<T: Entity, C: Entity> Relation for SingularRelation<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Singular
    }

    fn is_back_reference(&self) -> bool {
        self.back_reference
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn targets(&self, parent: &AnyEntity) -> Vec<AnyEntity> {
        parent
            .with_ref(|p: &T| (self.get)(p).as_ref().map(Tracked::erase))
            .flatten()
            .into_iter()
            .collect()
    }

    fn references(&self, parent: &AnyEntity, child: EntityKey) -> bool {
        parent
            .with_ref(|p: &T| (self.get)(p).as_ref().is_some_and(|c| c.key() == child))
            .unwrap_or(false)
    }

    fn sever(&self, parent: &AnyEntity, child: EntityKey) {
        parent.with_mut(|p: &mut T| {
            let slot = (self.get_mut)(p);
            if slot.as_ref().is_some_and(|c| c.key() == child) {
                *slot = None;
            }
        });
    }

    fn attach(&self, parent: &AnyEntity, child: &AnyEntity) -> bool {
        let Some(child) = child.downcast::<C>() else {
            return false;
        };
        parent
            .with_mut(|p: &mut T| {
                let slot = (self.get_mut)(p);
                if slot.is_some() {
                    return false;
                }
                *slot = Some(child);
                true
            })
            .unwrap_or(false)
    }

    fn replace(&self, parent: &AnyEntity, children: &[AnyEntity]) {
        let next = children.iter().find_map(AnyEntity::downcast::<C>);
        parent.with_mut(|p: &mut T| *(self.get_mut)(p) = next);
    }

    fn carry_over(&self, from: &dyn Any, into: &mut dyn Any) {
        if let (Some(from), Some(into)) = (from.downcast_ref::<T>(), into.downcast_mut::<T>()) {
            *(self.get_mut)(into) = (self.get)(from).clone();
        }
    }
}

struct PluralRelation<T, C> {
    name: &'static str,
    back_reference: bool,
    get: fn(&T) -> &Vec<Tracked<C>>,
    get_mut: fn(&mut T) -> &mut Vec<Tracked<C>>,
}

impl<T: Entity, C: Entity> Relation for PluralRelation<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> RelationKind {
        RelationKind::Plural
    }

    fn is_back_reference(&self) -> bool {
        self.back_reference
    }

    fn target_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn targets(&self, parent: &AnyEntity) -> Vec<AnyEntity> {
        parent
            .with_ref(|p: &T| (self.get)(p).iter().map(Tracked::erase).collect())
            .unwrap_or_default()
    }

    fn references(&self, parent: &AnyEntity, child: EntityKey) -> bool {
        parent
            .with_ref(|p: &T| (self.get)(p).iter().any(|c| c.key() == child))
            .unwrap_or(false)
    }

    fn sever(&self, parent: &AnyEntity, child: EntityKey) {
        // Rebuilt rather than removed in place so every occurrence goes.
        parent.with_mut(|p: &mut T| {
            let items = (self.get_mut)(p);
            let kept: Vec<Tracked<C>> = items.drain(..).filter(|c| c.key() != child).collect();
            *items = kept;
        });
    }

    fn attach(&self, parent: &AnyEntity, child: &AnyEntity) -> bool {
        let Some(child) = child.downcast::<C>() else {
            return false;
        };
        parent
            .with_mut(|p: &mut T| {
                let items = (self.get_mut)(p);
                if items.contains(&child) {
                    return false;
                }
                items.push(child);
                true
            })
            .unwrap_or(false)
    }

    fn replace(&self, parent: &AnyEntity, children: &[AnyEntity]) {
        let next: Vec<Tracked<C>> = children.iter().filter_map(AnyEntity::downcast::<C>).collect();
        parent.with_mut(|p: &mut T| *(self.get_mut)(p) = next);
    }

    fn carry_over(&self, from: &dyn Any, into: &mut dyn Any) {
        if let (Some(from), Some(into)) = (from.downcast_ref::<T>(), into.downcast_mut::<T>()) {
            *(self.get_mut)(into) = (self.get)(from).clone();
        }
    }
}

/// One declared identity marker.
pub(crate) struct IdentityHook {
    pub(crate) key_type: TypeId,
    pub(crate) key_name: &'static str,
    /// Returns `Ok(true)` when a value was assigned, `Ok(false)` when the
    /// registry has no generator for the key or the field was already set.
    pub(crate) apply: fn(&AnyEntity, &IdentityRegistry) -> CoreResult<bool>,
}

fn apply_marker<T, K>(entity: &AnyEntity, registry: &IdentityRegistry) -> CoreResult<bool>
where
    T: Entity + Identifiable<K>,
    K: IdentityKey,
{
    let Some(generator) = registry.generator::<K>() else {
        return Ok(false);
    };
    entity
        .with_mut(|e: &mut T| {
            if generator.is_unset(&e.id()) {
                e.set_id(generator.next()?);
                Ok(true)
            } else {
                Ok(false)
            }
        })
        .unwrap_or(Ok(false))
}

/// Everything the store knows about one entity type.
pub(crate) struct TypeDescriptor {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) relations: Vec<Box<dyn Relation>>,
    pub(crate) identities: Vec<IdentityHook>,
    /// Clones the entity into a fresh allocation; relationship fields still
    /// point at the original targets.
    pub(crate) detach: fn(&AnyEntity) -> Option<AnyEntity>,
    /// Copies every non-relationship field from the first entity into the
    /// second.
    pub(crate) copy_scalars: fn(&TypeDescriptor, &AnyEntity, &AnyEntity),
}

impl TypeDescriptor {
    pub(crate) fn of<T: Entity>() -> Self {
        let mut schema = Schema::<T>::new();
        T::describe(&mut schema);
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            relations: schema.relations,
            identities: schema.identities,
            detach: detach::<T>,
            copy_scalars: copy_scalars::<T>,
        }
    }

    /// Relationships discovery follows.
    pub(crate) fn owned_relations(&self) -> impl Iterator<Item = (usize, &dyn Relation)> {
        self.relations
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_back_reference())
            .map(|(i, r)| (i, r.as_ref()))
    }
}

fn detach<T: Entity>(entity: &AnyEntity) -> Option<AnyEntity> {
    entity.with_ref(|value: &T| Tracked::new(value.clone()).erase())
}

fn copy_scalars<T: Entity>(descriptor: &TypeDescriptor, source: &AnyEntity, dest: &AnyEntity) {
    let Some(mut next) = source.with_ref(|value: &T| value.clone()) else {
        return;
    };
    dest.with_mut(move |current: &mut T| {
        for relation in &descriptor.relations {
            relation.carry_over(&*current, &mut next);
        }
        *current = next;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Leaf {
        id: i32,
    }

    impl Entity for Leaf {
        fn describe(schema: &mut Schema<Self>) {
            schema.identified_by::<i32>();
        }
    }

    impl Identifiable<i32> for Leaf {
        fn id(&self) -> i32 {
            self.id
        }

        fn set_id(&mut self, id: i32) {
            self.id = id;
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Branch {
        label: String,
        one: Option<Tracked<Leaf>>,
        many: Vec<Tracked<Leaf>>,
    }

    impl Entity for Branch {
        fn describe(schema: &mut Schema<Self>) {
            schema
                .singular("one", |b| &b.one, |b| &mut b.one)
                .plural("many", |b| &b.many, |b| &mut b.many);
        }
    }

    fn relation(name: &str) -> Box<dyn Relation> {
        TypeDescriptor::of::<Branch>()
            .relations
            .into_iter()
            .find(|r| r.name() == name)
            .unwrap()
    }

    #[test]
    fn descriptor_lists_declarations() {
        let d = TypeDescriptor::of::<Branch>();
        assert_eq!(d.relations.len(), 2);
        assert_eq!(d.relations[0].kind(), RelationKind::Singular);
        assert_eq!(d.relations[1].kind(), RelationKind::Plural);
        assert_eq!(d.relations[1].target_type(), TypeId::of::<Leaf>());
        assert!(d.identities.is_empty());
        assert_eq!(TypeDescriptor::of::<Leaf>().identities.len(), 1);
    }

    #[test]
    fn singular_sever_only_clears_matching_child() {
        let leaf = Tracked::new(Leaf::default());
        let other = Tracked::new(Leaf::default());
        let branch = Tracked::new(Branch {
            one: Some(leaf.clone()),
            ..Branch::default()
        });
        let rel = relation("one");
        let parent = branch.erase();

        assert!(rel.references(&parent, leaf.key()));
        rel.sever(&parent, other.key());
        assert!(rel.references(&parent, leaf.key()));
        rel.sever(&parent, leaf.key());
        assert!(branch.read().one.is_none());
    }

    #[test]
    fn plural_sever_rebuilds_without_element() {
        let a = Tracked::new(Leaf::default());
        let b = Tracked::new(Leaf::default());
        let branch = Tracked::new(Branch {
            many: vec![a.clone(), b.clone(), a.clone()],
            ..Branch::default()
        });
        let rel = relation("many");

        rel.sever(&branch.erase(), a.key());
        assert_eq!(branch.read().many, vec![b]);
    }

    #[test]
    fn singular_attach_fills_only_empty_slot() {
        let first = Tracked::new(Leaf::default());
        let second = Tracked::new(Leaf::default());
        let branch = Tracked::new(Branch::default());
        let rel = relation("one");

        assert!(rel.attach(&branch.erase(), &first.erase()));
        assert!(!rel.attach(&branch.erase(), &second.erase()));
        assert_eq!(branch.read().one.as_ref(), Some(&first));
    }

    #[test]
    fn plural_attach_skips_duplicates() {
        let a = Tracked::new(Leaf::default());
        let branch = Tracked::new(Branch::default());
        let rel = relation("many");

        assert!(rel.attach(&branch.erase(), &a.erase()));
        assert!(!rel.attach(&branch.erase(), &a.erase()));
        assert_eq!(branch.read().many.len(), 1);
        assert_eq!(rel.targets(&branch.erase()).len(), 1);
    }

    #[test]
    fn copy_scalars_keeps_destination_relations() {
        let leaf = Tracked::new(Leaf::default());
        let source = Tracked::new(Branch {
            label: "new".into(),
            one: None,
            many: vec![],
        });
        let dest = Tracked::new(Branch {
            label: "old".into(),
            one: Some(leaf.clone()),
            many: vec![leaf.clone()],
        });
        let d = TypeDescriptor::of::<Branch>();

        (d.copy_scalars)(&d, &source.erase(), &dest.erase());

        let dest = dest.read();
        assert_eq!(dest.label, "new");
        assert_eq!(dest.one.as_ref(), Some(&leaf));
        assert_eq!(dest.many, vec![leaf.clone()]);
    }

    #[test]
    fn detach_makes_a_new_allocation() {
        let leaf = Tracked::new(Leaf { id: 7 });
        let d = TypeDescriptor::of::<Leaf>();
        let copy = (d.detach)(&leaf.erase()).unwrap();
        assert_ne!(copy.key(), leaf.key());
        assert_eq!(copy.downcast::<Leaf>().unwrap().read().id, 7);
    }
}
