//! Arena-backed object graph.
//!
//! Nodes live in a `BTreeMap` keyed by monotonically increasing [`NodeId`]s,
//! so iteration order is creation order. Edges are stored twice: each node
//! keeps the ids of the children it referenced when last discovered, and
//! each child keeps one [`ParentLink`] per `(parent, relation)` pair that
//! reached it. A node never owns its parents; links are plain ids resolved
//! through the arena, which keeps cyclic graphs free of reference cycles
//! inside the store itself.

mod collector;
mod discovery;
mod node;

pub(crate) use node::{EntityNode, ParentLink};

use crate::entity::schema::TypeDescriptor;
use crate::entity::tracked::AnyEntity;
use crate::error::{CoreError, CoreResult};
use crate::identity::IdentityRegistry;
use crate::types::{EntityKey, NodeId};
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Lazily built type descriptors, one per entity type.
#[derive(Default)]
pub(crate) struct DescriptorCache {
    by_type: HashMap<TypeId, Arc<TypeDescriptor>>,
}

impl DescriptorCache {
    pub(crate) fn get(&mut self, entity: &AnyEntity) -> Arc<TypeDescriptor> {
        Arc::clone(
            self.by_type
                .entry(entity.type_id())
                .or_insert_with(|| Arc::new(entity.describe())),
        )
    }

    pub(crate) fn clear(&mut self) {
        self.by_type.clear();
    }
}

/// The tracked graph.
#[derive(Default)]
pub(crate) struct Graph {
    nodes: BTreeMap<NodeId, EntityNode>,
    index: HashMap<EntityKey, NodeId>,
    descriptors: DescriptorCache,
    next_id: u64,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&EntityNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut EntityNode> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn node_of(&self, key: EntityKey) -> Option<NodeId> {
        self.index.get(&key).copied()
    }

    pub(crate) fn contains(&self, key: EntityKey) -> bool {
        self.index.contains_key(&key)
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &EntityNode> {
        self.nodes.values()
    }

    /// Every tracked entity of the given type, in creation order.
    pub(crate) fn entities_of(&self, type_id: TypeId) -> Vec<AnyEntity> {
        self.nodes
            .values()
            .filter(|n| n.entity.type_id() == type_id)
            .map(|n| n.entity.clone())
            .collect()
    }

    pub(crate) fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.id)
            .collect()
    }

    /// Creates a node for an entity that is not tracked yet.
    pub(crate) fn insert(&mut self, entity: AnyEntity, pinned: bool) -> NodeId {
        self.next_id += 1;
        let id = NodeId::new(self.next_id);
        let descriptor = self.descriptors.get(&entity);
        tracing::trace!(node = %id, entity = ?entity, pinned, "node created");
        self.index.insert(entity.key(), id);
        self.nodes
            .insert(id, EntityNode::new(id, entity, descriptor, pinned));
        id
    }

    /// Takes a node out of the arena and the identity index.
    pub(crate) fn detach_node(&mut self, id: NodeId) -> CoreResult<EntityNode> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| CoreError::invariant(format!("{id} is not in the arena")))?;
        match self.index.remove(&node.key()) {
            Some(indexed) if indexed == id => {}
            _ => {
                return Err(CoreError::invariant(format!(
                    "{id} is missing from the identity index"
                )))
            }
        }
        tracing::trace!(node = %id, entity = ?node.entity, "node removed");
        Ok(node)
    }

    /// Whether `link` into the node keyed `child` is still backed by the
    /// parent's field.
    pub(crate) fn link_is_live(&self, link: &ParentLink, child: EntityKey) -> bool {
        self.nodes
            .get(&link.parent)
            .is_some_and(|parent| link.references(parent, child))
    }

    /// Runs identity assignment over every node.
    pub(crate) fn apply_identities(&self, registry: &IdentityRegistry) -> CoreResult<u64> {
        let mut assigned = 0;
        for node in self.nodes.values() {
            if registry.apply(&node.entity, &node.descriptor)? {
                assigned += 1;
            }
        }
        Ok(assigned)
    }

    /// Points inverse fields of the new node's direct children at it.
    ///
    /// A child with exactly one back reference typed for the new entity
    /// gets it filled: a singular field only when empty, a collection only
    /// when the entity is absent. More than one candidate is ambiguous and
    /// reported; the graph itself is left as discovered.
    pub(crate) fn repair_back_references(&self, id: NodeId) -> CoreResult<usize> {
        let Some(node) = self.nodes.get(&id) else {
            return Ok(0);
        };
        let parent_type = node.entity.type_id();
        let mut repaired = 0;
        for child_id in &node.children {
            let Some(child) = self.nodes.get(child_id) else {
                continue;
            };
            let mut candidates = child
                .descriptor
                .relations
                .iter()
                .filter(|r| r.is_back_reference() && r.target_type() == parent_type);
            let Some(relation) = candidates.next() else {
                continue;
            };
            if candidates.next().is_some() {
                return Err(CoreError::AmbiguousBackReference {
                    type_name: child.descriptor.type_name,
                    target: node.entity.type_name(),
                });
            }
            if relation.attach(&child.entity, &node.entity) {
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    /// Removes the node of `entity`, then cascades through children that
    /// have no other live parent.
    ///
    /// Returns the number of nodes removed, zero when `entity` is not
    /// tracked.
    pub(crate) fn remove(&mut self, entity: &AnyEntity) -> CoreResult<usize> {
        let key = entity.key();
        let Some(id) = self.node_of(key) else {
            return Ok(0);
        };
        let removed = self.detach_node(id)?;
        for link in removed.parents.values() {
            if let Some(parent) = self.nodes.get(&link.parent) {
                link.sever(parent, key);
            }
        }

        let mut count = 1;
        let mut pending = vec![removed];
        while let Some(gone) = pending.pop() {
            for child_id in &gone.children {
                let Some(child) = self.nodes.get(child_id) else {
                    continue;
                };
                let child_key = child.key();
                let keep = child.pinned
                    || child.parents.values().any(|link| {
                        link.parent != gone.id && self.link_is_live(link, child_key)
                    });
                if keep {
                    for link in child.links_from(gone.id) {
                        link.sever(&gone, child_key);
                    }
                    if let Some(child) = self.nodes.get_mut(child_id) {
                        child.parents.retain(|(parent, _), _| *parent != gone.id);
                    }
                } else {
                    pending.push(self.detach_node(*child_id)?);
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.descriptors.clear();
        self.next_id = 0;
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.nodes.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}
