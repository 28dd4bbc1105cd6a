//! Arena nodes and parent links.

use crate::entity::schema::TypeDescriptor;
use crate::entity::tracked::AnyEntity;
use crate::types::{EntityKey, NodeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Identifies one edge into a node: which parent, through which of the
/// parent's declared relationships.
pub(crate) type LinkKey = (NodeId, usize);

/// One edge from a parent to a child.
///
/// Pure data: the capability to read or cut the edge lives in the parent's
/// relationship descriptor, looked up through the parent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParentLink {
    pub(crate) parent: NodeId,
    pub(crate) relation: usize,
}

impl ParentLink {
    pub(crate) fn new(parent: NodeId, relation: usize) -> Self {
        Self { parent, relation }
    }

    /// Whether `parent` still holds `child` in the linked field.
    pub(crate) fn references(&self, parent: &EntityNode, child: EntityKey) -> bool {
        parent
            .descriptor
            .relations
            .get(self.relation)
            .is_some_and(|r| r.references(&parent.entity, child))
    }

    /// Removes `child` from the linked field of `parent`.
    pub(crate) fn sever(&self, parent: &EntityNode, child: EntityKey) {
        if let Some(relation) = parent.descriptor.relations.get(self.relation) {
            relation.sever(&parent.entity, child);
        }
    }
}

/// A tracked entity and its edges.
pub(crate) struct EntityNode {
    pub(crate) id: NodeId,
    pub(crate) entity: AnyEntity,
    pub(crate) descriptor: Arc<TypeDescriptor>,
    /// Edges into this node.
    pub(crate) parents: BTreeMap<LinkKey, ParentLink>,
    /// Nodes this node referenced when it was last discovered.
    pub(crate) children: BTreeSet<NodeId>,
    /// Created by an explicit add; stays a root until explicitly removed.
    pub(crate) pinned: bool,
}

impl EntityNode {
    pub(crate) fn new(
        id: NodeId,
        entity: AnyEntity,
        descriptor: Arc<TypeDescriptor>,
        pinned: bool,
    ) -> Self {
        Self {
            id,
            entity,
            descriptor,
            parents: BTreeMap::new(),
            children: BTreeSet::new(),
            pinned,
        }
    }

    pub(crate) fn key(&self) -> EntityKey {
        self.entity.key()
    }

    /// Roots are never pruned.
    pub(crate) fn is_root(&self) -> bool {
        self.pinned || self.parents.is_empty()
    }

    pub(crate) fn links_from(&self, parent: NodeId) -> impl Iterator<Item = &ParentLink> {
        self.parents
            .range((parent, 0)..=(parent, usize::MAX))
            .map(|(_, link)| link)
    }
}

impl std::fmt::Debug for EntityNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityNode")
            .field("id", &self.id)
            .field("entity", &self.entity)
            .field("parents", &self.parents.len())
            .field("children", &self.children)
            .field("pinned", &self.pinned)
            .finish()
    }
}
