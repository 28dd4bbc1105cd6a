//! Relationship discovery.

use super::{Graph, ParentLink};
use crate::types::NodeId;
use std::collections::{BTreeSet, HashSet};

/// What a discovery pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Discovery {
    /// Nodes created for entities seen for the first time.
    pub(crate) created: Vec<NodeId>,
    /// Parent links that did not exist before.
    pub(crate) linked: usize,
}

impl Discovery {
    fn absorb(&mut self, other: Discovery) {
        self.created.extend(other.created);
        self.linked += other.linked;
    }
}

impl Graph {
    /// Walks the owned relationships reachable from `start`.
    ///
    /// Every entity found gets a node (reusing an existing one when the same
    /// allocation is already tracked) and a link from the parent that
    /// reached it. With `refresh` unset only newly created nodes are
    /// expanded and children sets only grow; with `refresh` set every
    /// reachable node is re-read and its children set replaced.
    pub(crate) fn discover(&mut self, start: NodeId, refresh: bool) -> Discovery {
        let mut outcome = Discovery::default();
        let mut visited = HashSet::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            let entity = node.entity.clone();
            let descriptor = std::sync::Arc::clone(&node.descriptor);

            let mut children = BTreeSet::new();
            for (relation_index, relation) in descriptor.owned_relations() {
                for target in relation.targets(&entity) {
                    let (child_id, created) = match self.node_of(target.key()) {
                        Some(existing) => (existing, false),
                        None => {
                            let created = self.insert(target, false);
                            outcome.created.push(created);
                            (created, true)
                        }
                    };
                    if let Some(child) = self.nodes.get_mut(&child_id) {
                        let link = ParentLink::new(id, relation_index);
                        if child.parents.insert((id, relation_index), link).is_none() {
                            outcome.linked += 1;
                        }
                    }
                    children.insert(child_id);
                    if refresh || created {
                        stack.push(child_id);
                    }
                }
            }

            if let Some(node) = self.nodes.get_mut(&id) {
                if refresh {
                    node.children = children;
                } else {
                    node.children.extend(children);
                }
            }
        }
        outcome
    }

    /// Re-reads the whole graph from its roots.
    ///
    /// Picks up entities attached to tracked ones since the last pass.
    pub(crate) fn find_changes(&mut self) -> Discovery {
        let mut outcome = Discovery::default();
        for root in self.roots() {
            outcome.absorb(self.discover(root, true));
        }
        outcome
    }
}
