//! Orphan collection.
//!
//! Mark-sweep from the roots along the owned fields as they currently read.
//! A child detached from its parent since the last discovery is not reached
//! through it, and one moved under another tracked parent is reached there.
//! Anything not marked is unreachable and dropped, which also handles cycles
//! that lost their last external parent. Afterwards links whose parent no
//! longer holds the child are dropped.

use super::Graph;
use crate::error::CoreResult;
use crate::types::NodeId;
use std::collections::HashSet;

impl Graph {
    /// Drops every node no longer reachable from a root.
    ///
    /// Survivors lose their dead links and stale child ids. Returns the
    /// number of nodes dropped.
    pub(crate) fn collect_orphans(&mut self) -> CoreResult<usize> {
        let marked = self.mark();
        let doomed: Vec<NodeId> = self
            .nodes
            .keys()
            .filter(|id| !marked.contains(id))
            .copied()
            .collect();
        for id in &doomed {
            self.detach_node(*id)?;
        }
        self.drop_dead_links();
        Ok(doomed.len())
    }

    /// Follows the owned fields as they are now, not the child sets of the
    /// last discovery, so an entity moved to another tracked parent keeps
    /// its node.
    fn mark(&self) -> HashSet<NodeId> {
        let mut marked = HashSet::new();
        let mut stack = self.roots();
        while let Some(id) = stack.pop() {
            if !marked.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for (_, relation) in node.descriptor.owned_relations() {
                stack.extend(
                    relation
                        .targets(&node.entity)
                        .iter()
                        .filter_map(|target| self.node_of(target.key()))
                        .filter(|child| !marked.contains(child)),
                );
            }
        }
        marked
    }

    fn drop_dead_links(&mut self) {
        let mut dead = Vec::new();
        for node in self.nodes.values() {
            for (link_key, link) in &node.parents {
                if !self.link_is_live(link, node.key()) {
                    dead.push((node.id, *link_key));
                }
            }
        }
        for (id, link_key) in dead {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.parents.remove(&link_key);
            }
        }

        let present: HashSet<NodeId> = self.nodes.keys().copied().collect();
        for node in self.nodes.values_mut() {
            node.children.retain(|child| present.contains(child));
        }
    }
}
