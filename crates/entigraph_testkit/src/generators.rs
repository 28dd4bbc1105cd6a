//! Property-based test generators using proptest.
//!
//! Provides strategies for random object graphs together with a reference
//! reachability model to check the store against.

use crate::fixtures::{Account, Blog, Comment, Node, Post};
use entigraph_core::Tracked;
use proptest::prelude::*;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Shape of a random node graph.
///
/// Node `i` is labeled `n{i}`. Every edge becomes an entry in the source
/// node's `links`; roots are the nodes explicitly added to the store.
#[derive(Debug, Clone)]
pub struct GraphSpec {
    /// Number of nodes.
    pub nodes: usize,
    /// Directed edges `(from, to)`.
    pub edges: Vec<(usize, usize)>,
    /// Indices of explicitly added nodes.
    pub roots: Vec<usize>,
}

impl GraphSpec {
    /// Builds the nodes and wires the edges.
    pub fn build(&self) -> Vec<Tracked<Node>> {
        let nodes: Vec<_> = (0..self.nodes)
            .map(|i| Node::labeled(&format!("n{i}")))
            .collect();
        for &(from, to) in &self.edges {
            let target = nodes[to].clone();
            let mut source = nodes[from].write();
            if !source.links.contains(&target) {
                source.links.push(target);
            }
        }
        nodes
    }

    /// Indices reachable from the roots along `edges`.
    pub fn reachable(&self) -> BTreeSet<usize> {
        self.reachable_from(&self.roots, &self.edges)
    }

    /// Indices reachable from the roots once every edge leaving `cut`
    /// is dropped.
    pub fn reachable_without_edges_from(&self, cut: usize) -> BTreeSet<usize> {
        let edges: Vec<_> = self
            .edges
            .iter()
            .copied()
            .filter(|(from, _)| *from != cut)
            .collect();
        self.reachable_from(&self.roots, &edges)
    }

    fn reachable_from(&self, roots: &[usize], edges: &[(usize, usize)]) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = roots.to_vec();
        while let Some(i) = stack.pop() {
            if seen.insert(i) {
                stack.extend(edges.iter().filter(|(from, _)| *from == i).map(|(_, to)| *to));
            }
        }
        seen
    }
}

/// Strategy for random node graphs of 1 to `max_nodes` nodes.
///
/// Cycles, self-loops and shared children all occur. At least one root is
/// always present.
pub fn graph_spec_strategy(max_nodes: usize) -> impl Strategy<Value = GraphSpec> {
    (1..=max_nodes.max(1)).prop_flat_map(|nodes| {
        (
            prop::collection::vec((0..nodes, 0..nodes), 0..nodes * 2),
            prop::collection::btree_set(0..nodes, 1..=nodes.min(3)),
        )
            .prop_map(move |(edges, roots)| GraphSpec {
                nodes,
                edges,
                roots: roots.into_iter().collect(),
            })
    })
}

/// Strategy for short printable labels.
pub fn label_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,11}").expect("Invalid regex")
}

/// Strategy for blogs with up to `max_posts` posts of up to three comments.
pub fn blog_strategy(max_posts: usize) -> impl Strategy<Value = Tracked<Blog>> {
    (
        label_strategy(),
        prop::collection::vec(
            (label_strategy(), prop::collection::vec(label_strategy(), 0..3)),
            0..=max_posts,
        ),
    )
        .prop_map(|(name, posts)| {
            let blog = Blog::named(&name);
            for (title, bodies) in posts {
                let post = Post::titled(&title);
                post.write().comments = bodies.iter().map(|b| Comment::saying(b)).collect();
                blog.write().posts.push(post);
            }
            blog
        })
}

/// Strategy for accounts, half of them with a preset identity.
pub fn account_strategy() -> impl Strategy<Value = Tracked<Account>> {
    (label_strategy(), any::<bool>(), any::<u128>()).prop_map(|(owner, preset, bits)| {
        let account = Account::owned_by(&owner);
        if preset {
            account.write().id = Uuid::from_u128(bits | 1);
        }
        account
    })
}
