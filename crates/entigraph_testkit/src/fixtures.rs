//! Fixture domain.
//!
//! A small blogging model exercising every relationship shape:
//! - `Blog` owns `Post`s (plural) and may feature one (singular);
//! - `Post` owns `Comment`s and points back at its blog;
//! - `Comment` points back at its post;
//! - `Node` links to other nodes freely, cycles included;
//! - `Account` is a leaf identified by a `Uuid`.

use entigraph_core::{Entity, EntityStore, Identifiable, Schema, Tracked};
use std::sync::Arc;
use uuid::Uuid;

/// A blog.
#[derive(Debug, Clone, Default)]
pub struct Blog {
    /// Surrogate key.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Owned posts.
    pub posts: Vec<Tracked<Post>>,
    /// Optional highlighted post.
    pub featured: Option<Tracked<Post>>,
}

impl Blog {
    /// Creates a blog with no posts.
    pub fn named(name: &str) -> Tracked<Self> {
        Tracked::new(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    /// Creates a blog owning one post per title.
    pub fn with_posts(name: &str, titles: &[&str]) -> Tracked<Self> {
        let blog = Self::named(name);
        blog.write().posts = titles.iter().map(|t| Post::titled(t)).collect();
        blog
    }
}

impl Entity for Blog {
    fn describe(schema: &mut Schema<Self>) {
        schema
            .plural("posts", |b| &b.posts, |b| &mut b.posts)
            .singular("featured", |b| &b.featured, |b| &mut b.featured)
            .identified_by::<i64>();
    }
}

impl Identifiable<i64> for Blog {
    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
}

/// A post.
#[derive(Debug, Clone, Default)]
pub struct Post {
    /// Surrogate key.
    pub id: i32,
    /// Title.
    pub title: String,
    /// Owning blog, filled in when the blog is added.
    pub blog: Option<Tracked<Blog>>,
    /// Owned comments.
    pub comments: Vec<Tracked<Comment>>,
}

impl Post {
    /// Creates a post with no comments.
    pub fn titled(title: &str) -> Tracked<Self> {
        Tracked::new(Self {
            title: title.to_string(),
            ..Self::default()
        })
    }
}

impl Entity for Post {
    fn describe(schema: &mut Schema<Self>) {
        schema
            .plural("comments", |p| &p.comments, |p| &mut p.comments)
            .back_reference("blog", |p| &p.blog, |p| &mut p.blog)
            .identified_by::<i32>();
    }
}

impl Identifiable<i32> for Post {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}

/// A comment on a post.
#[derive(Debug, Clone, Default)]
pub struct Comment {
    /// Surrogate key.
    pub id: i32,
    /// Text.
    pub body: String,
    /// Owning post, filled in when the post is added.
    pub post: Option<Tracked<Post>>,
}

impl Comment {
    /// Creates a comment.
    pub fn saying(body: &str) -> Tracked<Self> {
        Tracked::new(Self {
            body: body.to_string(),
            ..Self::default()
        })
    }
}

impl Entity for Comment {
    fn describe(schema: &mut Schema<Self>) {
        schema
            .back_reference("post", |c| &c.post, |c| &mut c.post)
            .identified_by::<i32>();
    }
}

impl Identifiable<i32> for Comment {
    fn id(&self) -> i32 {
        self.id
    }

    fn set_id(&mut self, id: i32) {
        self.id = id;
    }
}

/// A freely linked node.
#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Label used to recognize the node in assertions.
    pub label: String,
    /// Single successor.
    pub next: Option<Tracked<Node>>,
    /// Additional outgoing edges.
    pub links: Vec<Tracked<Node>>,
}

impl Node {
    /// Creates an unlinked node.
    pub fn labeled(label: &str) -> Tracked<Self> {
        Tracked::new(Self {
            label: label.to_string(),
            ..Self::default()
        })
    }
}

impl Entity for Node {
    fn describe(schema: &mut Schema<Self>) {
        schema
            .singular("next", |n| &n.next, |n| &mut n.next)
            .plural("links", |n| &n.links, |n| &mut n.links);
    }
}

/// A leaf entity with a token key.
#[derive(Debug, Clone, Default)]
pub struct Account {
    /// Surrogate key, nil until committed.
    pub id: Uuid,
    /// Owner name.
    pub owner: String,
    /// Balance in cents.
    pub balance: i64,
}

impl Account {
    /// Creates an account with a zero balance.
    pub fn owned_by(owner: &str) -> Tracked<Self> {
        Tracked::new(Self {
            owner: owner.to_string(),
            ..Self::default()
        })
    }
}

impl Entity for Account {
    fn describe(schema: &mut Schema<Self>) {
        schema.identified_by::<Uuid>();
    }
}

impl Identifiable<Uuid> for Account {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

/// Creates nodes labeled `prefix0..prefixN` linked through `next` into a
/// ring: the last one points back at the first.
pub fn node_ring(prefix: &str, len: usize) -> Vec<Tracked<Node>> {
    let nodes: Vec<_> = (0..len)
        .map(|i| Node::labeled(&format!("{prefix}{i}")))
        .collect();
    for (i, node) in nodes.iter().enumerate() {
        node.write().next = Some(nodes[(i + 1) % len].clone());
    }
    nodes
}

/// Returns the labels of `nodes`, sorted.
pub fn sorted_labels(nodes: &[Tracked<Node>]) -> Vec<String> {
    let mut labels: Vec<String> = nodes.iter().map(|n| n.read().label.clone()).collect();
    labels.sort();
    labels
}

/// Returns a fresh shared store.
pub fn fresh_store() -> Arc<EntityStore> {
    EntityStore::shared()
}
