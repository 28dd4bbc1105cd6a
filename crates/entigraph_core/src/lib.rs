//! # Entigraph Core
//!
//! In-memory unit-of-work engine for object graphs.
//!
//! This crate provides:
//! - Relationship discovery over statically declared entity fields
//! - Reachability-based pruning of entities nothing references any more
//! - Surrogate identity assignment on commit
//! - A queue-and-flush session and a snapshot-isolated session with
//!   optimistic, version-checked commits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entigraph_core::{DataContext, Entity, EntityStore, Schema, Tracked, UnitOfWorkSession};
//!
//! #[derive(Clone, Default)]
//! struct Blog {
//!     id: i64,
//!     posts: Vec<Tracked<Post>>,
//! }
//!
//! impl Entity for Blog {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema.plural("posts", |b| &b.posts, |b| &mut b.posts);
//!     }
//! }
//!
//! let mut session = UnitOfWorkSession::new(EntityStore::shared());
//! let blog = session.add(Tracked::new(Blog::default()))?;
//! blog.write().posts.push(Tracked::new(Post::default()));
//! session.commit()?;
//! assert_eq!(session.query::<Post>().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod error;
mod graph;
mod identity;
mod save_feed;
mod session;
mod stats;
mod types;

pub use config::{SessionConfig, StoreConfig};
pub use entity::{Entity, EntityId, EntityStore, Identifiable, RelationKind, Schema, Tracked};
pub use error::{CoreError, CoreResult};
pub use identity::{
    AssignIdentity, IdentityGenerator, IdentityKey, IdentityRegistry, IdentityStrategy,
    NumericIdentity, NumericKey, TokenIdentity, TokenKey,
};
pub use save_feed::{SaveEvent, SaveFeed};
pub use session::{DataContext, IsolatedSession, UnitOfWorkSession};
pub use stats::{StatsSnapshot, StoreStats};
pub use types::{CommitVersion, EntityKey, NodeId};
