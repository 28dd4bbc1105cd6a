//! # Entigraph Testkit
//!
//! Test utilities for entigraph.
//!
//! This crate provides:
//! - A fixture domain (blogs, posts, comments, linked nodes, accounts)
//! - Property-based graph generators using proptest
//! - Contention helpers that drive many isolated sessions at once
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entigraph_testkit::prelude::*;
//!
//! #[test]
//! fn blog_is_tracked() {
//!     init_tracing();
//!     let mut session = UnitOfWorkSession::new(EntityStore::shared());
//!     session.add(Blog::with_posts("news", &["hello"])).unwrap();
//!     session.commit().unwrap();
//!     assert_eq!(session.query::<Post>().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod tracing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::tracing::init_tracing;
    pub use entigraph_core::{
        CoreError, DataContext, EntityStore, IsolatedSession, SaveEvent, StoreConfig, Tracked,
        UnitOfWorkSession,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use tracing::init_tracing;
