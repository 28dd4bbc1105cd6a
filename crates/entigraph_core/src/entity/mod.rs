//! Entities, their relationship declarations and the shared store.

mod id;
pub(crate) mod schema;
mod store;
pub(crate) mod tracked;

pub use id::EntityId;
pub use schema::{Entity, Identifiable, RelationKind, Schema};
pub use store::EntityStore;
pub use tracked::Tracked;
