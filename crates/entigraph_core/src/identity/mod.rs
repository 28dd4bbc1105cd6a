//! Surrogate identity assignment.
//!
//! Identities are filled in during commit, and only where the entity's
//! identity field still holds its type's "unset" sentinel (zero for
//! integers, the nil token for `EntityId`/`Uuid`). Caller-assigned
//! identities are never overwritten.

mod registry;
mod strategy;

pub use registry::IdentityRegistry;
pub use strategy::{
    AssignIdentity, IdentityGenerator, IdentityKey, IdentityStrategy, NumericIdentity, NumericKey,
    TokenIdentity, TokenKey,
};
