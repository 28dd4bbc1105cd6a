//! Opaque entity token.

use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identity for entities that have no natural key.
///
/// `EntityId::NIL` is what `Default` yields and what the token generator
/// fills in on commit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(Uuid);

impl EntityId {
    /// The unset token.
    pub const NIL: Self = Self(Uuid::nil());

    /// Mints a random token.
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns true for [`EntityId::NIL`].
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the token as a UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            f.write_str("EntityId(nil)")
        } else {
            write!(f, "EntityId({})", self.0.simple())
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_tokens_are_set_and_distinct() {
        let a = EntityId::mint();
        let b = EntityId::mint();
        assert!(!a.is_nil());
        assert_ne!(a, b);
    }

    #[test]
    fn default_token_is_unset() {
        assert_eq!(EntityId::default(), EntityId::NIL);
        assert_eq!(format!("{:?}", EntityId::NIL), "EntityId(nil)");
    }

    #[test]
    fn converts_to_and_from_uuid() {
        let uuid = Uuid::from_u128(0xfeed);
        let id = EntityId::from(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(Uuid::from(id), uuid);
    }
}
