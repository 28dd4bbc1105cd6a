//! Store and session configuration.

/// Configuration for an [`EntityStore`](crate::EntityStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether `add` fills declared back-reference fields on the new
    /// entity's direct children.
    pub repair_back_references: bool,

    /// Whether commit sweeps entities that are no longer reachable from a root.
    pub prune_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            repair_back_references: true,
            prune_on_commit: true,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether back references are repaired on add.
    #[must_use]
    pub const fn repair_back_references(mut self, value: bool) -> Self {
        self.repair_back_references = value;
        self
    }

    /// Sets whether unreachable entities are pruned on commit.
    #[must_use]
    pub const fn prune_on_commit(mut self, value: bool) -> Self {
        self.prune_on_commit = value;
        self
    }
}

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether the default `i16`/`i32`/`i64`/`EntityId`/`Uuid` identity
    /// generators are registered when the session is created.
    pub register_default_identities: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            register_default_identities: true,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether default identity generators are registered.
    #[must_use]
    pub const fn register_default_identities(mut self, value: bool) -> Self {
        self.register_default_identities = value;
        self
    }
}
