//! Shared in-memory entity store.

use crate::config::StoreConfig;
use crate::entity::schema::Entity;
use crate::entity::tracked::{AnyEntity, Tracked};
use crate::error::{CoreError, CoreResult};
use crate::graph::Graph;
use crate::identity::IdentityRegistry;
use crate::stats::StoreStats;
use crate::types::CommitVersion;
use parking_lot::RwLock;
use std::any::TypeId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The tracked object graph shared by every session.
///
/// The store holds entities reachable from explicitly added roots. Adding
/// an entity tracks everything it references through declared owning
/// relationships; committing re-reads the graph, drops entities nothing
/// references any more and fills unset identities.
///
/// All operations take an internal lock for their whole duration, so a
/// store can be shared across threads behind an `Arc`. Do not hold an
/// entity's write guard while calling into the store: discovery reads
/// every tracked entity.
pub struct EntityStore {
    config: StoreConfig,
    graph: RwLock<Graph>,
    /// Incremented once per successful commit; reset by [`Self::clear`].
    version: AtomicU64,
    stats: StoreStats,
}

impl EntityStore {
    /// Creates an empty store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates an empty store.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            graph: RwLock::new(Graph::new()),
            version: AtomicU64::new(0),
            stats: StoreStats::new(),
        }
    }

    /// Creates an empty store ready to be shared between sessions.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Tracks `entity` as a root, together with everything it references.
    ///
    /// Adding an entity that is already tracked is a no-op for that entity,
    /// though newly referenced children are still picked up. When it was
    /// tracked only as somebody's child it becomes a root.
    pub fn add<T: Entity>(&self, entity: &Tracked<T>) -> CoreResult<()> {
        self.add_erased(entity.erase())
    }

    pub(crate) fn add_erased(&self, entity: AnyEntity) -> CoreResult<()> {
        let mut graph = self.graph.write();
        let id = match graph.node_of(entity.key()) {
            Some(existing) => {
                if let Some(node) = graph.node_mut(existing) {
                    node.pinned = true;
                }
                existing
            }
            None => {
                self.stats.record_add();
                graph.insert(entity, true)
            }
        };
        let discovery = graph.discover(id, false);
        tracing::debug!(
            root = %id,
            created = discovery.created.len(),
            linked = discovery.linked,
            "entity added"
        );
        if self.config.repair_back_references {
            graph.repair_back_references(id)?;
        }
        Ok(())
    }

    /// Stops tracking `entity`.
    ///
    /// References to it held by tracked parents are cleared. Children that
    /// were reachable only through it are removed too; children with
    /// another live parent merely lose the link.
    ///
    /// Returns `false` when the entity is not tracked, for instance because
    /// an earlier remove already cascaded to it.
    pub fn remove<T: Entity>(&self, entity: &Tracked<T>) -> CoreResult<bool> {
        self.remove_erased(&entity.erase())
    }

    pub(crate) fn remove_erased(&self, entity: &AnyEntity) -> CoreResult<bool> {
        let removed = self.graph.write().remove(entity)?;
        if removed == 0 {
            tracing::debug!(entity = ?entity, "remove of untracked entity ignored");
            return Ok(false);
        }
        self.stats.record_removes(removed as u64);
        tracing::debug!(entity = ?entity, removed, "entity removed");
        Ok(true)
    }

    /// Synchronizes the store with the current state of its entities.
    ///
    /// In order: drops unreachable entities, discovers newly attached ones,
    /// fills unset identities through `registry`, then advances the commit
    /// version.
    pub fn commit(&self, registry: &IdentityRegistry) -> CoreResult<CommitVersion> {
        self.commit_checked(None, registry)
    }

    /// Commits only if the store is still at `expected`.
    ///
    /// The check and the commit happen under the same lock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StaleSession`] if another commit happened since
    /// `expected` was observed.
    pub fn commit_at(
        &self,
        expected: CommitVersion,
        registry: &IdentityRegistry,
    ) -> CoreResult<CommitVersion> {
        self.commit_checked(Some(expected), registry)
    }

    fn commit_checked(
        &self,
        expected: Option<CommitVersion>,
        registry: &IdentityRegistry,
    ) -> CoreResult<CommitVersion> {
        let mut graph = self.graph.write();

        if let Some(expected) = expected {
            let current = self.version();
            if current != expected {
                self.stats.record_stale_rejection();
                tracing::warn!(%expected, %current, "rejected commit from stale session");
                return Err(CoreError::stale(expected, current));
            }
        }

        let pruned = if self.config.prune_on_commit {
            graph.collect_orphans()?
        } else {
            0
        };
        let discovery = graph.find_changes();
        let assigned = graph.apply_identities(registry)?;

        let version = CommitVersion::new(self.version.fetch_add(1, Ordering::SeqCst) + 1);
        self.stats.record_commit();
        self.stats.record_pruned(pruned as u64);
        self.stats.record_identities(assigned);
        tracing::debug!(
            %version,
            nodes = graph.len(),
            pruned,
            discovered = discovery.created.len(),
            assigned,
            "store committed"
        );
        Ok(version)
    }

    /// Returns every tracked entity of type `T`, in the order they were
    /// first tracked.
    pub fn query<T: Entity>(&self) -> Vec<Tracked<T>> {
        self.graph
            .read()
            .entities_of(TypeId::of::<T>())
            .iter()
            .filter_map(AnyEntity::downcast::<T>)
            .collect()
    }

    /// Returns tracked entities of type `T` matching `predicate`.
    ///
    /// The predicate runs after the store lock is released.
    pub fn query_where<T, F>(&self, predicate: F) -> Vec<Tracked<T>>
    where
        T: Entity,
        F: Fn(&T) -> bool,
    {
        self.query::<T>()
            .into_iter()
            .filter(|entity| predicate(&entity.read()))
            .collect()
    }

    /// Returns true if `entity` is tracked.
    pub fn contains<T: Entity>(&self, entity: &Tracked<T>) -> bool {
        self.graph.read().contains(entity.key())
    }

    pub(crate) fn contains_erased(&self, entity: &AnyEntity) -> bool {
        self.graph.read().contains(entity.key())
    }

    /// Every tracked entity, in the order they were first tracked.
    pub(crate) fn entities(&self) -> Vec<AnyEntity> {
        self.graph
            .read()
            .nodes()
            .map(|node| node.entity.clone())
            .collect()
    }

    /// Returns the number of tracked entities.
    pub fn len(&self) -> usize {
        self.graph.read().len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of commits since creation or the last clear.
    pub fn version(&self) -> CommitVersion {
        CommitVersion::new(self.version.load(Ordering::SeqCst))
    }

    /// Returns store statistics.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Drops every tracked entity and resets the commit version.
    ///
    /// Sessions created before the clear become stale only if their
    /// observed version differs from the reset one.
    pub fn clear(&self) {
        let mut graph = self.graph.write();
        graph.clear();
        self.version.store(0, Ordering::SeqCst);
        tracing::debug!("store cleared");
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("len", &self.len())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
