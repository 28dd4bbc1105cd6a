//! Snapshot-isolated session with optimistic commits.

use crate::config::SessionConfig;
use crate::entity::tracked::AnyEntity;
use crate::entity::{Entity, EntityStore, Tracked};
use crate::error::{CoreError, CoreResult};
use crate::identity::{AssignIdentity, IdentityGenerator};
use crate::save_feed::SaveEvent;
use crate::session::mirror::{Mirror, Side};
use crate::session::{DataContext, UnitOfWorkSession};
use crate::types::CommitVersion;
use std::any::TypeId;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// A session whose entities are private working copies.
///
/// Adding an entity clones its graph into store-owned shadows; the caller
/// keeps editing the working copies without affecting other sessions.
/// Queries return working copies as well. On commit the session pushes
/// working state into the shadows and commits the store, but only when no
/// other session committed since this one last synchronized.
///
/// A stale commit fails with [`CoreError::StaleSession`]. Recover by
/// querying again (which re-synchronizes) and retrying.
pub struct IsolatedSession {
    base: UnitOfWorkSession,
    mirror: Mirror,
    /// Store version the working copies reflect.
    observed: CommitVersion,
    /// Store version the mirror was last refreshed at.
    synced: Option<CommitVersion>,
}

impl IsolatedSession {
    /// Creates a session with default configuration.
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    /// Creates a session.
    pub fn with_config(store: Arc<EntityStore>, config: SessionConfig) -> Self {
        let observed = store.version();
        Self {
            base: UnitOfWorkSession::with_config(store, config),
            mirror: Mirror::new(),
            observed,
            synced: None,
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<EntityStore> {
        self.base.store()
    }

    /// Returns the store version this session last synchronized with.
    pub fn observed_version(&self) -> CommitVersion {
        self.observed
    }

    /// Returns true if another session committed since this one last
    /// synchronized.
    pub fn is_stale(&self) -> bool {
        self.store().version() != self.observed
    }

    /// Returns the number of working copies with a shadow.
    pub fn mirrored(&self) -> usize {
        self.mirror.len()
    }

    /// See [`UnitOfWorkSession::register_identity_generator`].
    pub fn register_identity_generator<G>(&mut self, generator: G)
    where
        G: IdentityGenerator + 'static,
    {
        self.base.register_identity_generator(generator);
    }

    /// Returns the shadow of `entity`, if it has one.
    pub fn shadow_of<T: Entity>(&self, entity: &Tracked<T>) -> Option<Tracked<T>> {
        self.mirror
            .shadow_of(entity.key())
            .and_then(AnyEntity::downcast::<T>)
    }

    /// Brings working copies up to date with the store.
    ///
    /// Errors are invariant violations from cloning; `synced` is left
    /// untouched so the next call starts over.
    ///
    /// Working copies of tracked shadows are overwritten, so uncommitted
    /// edits to them are discarded. Shadows without a working copy get one.
    fn refresh(&mut self) -> CoreResult<()> {
        let current = self.store().version();
        if self.synced == Some(current) {
            return Ok(());
        }
        let store = Arc::clone(self.store());
        let pulled = self.pull_shadow_state(|shadow| store.contains_erased(shadow))?;
        let mut cloned = 0;
        for shadow in store.entities() {
            if self.mirror.working_of(shadow.key()).is_none() {
                self.mirror.mirror(&shadow, Side::Working)?;
                cloned += 1;
            }
        }
        tracing::debug!(from = %self.observed, to = %current, pulled, cloned, "isolated session refreshed");
        self.observed = current;
        self.synced = Some(current);
        Ok(())
    }

    fn push_working_state(&mut self) -> CoreResult<usize> {
        let pairs = self.mirror.pairs();
        for (working, shadow) in &pairs {
            self.mirror.copy_scalars(working, shadow);
        }
        let mut rewritten = 0;
        for (working, shadow) in &pairs {
            rewritten += self.mirror.reconcile(working, shadow, Side::Shadow)?;
        }
        Ok(rewritten)
    }

    /// Copies shadow state into the working copies of pairs selected by
    /// `include`. Pairs whose shadow is still queued are never selected
    /// by callers, since the store does not hold them yet.
    fn pull_shadow_state(&mut self, include: impl Fn(&AnyEntity) -> bool) -> CoreResult<usize> {
        let pairs: Vec<_> = self
            .mirror
            .pairs()
            .into_iter()
            .filter(|(_, shadow)| include(shadow))
            .collect();
        for (working, shadow) in &pairs {
            self.mirror.copy_scalars(shadow, working);
        }
        for (working, shadow) in &pairs {
            self.mirror.reconcile(shadow, working, Side::Working)?;
        }
        Ok(pairs.len())
    }
}

impl DataContext for IsolatedSession {
    fn add<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>> {
        let shadow = self.mirror.mirror(&entity.erase(), Side::Shadow)?;
        self.base.enqueue_add(shadow);
        Ok(entity)
    }

    /// # Errors
    ///
    /// Returns [`CoreError::NotTracked`] if `entity` was never added or
    /// returned by a query of this session.
    fn remove<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        let shadow = self
            .mirror
            .shadow_of(entity.key())
            .cloned()
            .ok_or_else(|| CoreError::not_tracked(std::any::type_name::<T>()))?;
        self.base.enqueue_remove(shadow);
        Ok(())
    }

    /// Refreshes working copies first when the store moved.
    ///
    /// Refreshing only fails on [`CoreError::InvariantViolation`], when a
    /// descriptor cannot clone the entity it was built for. That is logged
    /// and the copies from the last good refresh are returned; the next
    /// query retries, since the session is not marked as synchronized.
    fn query<T: Entity>(&mut self) -> Vec<Tracked<T>> {
        if let Err(err) = self.refresh() {
            tracing::error!(error = %err, "isolated session refresh failed");
        }
        let wanted = TypeId::of::<T>();
        self.store()
            .entities()
            .iter()
            .filter(|shadow| shadow.type_id() == wanted)
            .filter_map(|shadow| self.mirror.working_of(shadow.key()))
            .filter_map(AnyEntity::downcast::<T>)
            .collect()
    }

    fn commit(&mut self) -> CoreResult<i32> {
        let current = self.store().version();
        if current != self.observed {
            self.store().stats().record_stale_rejection();
            tracing::warn!(observed = %self.observed, %current, "isolated session is stale");
            return Err(CoreError::stale(self.observed, current));
        }

        self.base.emit(SaveEvent::BeforeSave);
        let rewritten = self.push_working_state()?;
        let version = self.base.flush(Some(self.observed))?;

        let store = Arc::clone(self.store());
        self.mirror.retain_shadows(|shadow| store.contains_erased(shadow));
        self.pull_shadow_state(|shadow| store.contains_erased(shadow))?;
        self.observed = version;
        self.synced = Some(version);
        tracing::debug!(%version, rewritten, mirrored = self.mirror.len(), "isolated session committed");
        self.base.emit(SaveEvent::AfterSave);
        Ok(0)
    }

    fn reload<T: Entity>(&mut self, _entity: Tracked<T>) -> CoreResult<Tracked<T>> {
        Err(CoreError::unsupported("reload"))
    }

    fn update<T: Entity>(&mut self, _entity: Tracked<T>) -> CoreResult<Tracked<T>> {
        Err(CoreError::unsupported("update"))
    }

    fn register_identity_strategy<T, S>(&mut self, strategy: S)
    where
        T: Entity,
        S: AssignIdentity<T> + 'static,
    {
        self.base.register_identity_strategy::<T, S>(strategy);
    }

    fn subscribe(&self) -> Receiver<SaveEvent> {
        self.base.subscribe()
    }
}

impl std::fmt::Debug for IsolatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedSession")
            .field("observed", &self.observed)
            .field("mirror", &self.mirror)
            .field("base", &self.base)
            .finish()
    }
}
