//! Queue-and-flush session.

use crate::config::SessionConfig;
use crate::entity::tracked::AnyEntity;
use crate::entity::{Entity, EntityStore, Tracked};
use crate::error::CoreResult;
use crate::identity::{AssignIdentity, IdentityGenerator, IdentityRegistry};
use crate::save_feed::{SaveEvent, SaveFeed};
use crate::session::DataContext;
use crate::types::CommitVersion;
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// A session that queues adds and removes until commit.
///
/// Nothing reaches the store before [`commit`](DataContext::commit):
/// a queued entity is not returned by [`query`](DataContext::query).
/// Entities are shared with the store, so once tracked, field edits made
/// through any handle are visible everywhere.
///
/// # Example
///
/// ```rust,ignore
/// let store = EntityStore::shared();
/// let mut session = UnitOfWorkSession::new(Arc::clone(&store));
///
/// let blog = session.add(Tracked::new(Blog::default()))?;
/// session.commit()?;
/// assert_eq!(session.query::<Blog>(), vec![blog]);
/// ```
pub struct UnitOfWorkSession {
    store: Arc<EntityStore>,
    registry: IdentityRegistry,
    feed: SaveFeed,
    pending_adds: VecDeque<AnyEntity>,
    pending_removes: VecDeque<AnyEntity>,
}

impl UnitOfWorkSession {
    /// Creates a session with default configuration.
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    /// Creates a session.
    pub fn with_config(store: Arc<EntityStore>, config: SessionConfig) -> Self {
        let registry = if config.register_default_identities {
            IdentityRegistry::with_defaults()
        } else {
            IdentityRegistry::new()
        };
        Self {
            store,
            registry,
            feed: SaveFeed::new(),
            pending_adds: VecDeque::new(),
            pending_removes: VecDeque::new(),
        }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Registers the generator used for every entity declaring
    /// `Identifiable<G::Key>`.
    pub fn register_identity_generator<G>(&mut self, generator: G)
    where
        G: IdentityGenerator + 'static,
    {
        self.registry.register_generator(generator);
    }

    /// Returns the number of queued adds.
    pub fn pending_adds(&self) -> usize {
        self.pending_adds.len()
    }

    /// Returns the number of queued removes.
    pub fn pending_removes(&self) -> usize {
        self.pending_removes.len()
    }

    pub(crate) fn enqueue_add(&mut self, entity: AnyEntity) {
        self.pending_adds.push_back(entity);
    }

    pub(crate) fn enqueue_remove(&mut self, entity: AnyEntity) {
        self.pending_removes.push_back(entity);
    }

    pub(crate) fn emit(&self, event: SaveEvent) {
        self.feed.emit(event);
    }

    /// Drains the queues into the store, then commits it.
    ///
    /// With `expected` set the store commit is rejected when another
    /// commit happened since that version. Queued work applied before the
    /// rejection stays applied.
    pub(crate) fn flush(&mut self, expected: Option<CommitVersion>) -> CoreResult<CommitVersion> {
        let adds = self.pending_adds.len();
        let removes = self.pending_removes.len();
        while let Some(entity) = self.pending_adds.pop_front() {
            self.store.add_erased(entity)?;
        }
        while let Some(entity) = self.pending_removes.pop_front() {
            self.store.remove_erased(&entity)?;
        }
        let version = match expected {
            Some(expected) => self.store.commit_at(expected, &self.registry)?,
            None => self.store.commit(&self.registry)?,
        };
        tracing::debug!(adds, removes, %version, "session flushed");
        Ok(version)
    }
}

impl DataContext for UnitOfWorkSession {
    fn add<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>> {
        self.enqueue_add(entity.erase());
        Ok(entity)
    }

    fn remove<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()> {
        self.enqueue_remove(entity.erase());
        Ok(())
    }

    fn query<T: Entity>(&mut self) -> Vec<Tracked<T>> {
        self.store.query::<T>()
    }

    fn commit(&mut self) -> CoreResult<i32> {
        self.emit(SaveEvent::BeforeSave);
        self.flush(None)?;
        self.emit(SaveEvent::AfterSave);
        Ok(0)
    }

    // Entities are shared with the store: there is nothing to reload.
    fn reload<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>> {
        Ok(entity)
    }

    fn update<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>> {
        Ok(entity)
    }

    fn register_identity_strategy<T, S>(&mut self, strategy: S)
    where
        T: Entity,
        S: AssignIdentity<T> + 'static,
    {
        self.registry.register_strategy::<T, S>(strategy);
    }

    fn subscribe(&self) -> Receiver<SaveEvent> {
        self.feed.subscribe()
    }
}

impl std::fmt::Debug for UnitOfWorkSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWorkSession")
            .field("pending_adds", &self.pending_adds.len())
            .field("pending_removes", &self.pending_removes.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Identifiable, Schema};
    use crate::error::CoreError;
    use crate::identity::{IdentityStrategy, NumericIdentity};

    #[derive(Debug, Clone, Default)]
    struct Invoice {
        number: i16,
        items: Vec<Tracked<Item>>,
    }

    impl Entity for Invoice {
        fn describe(schema: &mut Schema<Self>) {
            schema
                .plural("items", |i| &i.items, |i| &mut i.items)
                .identified_by::<i16>();
        }
    }

    impl Identifiable<i16> for Invoice {
        fn id(&self) -> i16 {
            self.number
        }

        fn set_id(&mut self, id: i16) {
            self.number = id;
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Item {
        label: String,
    }

    impl Entity for Item {}

    fn session() -> UnitOfWorkSession {
        UnitOfWorkSession::new(EntityStore::shared())
    }

    #[test]
    fn add_is_invisible_until_commit() {
        let mut session = session();
        let invoice = session.add(Tracked::new(Invoice::default())).unwrap();

        assert!(session.query::<Invoice>().is_empty());
        assert_eq!(session.pending_adds(), 1);

        assert_eq!(session.commit().unwrap(), 0);
        assert_eq!(session.query::<Invoice>(), vec![invoice]);
        assert_eq!(session.pending_adds(), 0);
    }

    #[test]
    fn adds_drain_before_removes() {
        let mut session = session();
        let invoice = session.add(Tracked::new(Invoice::default())).unwrap();
        session.remove(&invoice).unwrap();

        session.commit().unwrap();
        assert!(session.query::<Invoice>().is_empty());
    }

    #[test]
    fn remove_of_untracked_is_ignored_at_commit() {
        let mut session = session();
        let invoice = session.add(Tracked::new(Invoice::default())).unwrap();
        session.remove(&Tracked::new(Item::default())).unwrap();

        session.commit().unwrap();
        assert_eq!(session.query::<Invoice>(), vec![invoice]);
        assert_eq!(session.store().version().as_u64(), 1);
    }

    #[test]
    fn commit_emits_save_events_in_order() {
        let mut session = session();
        let events = session.subscribe();

        session.commit().unwrap();

        assert_eq!(events.try_recv().unwrap(), SaveEvent::BeforeSave);
        assert_eq!(events.try_recv().unwrap(), SaveEvent::AfterSave);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn failed_commit_skips_after_save() {
        let mut session = session();
        let events = session.subscribe();
        session.register_identity_strategy::<Invoice, _>(IdentityStrategy::new(
            NumericIdentity::<i16>::starting_after(i16::MAX),
            |i: &mut Invoice| &mut i.number,
        ));
        session.add(Tracked::new(Invoice::default())).unwrap();

        let err = session.commit().unwrap_err();
        assert!(matches!(err, CoreError::IdentityExhausted { .. }));
        assert_eq!(events.try_iter().collect::<Vec<_>>(), vec![SaveEvent::BeforeSave]);
    }

    #[test]
    fn default_identities_follow_config() {
        let store = EntityStore::shared();
        let mut plain = UnitOfWorkSession::with_config(
            Arc::clone(&store),
            SessionConfig::new().register_default_identities(false),
        );
        let invoice = plain.add(Tracked::new(Invoice::default())).unwrap();
        plain.commit().unwrap();
        assert_eq!(invoice.read().number, 0);

        let mut defaulted = UnitOfWorkSession::new(store);
        defaulted.commit().unwrap();
        assert_eq!(invoice.read().number, 1);
    }

    #[test]
    fn registered_strategy_is_used() {
        let mut session = session();
        session.register_identity_strategy::<Invoice, _>(IdentityStrategy::new(
            NumericIdentity::<i16>::starting_after(500),
            |i: &mut Invoice| &mut i.number,
        ));
        let invoice = session.add(Tracked::new(Invoice::default())).unwrap();

        session.commit().unwrap();
        assert_eq!(invoice.read().number, 501);
    }

    #[test]
    fn reload_and_update_return_same_handle() {
        let mut session = session();
        let invoice = Tracked::new(Invoice::default());
        assert_eq!(session.reload(invoice.clone()).unwrap(), invoice);
        assert_eq!(session.update(invoice.clone()).unwrap(), invoice);
    }

    #[test]
    fn commit_async_is_already_complete() {
        let mut session = session();
        let invoice = session.add(Tracked::new(Invoice::default())).unwrap();

        let outcome = session.commit_async().into_inner();

        assert_eq!(outcome.unwrap(), 0);
        assert!(session.store().contains(&invoice));
    }
}
