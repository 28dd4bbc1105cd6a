//! Sessions over a shared [`EntityStore`](crate::EntityStore).
//!
//! Two session kinds exist:
//! - [`UnitOfWorkSession`] queues adds and removes and applies them to the
//!   store on commit. Entities are shared with the store, so field edits
//!   are visible to every session immediately.
//! - [`IsolatedSession`] hands out private working copies. Edits reach the
//!   store only on commit, and only if no other session committed since
//!   this one last synchronized.
//!
//! Both implement [`DataContext`], the surface repository code programs
//! against.

mod isolated;
mod mirror;
mod unit_of_work;

pub use isolated::IsolatedSession;
pub use unit_of_work::UnitOfWorkSession;

use crate::entity::{Entity, Tracked};
use crate::error::CoreResult;
use crate::identity::AssignIdentity;
use crate::save_feed::SaveEvent;
use std::future::Ready;
use std::sync::mpsc::Receiver;

/// Repository-facing unit of work.
pub trait DataContext {
    /// Schedules `entity` to be tracked on the next commit.
    ///
    /// Returns the handle the caller should keep using.
    fn add<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>>;

    /// Schedules `entity` to stop being tracked on the next commit.
    fn remove<T: Entity>(&mut self, entity: &Tracked<T>) -> CoreResult<()>;

    /// Returns the committed entities of type `T`.
    ///
    /// Infallible for callers: implementations that need to synchronize
    /// first log internal failures and return what they hold.
    fn query<T: Entity>(&mut self) -> Vec<Tracked<T>>;

    /// Applies queued work and commits the store.
    ///
    /// The returned code is always zero; there is no row count.
    fn commit(&mut self) -> CoreResult<i32>;

    /// Runs [`Self::commit`] immediately and returns its outcome as a
    /// completed future.
    fn commit_async(&mut self) -> Ready<CoreResult<i32>> {
        std::future::ready(self.commit())
    }

    /// Re-reads `entity` from the store.
    fn reload<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>>;

    /// Marks `entity` as modified.
    fn update<T: Entity>(&mut self, entity: Tracked<T>) -> CoreResult<Tracked<T>>;

    /// Registers the identity strategy for entity type `T`.
    fn register_identity_strategy<T, S>(&mut self, strategy: S)
    where
        T: Entity,
        S: AssignIdentity<T> + 'static;

    /// Subscribes to the before/after save notifications.
    fn subscribe(&self) -> Receiver<SaveEvent>;
}
