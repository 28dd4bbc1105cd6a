//! Save notifications.
//!
//! Every session commit emits [`SaveEvent::BeforeSave`] before any queued
//! work reaches the store and [`SaveEvent::AfterSave`] once the store commit
//! has finished. Events carry no payload beyond their kind.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut session = UnitOfWorkSession::new(EntityStore::shared());
//! let events = session.subscribe();
//!
//! session.commit()?;
//! assert_eq!(events.try_recv()?, SaveEvent::BeforeSave);
//! assert_eq!(events.try_recv()?, SaveEvent::AfterSave);
//! ```

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Marker event emitted around a session commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    /// Commit is about to start.
    BeforeSave,
    /// Commit completed.
    AfterSave,
}

/// Distributes save events to subscribers.
///
/// Subscribers whose receiver was dropped are removed on the next emit.
pub struct SaveFeed {
    subscribers: RwLock<Vec<Sender<SaveEvent>>>,
}

impl SaveFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that gets every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<SaveEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers.
    pub fn emit(&self, event: SaveEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for SaveFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SaveFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_arrive_in_emit_order() {
        let feed = SaveFeed::new();
        let events = feed.subscribe();

        feed.emit(SaveEvent::BeforeSave);
        feed.emit(SaveEvent::AfterSave);

        let seen: Vec<_> = events.try_iter().collect();
        assert_eq!(seen, vec![SaveEvent::BeforeSave, SaveEvent::AfterSave]);
    }

    #[test]
    fn late_subscriber_misses_earlier_saves() {
        let feed = SaveFeed::new();
        let early = feed.subscribe();
        feed.emit(SaveEvent::BeforeSave);
        let late = feed.subscribe();
        feed.emit(SaveEvent::AfterSave);

        assert_eq!(early.try_iter().count(), 2);
        assert_eq!(late.try_iter().collect::<Vec<_>>(), vec![SaveEvent::AfterSave]);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_emit() {
        let feed = SaveFeed::default();
        let kept = feed.subscribe();
        drop(feed.subscribe());
        assert_eq!(feed.subscriber_count(), 2);

        feed.emit(SaveEvent::BeforeSave);

        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), SaveEvent::BeforeSave);
    }
}
