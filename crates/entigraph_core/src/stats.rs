//! Store statistics.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = EntityStore::shared();
//! // ... sessions add and commit ...
//! let stats = store.stats().snapshot();
//! println!("Pruned: {}", stats.nodes_pruned);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Store statistics.
///
/// All counters are atomic and can be read while a commit is in progress.
/// Values only ever grow; [`EntityStore::clear`](crate::EntityStore::clear)
/// does not reset them.
#[derive(Debug, Default)]
pub struct StoreStats {
    /// Entities passed to `add` that were not yet tracked.
    adds: AtomicU64,
    /// Nodes dropped by explicit removal, including cascades.
    removes: AtomicU64,
    /// Successful store commits.
    commits: AtomicU64,
    /// Nodes dropped by the orphan collector.
    nodes_pruned: AtomicU64,
    /// Identity fields filled in during commit.
    identities_assigned: AtomicU64,
    /// Commits rejected because the session was stale.
    stale_rejections: AtomicU64,
}

impl StoreStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removes(&self, count: u64) {
        self.removes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pruned(&self, count: u64) {
        self.nodes_pruned.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_identities(&self, count: u64) {
        self.identities_assigned.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_rejection(&self) {
        self.stale_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of newly tracked roots.
    pub fn adds(&self) -> u64 {
        self.adds.load(Ordering::Relaxed)
    }

    /// Returns the number of nodes dropped by removal.
    pub fn removes(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    /// Returns the number of successful commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of nodes pruned as orphans.
    pub fn nodes_pruned(&self) -> u64 {
        self.nodes_pruned.load(Ordering::Relaxed)
    }

    /// Returns the number of identities assigned.
    pub fn identities_assigned(&self) -> u64 {
        self.identities_assigned.load(Ordering::Relaxed)
    }

    /// Returns the number of stale commits rejected.
    pub fn stale_rejections(&self) -> u64 {
        self.stale_rejections.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            adds: self.adds(),
            removes: self.removes(),
            commits: self.commits(),
            nodes_pruned: self.nodes_pruned(),
            identities_assigned: self.identities_assigned(),
            stale_rejections: self.stale_rejections(),
        }
    }
}

/// A point-in-time snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Newly tracked roots.
    pub adds: u64,
    /// Nodes dropped by removal.
    pub removes: u64,
    /// Successful commits.
    pub commits: u64,
    /// Nodes pruned as orphans.
    pub nodes_pruned: u64,
    /// Identities assigned.
    pub identities_assigned: u64,
    /// Stale commits rejected.
    pub stale_rejections: u64,
}
