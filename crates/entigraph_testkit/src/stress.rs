//! Contention helpers.
//!
//! Drive several isolated sessions against one store from different
//! threads and report how often optimistic commits had to be retried.

use crate::fixtures::Account;
use entigraph_core::{CoreError, DataContext, EntityStore, IsolatedSession};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration for a contention run.
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    /// Number of concurrent sessions, one per thread.
    pub sessions: usize,
    /// Successful commits each session must reach.
    pub commits_per_session: usize,
    /// Stale retries a session may spend before giving up.
    pub max_retries: usize,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        Self {
            sessions: 4,
            commits_per_session: 25,
            max_retries: 10_000,
        }
    }
}

/// Result of a contention run.
#[derive(Debug, Clone)]
pub struct ContentionReport {
    /// Commits that went through.
    pub committed: usize,
    /// Commits rejected as stale and retried.
    pub stale: usize,
    /// Sessions that ran out of retries.
    pub gave_up: usize,
    /// Wall time of the run.
    pub duration: Duration,
}

impl ContentionReport {
    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Committed: {}", self.committed);
        println!("Stale retries: {}", self.stale);
        println!("Gave up: {}", self.gave_up);
        println!("Duration: {:?}", self.duration);
    }
}

/// Runs `config.sessions` isolated sessions in parallel.
///
/// Each session adds one account per commit and, when the commit is
/// stale, re-queries and retries it. Every account added is eventually
/// committed unless the session gives up.
pub fn run_contending_sessions(store: &Arc<EntityStore>, config: &ContentionConfig) -> ContentionReport {
    let start = Instant::now();
    let handles: Vec<_> = (0..config.sessions)
        .map(|worker| {
            let store = Arc::clone(store);
            let config = config.clone();
            thread::spawn(move || run_session(worker, store, &config))
        })
        .collect();

    let mut report = ContentionReport {
        committed: 0,
        stale: 0,
        gave_up: 0,
        duration: Duration::ZERO,
    };
    for handle in handles {
        let (committed, stale, finished) = handle.join().expect("session thread panicked");
        report.committed += committed;
        report.stale += stale;
        if !finished {
            report.gave_up += 1;
        }
    }
    report.duration = start.elapsed();
    report
}

fn run_session(worker: usize, store: Arc<EntityStore>, config: &ContentionConfig) -> (usize, usize, bool) {
    let mut session = IsolatedSession::new(store);
    let mut committed = 0;
    let mut stale = 0;
    while committed < config.commits_per_session {
        session
            .add(Account::owned_by(&format!("w{worker}-{committed}")))
            .expect("add never fails for a fresh account");
        loop {
            match session.commit() {
                Ok(_) => {
                    committed += 1;
                    break;
                }
                Err(CoreError::StaleSession { .. }) => {
                    stale += 1;
                    if stale > config.max_retries {
                        return (committed, stale, false);
                    }
                    session.query::<Account>();
                }
                Err(err) => panic!("unexpected commit failure: {err}"),
            }
        }
    }
    (committed, stale, true)
}
