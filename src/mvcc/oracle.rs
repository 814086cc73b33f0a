//! OracleClock - logical timestamp authority
//!
//! - One counter issues both start and commit timestamps, strictly
//!   increasing, never reused
//! - Issuance is serialized behind a single mutex
//! - Start timestamps are registered as in-flight until `done`; the smallest
//!   of them is the watermark used by garbage collection
//! - A commit timestamp stays "unpublished" until its batch is applied or
//!   abandoned; `begin` does not hand out a timestamp above an unpublished
//!   commit, so no snapshot ever observes half of a commit
//!
//! After a restart the counter resumes above the highest commit timestamp
//! replayed from the WAL.

use std::collections::BTreeSet;

use parking_lot::{Condvar, Mutex};

use super::Timestamp;
use crate::errors::{KvError, KvResult};

#[derive(Debug, Default)]
struct OracleState {
    /// Highest timestamp handed out so far.
    last_issued: u64,
    /// Highest commit timestamp whose batch is visible.
    last_published: u64,
    /// Start timestamps of transactions not yet done.
    in_flight: BTreeSet<u64>,
    /// Commit timestamps issued but not yet published or abandoned.
    unpublished: BTreeSet<u64>,
}

/// Process-wide timestamp oracle shared by every transaction of a database.
#[derive(Debug, Default)]
pub struct OracleClock {
    state: Mutex<OracleState>,
    settled: Condvar,
}

impl OracleClock {
    /// Create an oracle for a fresh database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an oracle that resumes after the highest replayed commit.
    pub fn from_replayed(highest: Timestamp) -> Self {
        Self {
            state: Mutex::new(OracleState {
                last_issued: highest.value(),
                last_published: highest.value(),
                ..OracleState::default()
            }),
            settled: Condvar::new(),
        }
    }

    /// Issues a start timestamp and registers it as in-flight.
    ///
    /// Waits while a commit is between timestamp assignment and publication;
    /// the wait is bounded by a single in-memory batch apply.
    pub fn begin(&self) -> Timestamp {
        let mut state = self.state.lock();
        while !state.unpublished.is_empty() {
            self.settled.wait(&mut state);
        }
        state.last_issued += 1;
        let ts = state.last_issued;
        state.in_flight.insert(ts);
        Timestamp::new(ts)
    }

    /// Issues a commit timestamp above everything issued before.
    ///
    /// The caller must later `publish` or `abandon` it.
    pub fn commit(&self) -> Timestamp {
        let mut state = self.state.lock();
        state.last_issued += 1;
        let ts = state.last_issued;
        state.unpublished.insert(ts);
        Timestamp::new(ts)
    }

    /// Marks a commit timestamp's batch as applied and visible.
    pub fn publish(&self, commit_ts: Timestamp) -> KvResult<()> {
        let mut state = self.state.lock();
        if !state.unpublished.remove(&commit_ts.value()) {
            return Err(KvError::invariant(format!(
                "publish of commit_ts {} that is not pending",
                commit_ts
            )));
        }
        state.last_published = state.last_published.max(commit_ts.value());
        drop(state);
        self.settled.notify_all();
        Ok(())
    }

    /// Releases a commit timestamp whose batch will never be applied.
    pub fn abandon(&self, commit_ts: Timestamp) {
        let mut state = self.state.lock();
        let removed = state.unpublished.remove(&commit_ts.value());
        drop(state);
        if removed {
            self.settled.notify_all();
        }
    }

    /// Deregisters an in-flight transaction. Returns false if `start_ts` was
    /// not registered (already done).
    pub fn done(&self, start_ts: Timestamp) -> bool {
        self.state.lock().in_flight.remove(&start_ts.value())
    }

    /// Minimum in-flight start timestamp, or the last issued timestamp when
    /// nothing is in flight.
    pub fn watermark(&self) -> Timestamp {
        let state = self.state.lock();
        let floor = state
            .in_flight
            .first()
            .copied()
            .unwrap_or(state.last_issued);
        Timestamp::new(floor)
    }

    /// Number of transactions that have begun and are not done.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Highest timestamp issued so far.
    pub fn last_issued(&self) -> Timestamp {
        Timestamp::new(self.state.lock().last_issued)
    }

    /// Highest commit timestamp whose batch is visible.
    pub fn last_published(&self) -> Timestamp {
        Timestamp::new(self.state.lock().last_published)
    }
}
