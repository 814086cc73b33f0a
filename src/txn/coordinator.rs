//! CommitCoordinator - the single serialized commit path
//!
//! Under one commit mutex, in order:
//! 1. Validate the read-set: any key with a version committed after the
//!    transaction's start timestamp aborts the commit with `Conflict`
//! 2. Obtain a commit timestamp from the oracle
//! 3. Append the batch to the WAL (durable databases only)
//! 4. Apply the batch to the store as one unit
//! 5. Publish the commit timestamp
//!
//! Blind writes are never validated: two transactions writing the same key
//! without reading it both commit, and the later commit timestamp wins.
//!
//! If anything fails after step 2 the timestamp is abandoned, so the oracle
//! never waits on a commit that will not be published.
//!
//! A fatal failure (fsync, WAL corruption, invariant violation) poisons the
//! coordinator: every later commit returns `AERO_DB_POISONED`. Reads of
//! already published data keep working.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{KvError, KvResult};
use crate::mvcc::{OracleClock, Timestamp, VersionPayload, VersionedStore};
use crate::observability::{display_key, log_event_with_fields, Event, Logger};
use crate::wal::{WalRecord, WalWriter};

/// A transaction's buffered state, handed over to the coordinator on commit.
#[derive(Debug)]
pub struct PendingCommit {
    /// Snapshot the transaction read at
    pub start_ts: Timestamp,
    /// Keys looked up in the store, hits and misses alike
    pub reads: BTreeSet<Vec<u8>>,
    /// Buffered writes, last write per key
    pub writes: BTreeMap<Vec<u8>, VersionPayload>,
}

/// Commit behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct CommitSettings {
    /// Validate read-sets on commit
    pub detect_conflicts: bool,
    /// fsync the WAL after every commit
    pub sync_writes: bool,
    /// Upper bound on buffered writes per transaction
    pub max_pending_writes: usize,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            detect_conflicts: true,
            sync_writes: true,
            max_pending_writes: 100_000,
        }
    }
}

/// State guarded by the commit mutex.
#[derive(Debug)]
struct CommitLog {
    wal: Option<WalWriter>,
    committed: u64,
    /// First fatal commit failure
    poisoned: Option<String>,
}

/// Serializes commits for one database and owns the shared engine state
/// every transaction needs.
#[derive(Debug)]
pub struct CommitCoordinator {
    store: Arc<VersionedStore>,
    oracle: OracleClock,
    settings: CommitSettings,
    log: Mutex<CommitLog>,
}

/// Releases an issued commit timestamp unless it was published.
struct UnpublishedCommit<'a> {
    oracle: &'a OracleClock,
    commit_ts: Timestamp,
    published: bool,
}

impl UnpublishedCommit<'_> {
    fn publish(mut self) -> KvResult<()> {
        self.published = true;
        self.oracle.publish(self.commit_ts)
    }
}

impl Drop for UnpublishedCommit<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.oracle.abandon(self.commit_ts);
        }
    }
}

impl CommitCoordinator {
    /// Creates a coordinator over a store and oracle. `wal` is `None` for
    /// in-memory databases.
    pub fn new(
        store: Arc<VersionedStore>,
        oracle: OracleClock,
        wal: Option<WalWriter>,
        settings: CommitSettings,
    ) -> Self {
        Self {
            store,
            oracle,
            settings,
            log: Mutex::new(CommitLog {
                wal,
                committed: 0,
                poisoned: None,
            }),
        }
    }

    /// The shared version store.
    pub fn store(&self) -> &Arc<VersionedStore> {
        &self.store
    }

    /// The shared timestamp oracle.
    pub fn oracle(&self) -> &OracleClock {
        &self.oracle
    }

    /// Commit behavior switches.
    pub fn settings(&self) -> CommitSettings {
        self.settings
    }

    /// True if commits are logged to a WAL.
    pub fn is_durable(&self) -> bool {
        self.log.lock().wal.is_some()
    }

    /// Number of batches published through this coordinator.
    pub fn committed(&self) -> u64 {
        self.log.lock().committed
    }

    /// The fatal failure that stopped commits, if any.
    pub fn poisoned(&self) -> Option<String> {
        self.log.lock().poisoned.clone()
    }

    /// Validates and publishes one transaction's writes.
    ///
    /// Returns the commit timestamp. An empty write set must not reach the
    /// coordinator; the transaction short-circuits it.
    pub fn commit(&self, pending: PendingCommit) -> KvResult<Timestamp> {
        let PendingCommit {
            start_ts,
            reads,
            writes,
        } = pending;

        let mut log = self.log.lock();

        if let Some(cause) = &log.poisoned {
            return Err(KvError::Poisoned {
                cause: cause.clone(),
            });
        }

        if self.settings.detect_conflicts {
            self.validate(start_ts, &reads)?;
        }

        let guard = UnpublishedCommit {
            oracle: &self.oracle,
            commit_ts: self.oracle.commit(),
            published: false,
        };
        let commit_ts = guard.commit_ts;
        let record = WalRecord::commit(commit_ts, writes.into_iter().collect());

        let outcome = self
            .write_batch(&mut log, &record)
            .and_then(|()| guard.publish());
        if let Err(err) = outcome {
            if err.is_fatal() {
                log.poisoned = Some(err.to_string());
            }
            return Err(report(err));
        }
        log.committed += 1;
        drop(log);

        log_event_with_fields(
            Event::TxnCommit,
            &[
                ("commit_ts", &commit_ts.to_string()),
                ("start_ts", &start_ts.to_string()),
                ("writes", &record.entries.len().to_string()),
            ],
        );
        Ok(commit_ts)
    }

    /// Logs the batch (durable databases only), then applies it to the store.
    fn write_batch(&self, log: &mut CommitLog, record: &WalRecord) -> KvResult<()> {
        if let Some(wal) = log.wal.as_mut() {
            let written = wal.append(record, self.settings.sync_writes)?;
            log_event_with_fields(
                Event::WalAppend,
                &[
                    ("bytes", &written.to_string()),
                    ("commit_ts", &record.commit_ts.to_string()),
                ],
            );
        }
        self.store.apply(record.commit_ts, &record.entries)
    }

    fn validate(&self, start_ts: Timestamp, reads: &BTreeSet<Vec<u8>>) -> KvResult<()> {
        for key in reads {
            match self.store.latest_commit_ts(key) {
                Some(observed_ts) if observed_ts > start_ts => {
                    log_event_with_fields(
                        Event::TxnConflict,
                        &[
                            ("key", &display_key(key)),
                            ("observed_ts", &observed_ts.to_string()),
                            ("start_ts", &start_ts.to_string()),
                        ],
                    );
                    return Err(KvError::Conflict {
                        key: key.clone(),
                        start_ts,
                        observed_ts,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Logs fatal errors at FATAL before they are returned.
pub(crate) fn report(err: KvError) -> KvError {
    if err.is_fatal() {
        let message = err.to_string();
        match &err {
            KvError::InvariantViolation(_) => {
                log_event_with_fields(Event::InvariantViolation, &[("error", &message)])
            }
            _ => Logger::fatal(err.code(), &[("error", &message)]),
        }
    }
    err
}
