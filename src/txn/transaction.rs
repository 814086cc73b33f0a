//! Transaction - a snapshot-bound read/write scope
//!
//! - Reads resolve against the write buffer first, then the store as of the
//!   start timestamp
//! - Writes stay in the private buffer until commit
//! - Store lookups of read-write transactions are recorded in the read-set,
//!   misses included, so a concurrent insert is detected at commit
//! - Commit hands the buffer to the `CommitCoordinator`; discard drops it
//!
//! Every exit path releases the oracle registration exactly once: commit
//! (successful or not), discard, or drop.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{KvError, KvResult};
use crate::mvcc::{Timestamp, VersionPayload, VersionedStore};
use crate::observability::{log_event_with_fields, Event};

use super::{CommitCoordinator, IteratorOptions, Item, PendingCommit, TxnIterator};

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Discarded,
}

/// A transaction bound to one snapshot of the store.
#[derive(Debug)]
pub struct Transaction {
    coordinator: Arc<CommitCoordinator>,
    start_ts: Timestamp,
    read_write: bool,
    writes: BTreeMap<Vec<u8>, VersionPayload>,
    reads: Mutex<BTreeSet<Vec<u8>>>,
    state: TxnState,
}

impl Transaction {
    /// Starts a transaction at a fresh start timestamp.
    pub(crate) fn begin(coordinator: Arc<CommitCoordinator>, read_write: bool) -> Self {
        let start_ts = coordinator.oracle().begin();
        log_event_with_fields(
            Event::TxnBegin,
            &[
                ("read_write", if read_write { "true" } else { "false" }),
                ("start_ts", &start_ts.to_string()),
            ],
        );
        Self {
            coordinator,
            start_ts,
            read_write,
            writes: BTreeMap::new(),
            reads: Mutex::new(BTreeSet::new()),
            state: TxnState::Active,
        }
    }

    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn is_read_write(&self) -> bool {
        self.read_write
    }

    /// Number of distinct keys in the write buffer.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Returns the value of `key` visible to this transaction.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if the key is absent or deleted at this snapshot.
    pub fn get(&self, key: &[u8]) -> KvResult<Vec<u8>> {
        self.get_item(key).map(Item::into_value)
    }

    /// Returns the key, value and version visible to this transaction.
    pub fn get_item(&self, key: &[u8]) -> KvResult<Item> {
        self.ensure_active()?;

        if let Some(payload) = self.writes.get(key) {
            return match payload {
                VersionPayload::Value(value) => {
                    Ok(Item::new(key.to_vec(), value.clone(), self.start_ts))
                }
                VersionPayload::Tombstone => Err(KvError::KeyNotFound),
            };
        }

        self.record_read(key);
        let version = self
            .coordinator
            .store()
            .read(key, self.start_ts)
            .ok_or(KvError::KeyNotFound)?;
        match version.payload() {
            VersionPayload::Value(value) => {
                Ok(Item::new(key.to_vec(), value.clone(), version.commit_ts()))
            }
            VersionPayload::Tombstone => Err(KvError::KeyNotFound),
        }
    }

    /// Buffers `value` for `key`, replacing any earlier buffered write.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> KvResult<()> {
        self.buffer(key.into(), VersionPayload::Value(value.into()))
    }

    /// Buffers a tombstone for `key`.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> KvResult<()> {
        self.buffer(key.into(), VersionPayload::Tombstone)
    }

    /// Creates an iterator over this transaction's snapshot and buffer.
    pub fn new_iterator(&self, options: IteratorOptions) -> TxnIterator<'_> {
        TxnIterator::new(self, options)
    }

    /// Publishes the buffered writes.
    ///
    /// Returns the commit timestamp, or `None` when there was nothing to
    /// publish. A failed commit leaves the transaction discarded.
    pub fn commit(&mut self) -> KvResult<Option<Timestamp>> {
        self.ensure_active()?;

        if self.writes.is_empty() {
            self.finish(TxnState::Committed);
            return Ok(None);
        }

        let pending = PendingCommit {
            start_ts: self.start_ts,
            reads: mem::take(&mut *self.reads.lock()),
            writes: mem::take(&mut self.writes),
        };

        match self.coordinator.commit(pending) {
            Ok(commit_ts) => {
                self.finish(TxnState::Committed);
                Ok(Some(commit_ts))
            }
            Err(err) => {
                self.finish(TxnState::Discarded);
                Err(err)
            }
        }
    }

    /// Drops the buffer without publishing. Idempotent, and a no-op after
    /// commit.
    pub fn discard(&mut self) {
        if self.state != TxnState::Active {
            return;
        }
        let dropped = self.writes.len();
        self.writes.clear();
        self.reads.lock().clear();
        self.finish(TxnState::Discarded);
        log_event_with_fields(
            Event::TxnDiscard,
            &[
                ("dropped_writes", &dropped.to_string()),
                ("start_ts", &self.start_ts.to_string()),
            ],
        );
    }

    pub(crate) fn store(&self) -> &Arc<VersionedStore> {
        self.coordinator.store()
    }

    pub(crate) fn writes(&self) -> &BTreeMap<Vec<u8>, VersionPayload> {
        &self.writes
    }

    pub(crate) fn record_read(&self, key: &[u8]) {
        if self.read_write && self.state == TxnState::Active {
            let mut reads = self.reads.lock();
            if !reads.contains(key) {
                reads.insert(key.to_vec());
            }
        }
    }

    fn buffer(&mut self, key: Vec<u8>, payload: VersionPayload) -> KvResult<()> {
        self.ensure_active()?;
        if !self.read_write {
            return Err(KvError::ReadOnlyTransaction);
        }
        if key.is_empty() {
            return Err(KvError::EmptyKey);
        }

        let limit = self.coordinator.settings().max_pending_writes;
        if self.writes.len() >= limit && !self.writes.contains_key(&key) {
            return Err(KvError::TransactionTooBig { limit });
        }

        self.writes.insert(key, payload);
        Ok(())
    }

    fn ensure_active(&self) -> KvResult<()> {
        match self.state {
            TxnState::Active => Ok(()),
            TxnState::Committed => Err(KvError::AlreadyCommitted),
            TxnState::Discarded => Err(KvError::AlreadyDiscarded),
        }
    }

    fn finish(&mut self, state: TxnState) {
        self.state = state;
        self.coordinator.oracle().done(self.start_ts);
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mvcc::{OracleClock, VersionedStore};
    use crate::txn::CommitSettings;

    fn coordinator_with(settings: CommitSettings) -> Arc<CommitCoordinator> {
        Arc::new(CommitCoordinator::new(
            Arc::new(VersionedStore::new()),
            OracleClock::new(),
            None,
            settings,
        ))
    }

    fn coordinator() -> Arc<CommitCoordinator> {
        coordinator_with(CommitSettings::default())
    }

    #[test]
    fn test_read_your_own_writes() {
        let coord = coordinator();
        let mut txn = Transaction::begin(Arc::clone(&coord), true);

        txn.set("k", "v1").unwrap();
        assert_eq!(txn.get(b"k").unwrap(), b"v1");
        txn.set("k", "v2").unwrap();
        assert_eq!(txn.get(b"k").unwrap(), b"v2");
        txn.delete("k").unwrap();
        assert!(txn.get(b"k").unwrap_err().is_not_found());
        assert_eq!(txn.pending_writes(), 1);
    }

    #[test]
    fn test_buffered_item_carries_start_ts() {
        let coord = coordinator();
        let mut txn = Transaction::begin(Arc::clone(&coord), true);
        txn.set("k", "v").unwrap();
        assert_eq!(txn.get_item(b"k").unwrap().version(), txn.start_ts());
    }

    #[test]
    fn test_empty_commit_returns_none_and_releases_registration() {
        let coord = coordinator();
        let mut txn = Transaction::begin(Arc::clone(&coord), true);
        assert_eq!(coord.oracle().in_flight(), 1);

        let issued = coord.oracle().last_issued();
        assert_eq!(txn.commit().unwrap(), None);
        assert_eq!(txn.state(), TxnState::Committed);
        assert_eq!(coord.oracle().in_flight(), 0);
        assert_eq!(coord.oracle().last_issued(), issued);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let coord = coordinator();
        let mut txn = Transaction::begin(Arc::clone(&coord), false);
        assert!(matches!(txn.set("k", "v"), Err(KvError::ReadOnlyTransaction)));
        assert!(matches!(txn.delete("k"), Err(KvError::ReadOnlyTransaction)));
        assert_eq!(txn.pending_writes(), 0);
    }

    #[test]
    fn test_empty_key_rejected() {
        let coord = coordinator();
        let mut txn = Transaction::begin(Arc::clone(&coord), true);
        assert!(matches!(txn.set(Vec::<u8>::new(), "v"), Err(KvError::EmptyKey)));
        assert!(matches!(txn.delete(""), Err(KvError::EmptyKey)));
    }

    #[test]
    fn test_too_big_leaves_buffer_unchanged() {
        let coord = coordinator_with(CommitSettings {
            max_pending_writes: 2,
            ..CommitSettings::default()
        });
        let mut txn = Transaction::begin(Arc::clone(&coord), true);
        txn.set("a", "1").unwrap();
        txn.set("b", "2").unwrap();

        let err = txn.set("c", "3").unwrap_err();
        assert!(matches!(err, KvError::TransactionTooBig { limit: 2 }));
        assert_eq!(txn.pending_writes(), 2);

        // Overwriting a buffered key does not grow the buffer.
        txn.set("a", "1b").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), b"1b");
    }

    #[test]
    fn test_state_errors_after_finish() {
        let coord = coordinator();
        let mut txn = Transaction::begin(Arc::clone(&coord), true);
        txn.set("k", "v").unwrap();
        txn.commit().unwrap();
        assert!(matches!(txn.commit(), Err(KvError::AlreadyCommitted)));
        assert!(matches!(txn.get(b"k"), Err(KvError::AlreadyCommitted)));

        let mut other = Transaction::begin(Arc::clone(&coord), true);
        other.discard();
        other.discard();
        assert!(matches!(other.commit(), Err(KvError::AlreadyDiscarded)));
        assert!(matches!(other.set("k", "v"), Err(KvError::AlreadyDiscarded)));
    }

    #[test]
    fn test_drop_releases_registration() {
        let coord = coordinator();
        {
            let mut txn = Transaction::begin(Arc::clone(&coord), true);
            txn.set("k", "v").unwrap();
        }
        assert_eq!(coord.oracle().in_flight(), 0);
        let txn = Transaction::begin(Arc::clone(&coord), false);
        assert!(txn.get(b"k").unwrap_err().is_not_found());
    }

    #[test]
    fn test_missed_read_conflicts_with_concurrent_insert() {
        let coord = coordinator();
        let mut reader = Transaction::begin(Arc::clone(&coord), true);
        assert!(reader.get(b"k").unwrap_err().is_not_found());

        let mut writer = Transaction::begin(Arc::clone(&coord), true);
        writer.set("k", "v").unwrap();
        writer.commit().unwrap();

        reader.set("other", "x").unwrap();
        let err = reader.commit().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(reader.state(), TxnState::Discarded);
        assert_eq!(coord.oracle().in_flight(), 0);
    }

    #[test]
    fn test_iterated_keys_join_read_set() {
        let coord = coordinator();
        let mut seed = Transaction::begin(Arc::clone(&coord), true);
        seed.set("k", "v0").unwrap();
        seed.commit().unwrap();

        let mut scanner = Transaction::begin(Arc::clone(&coord), true);
        let seen = scanner
            .new_iterator(IteratorOptions::default())
            .items()
            .count();
        assert_eq!(seen, 1);

        let mut writer = Transaction::begin(Arc::clone(&coord), true);
        writer.set("k", "v1").unwrap();
        writer.commit().unwrap();

        scanner.set("summary", "1").unwrap();
        assert!(scanner.commit().unwrap_err().is_conflict());
    }
}
